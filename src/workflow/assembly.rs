//! # 结果组装
//!
//! 从计算记录中取出受力与 Born 电荷/介电张量，
//! 并检查导入记录的输入结构是否与生成的超胞一致。
//!
//! ## 依赖关系
//! - 被 `workflow/mod.rs` 使用
//! - 使用 `models/`、`utils/output.rs`

use crate::error::{PhonoflowError, Result};
use crate::models::{CalculationRecord, Crystal, ForceSets};
use crate::utils::output::print_warning;

/// 按超胞顺序组装力集。
///
/// 每个超胞需要 `forces["final"]`；缺失的逐个报告后统一失败。
/// 能量只在所有超胞都带有 `energy_no_entropy` 时写入。
pub fn assemble_force_sets(
    num_supercells: usize,
    records: &[Option<CalculationRecord>],
) -> Result<ForceSets> {
    let mut force_sets = Vec::with_capacity(num_supercells);
    let mut energies = Vec::with_capacity(num_supercells);
    let mut missing = Vec::new();

    for i in 0..num_supercells {
        let ordinal = i + 1;
        let outputs = records.get(i).and_then(|r| r.as_ref()).map(|r| &r.outputs);

        match outputs.and_then(|o| o.final_forces()) {
            Some(forces) => force_sets.push(forces.clone()),
            None => {
                print_warning(&format!("Forces could not be found in calculation {:03}.", ordinal));
                missing.push(ordinal);
                continue;
            }
        }

        if let Some(energy) = outputs.and_then(|o| o.energy_no_entropy()) {
            energies.push(energy);
        }
    }

    if force_sets.len() != num_supercells {
        return Err(PhonoflowError::ForcesNotRetrieved {
            found: force_sets.len(),
            expected: num_supercells,
            missing,
        });
    }

    let energies = if energies.len() == num_supercells {
        Some(energies)
    } else {
        None
    };

    Ok(ForceSets {
        force_sets,
        energies,
    })
}

/// 取出 NAC 计算的 Born 电荷与介电张量，两者分别检查
pub fn nac_fields(record: &CalculationRecord) -> Result<(Vec<[[f64; 3]; 3]>, [[f64; 3]; 3])> {
    let label = record.label();

    let born = record
        .outputs
        .born_charges
        .clone()
        .ok_or_else(|| PhonoflowError::MissingResult {
            field: "born_charges".to_string(),
            label: label.clone(),
        })?;

    let epsilon = record
        .outputs
        .dielectrics
        .ok_or(PhonoflowError::MissingResult {
            field: "dielectrics".to_string(),
            label,
        })?;

    Ok((born, epsilon))
}

/// 导入记录的输入结构必须逐个与生成的超胞一致
pub fn check_consistency(
    supercells: &[Crystal],
    records: &[Option<CalculationRecord>],
    tolerance: f64,
) -> Result<()> {
    for (i, generated) in supercells.iter().enumerate() {
        let imported = records
            .get(i)
            .and_then(|r| r.as_ref())
            .and_then(|r| r.structure.as_ref());

        match imported {
            Some(structure) if structure.matches(generated, tolerance) => {}
            _ => return Err(PhonoflowError::SupercellMismatch { index: i + 1 }),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::calculation::{ENERGY_NO_ENTROPY, FINAL_FORCES};
    use crate::models::{Atom, CalcOutputs, CalcSlot, Lattice, Misc, RecordOrigin};
    use std::collections::BTreeMap;

    fn record(n: usize, forces: Option<Vec<[f64; 3]>>, energy: Option<f64>) -> CalculationRecord {
        let outputs = CalcOutputs {
            forces: forces.map(|f| BTreeMap::from([(FINAL_FORCES.to_string(), f)])),
            misc: energy.map(|e| Misc {
                total_energies: Some(BTreeMap::from([(ENERGY_NO_ENTROPY.to_string(), e)])),
            }),
            ..Default::default()
        };
        CalculationRecord::new(
            CalcSlot::Supercell(n),
            RecordOrigin::Stored {
                node_id: n.to_string(),
            },
        )
        .with_outputs(outputs)
    }

    fn cell(x: f64) -> Crystal {
        Crystal::new(
            "Si2",
            Lattice::from_vectors([[5.4, 0.0, 0.0], [0.0, 5.4, 0.0], [0.0, 0.0, 5.4]]),
            vec![Atom::new("Si", [x, 0.0, 0.0]), Atom::new("Si", [0.25, 0.25, 0.25])],
        )
    }

    #[test]
    fn test_force_sets_in_order_with_energies() {
        let records = vec![
            Some(record(1, Some(vec![[0.1, 0.0, 0.0]]), Some(-10.0))),
            Some(record(2, Some(vec![[0.2, 0.0, 0.0]]), Some(-11.0))),
        ];
        let fs = assemble_force_sets(2, &records).unwrap();
        assert_eq!(fs.force_sets, vec![vec![[0.1, 0.0, 0.0]], vec![[0.2, 0.0, 0.0]]]);
        assert_eq!(fs.energies, Some(vec![-10.0, -11.0]));
    }

    #[test]
    fn test_energies_dropped_when_any_missing() {
        let records = vec![
            Some(record(1, Some(vec![[0.1, 0.0, 0.0]]), Some(-10.0))),
            Some(record(2, Some(vec![[0.2, 0.0, 0.0]]), None)),
        ];
        let fs = assemble_force_sets(2, &records).unwrap();
        assert_eq!(fs.len(), 2);
        assert!(fs.energies.is_none());
    }

    #[test]
    fn test_missing_forces_are_listed() {
        let records = vec![
            Some(record(1, Some(vec![[0.1, 0.0, 0.0]]), None)),
            Some(record(2, None, None)),
            None,
        ];
        match assemble_force_sets(3, &records) {
            Err(PhonoflowError::ForcesNotRetrieved {
                found,
                expected,
                missing,
            }) => {
                assert_eq!(found, 1);
                assert_eq!(expected, 3);
                assert_eq!(missing, vec![2, 3]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nac_fields_checked_independently() {
        let mut rec = CalculationRecord::new(
            CalcSlot::Nac,
            RecordOrigin::Stored {
                node_id: "nac".to_string(),
            },
        );
        assert!(matches!(
            nac_fields(&rec),
            Err(PhonoflowError::MissingResult { field, .. }) if field == "born_charges"
        ));

        rec.outputs.born_charges = Some(vec![[[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]]]);
        assert!(matches!(
            nac_fields(&rec),
            Err(PhonoflowError::MissingResult { field, .. }) if field == "dielectrics"
        ));

        rec.outputs.dielectrics = Some([[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]]);
        let (born, eps) = nac_fields(&rec).unwrap();
        assert_eq!(born.len(), 1);
        assert_eq!(eps[2][2], 10.0);
    }

    #[test]
    fn test_consistency_reports_first_mismatch() {
        let supercells = vec![cell(0.01), cell(0.02)];
        let with = |c: Crystal, n| Some(record(n, None, None).with_structure(c));

        // 整数平移视为同一位置
        let records = vec![with(cell(1.01), 1), with(cell(0.02), 2)];
        assert!(check_consistency(&supercells, &records, 1e-5).is_ok());

        let records = vec![with(cell(0.01), 1), with(cell(0.03), 2)];
        assert!(matches!(
            check_consistency(&supercells, &records, 1e-5),
            Err(PhonoflowError::SupercellMismatch { index: 2 })
        ));

        let records = vec![with(cell(0.01), 1)];
        assert!(matches!(
            check_consistency(&supercells, &records, 1e-5),
            Err(PhonoflowError::SupercellMismatch { index: 2 })
        ));
    }
}
