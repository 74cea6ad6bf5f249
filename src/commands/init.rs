//! # init 命令实现
//!
//! 只做超胞初始化：写出 `POSCAR-001..`、`SPOSCAR`、`POSCAR-primitive`
//! 与 `phonon_setting_info.json`，便于在提交前检查位移。
//!
//! ## 依赖关系
//! - 使用 `cli/init.rs` 定义的参数
//! - 使用 `phonopy/`, `workflow/outputs.rs`, `utils/output.rs`

use crate::cli::init::InitArgs;
use crate::error::{PhonoflowError, Result};
use crate::models::{Mesh, PhononSettings, SupercellMatrix};
use crate::parsers::poscar::parse_poscar_file;
use crate::phonopy::{PhononLibrary, PythonPhonopy};
use crate::utils::output::{self, KeyValue};
use crate::workflow::WorkflowOutputs;

/// 执行 init 命令
pub fn execute(args: InitArgs) -> Result<()> {
    output::print_header("Supercell Initialization");

    let structure = parse_poscar_file(&args.structure)?;
    let mut settings = PhononSettings::new(parse_dim(&args.dim)?);
    if let Some(mesh) = &args.mesh {
        settings.mesh = parse_mesh(mesh)?;
    }
    settings.distance = args.distance;
    settings.is_nac = args.nac;

    let library = PythonPhonopy::new(args.python.clone());
    let setup = library.phonon_setting_info(&settings, &structure, args.symprec, None)?;

    let rows = vec![
        KeyValue::new("Unit cell", structure.formula()),
        KeyValue::new("Primitive atoms", setup.primitive.num_atoms()),
        KeyValue::new("Supercell atoms", setup.supercell.num_atoms()),
        KeyValue::new("Displacements", setup.supercells.len()),
        KeyValue::new(
            "phonopy",
            setup
                .phonon_setting_info
                .version
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        ),
    ];
    output::print_table(&rows);

    let outputs = WorkflowOutputs {
        phonon_setting_info: Some(setup.phonon_setting_info),
        primitive: Some(setup.primitive),
        supercell: Some(setup.supercell),
        supercells: setup.supercells,
        ..Default::default()
    };
    let written = outputs.write_to_dir(&args.output_dir, false)?;

    output::print_success(&format!(
        "{} file(s) written to {}",
        written.len(),
        args.output_dir.display()
    ));
    Ok(())
}

/// 3 个数为对角矩阵，9 个数按行排列
fn parse_dim(values: &[i64]) -> Result<SupercellMatrix> {
    let matrix = match values.len() {
        3 => SupercellMatrix::Diagonal([values[0], values[1], values[2]]),
        9 => SupercellMatrix::Full([
            [values[0], values[1], values[2]],
            [values[3], values[4], values[5]],
            [values[6], values[7], values[8]],
        ]),
        n => {
            return Err(PhonoflowError::InvalidArgument(format!(
                "--dim takes 3 or 9 integers, got {}",
                n
            )))
        }
    };
    if matrix.determinant() == 0 {
        return Err(PhonoflowError::InvalidArgument(
            "supercell matrix is singular".to_string(),
        ));
    }
    Ok(matrix)
}

/// 1 个数为采样密度，3 个正整数为网格
fn parse_mesh(values: &[f64]) -> Result<Mesh> {
    match values {
        [density] if *density > 0.0 => Ok(Mesh::Density(*density)),
        [a, b, c] => {
            let mut numbers = [0u32; 3];
            for (slot, v) in numbers.iter_mut().zip([a, b, c]) {
                if *v < 1.0 || v.fract() != 0.0 {
                    return Err(PhonoflowError::InvalidArgument(format!(
                        "mesh numbers must be positive integers, got {}",
                        v
                    )));
                }
                *slot = *v as u32;
            }
            Ok(Mesh::Numbers(numbers))
        }
        _ => Err(PhonoflowError::InvalidArgument(
            "--mesh takes one density or 3 integers".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dim() {
        assert_eq!(
            parse_dim(&[2, 2, 1]).unwrap(),
            SupercellMatrix::Diagonal([2, 2, 1])
        );
        let full = parse_dim(&[0, 1, 1, 1, 0, 1, 1, 1, 0]).unwrap();
        assert_eq!(full.determinant(), 2);
        assert!(parse_dim(&[2, 2]).is_err());
        assert!(parse_dim(&[2, 0, 2]).is_err());
    }

    #[test]
    fn test_parse_mesh() {
        assert_eq!(parse_mesh(&[50.0]).unwrap(), Mesh::Density(50.0));
        assert_eq!(parse_mesh(&[8.0, 8.0, 4.0]).unwrap(), Mesh::Numbers([8, 8, 4]));
        assert!(parse_mesh(&[8.5, 8.0, 4.0]).is_err());
        assert!(parse_mesh(&[8.0, 8.0]).is_err());
        assert!(parse_mesh(&[-1.0]).is_err());
    }
}
