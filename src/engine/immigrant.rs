//! # 导入已有计算
//!
//! 从已完成的 VASP 计算目录重新解析结果，而不重新计算。
//!
//! ## 依赖关系
//! - 被 `engine/slurm.rs` 使用
//! - 使用 `batch/collector.rs` 定位文件，`parsers/` 解析

use crate::batch::FileCollector;
use crate::error::{PhonoflowError, Result};
use crate::models::{CalcSlot, CalculationRecord, RecordOrigin};
use crate::parsers::{outcar, poscar};

use std::path::Path;

/// 解析一个计算目录，返回带输入结构与输出的记录
pub fn parse_folder(slot: CalcSlot, folder: &Path) -> Result<CalculationRecord> {
    if !folder.is_dir() {
        return Err(PhonoflowError::DirectoryNotFound {
            path: folder.display().to_string(),
        });
    }

    let outcar_path = FileCollector::new(folder)
        .with_pattern("OUTCAR")
        .recursive(true)
        .first()
        .ok_or_else(|| PhonoflowError::FileNotFound {
            path: folder.join("OUTCAR").display().to_string(),
        })?;

    // 输入结构与 OUTCAR 在同一目录
    let calc_dir = outcar_path.parent().unwrap_or(folder);
    let structure_path = FileCollector::new(calc_dir)
        .with_pattern("POSCAR")
        .first()
        .or_else(|| FileCollector::new(calc_dir).with_pattern("CONTCAR").first())
        .ok_or_else(|| PhonoflowError::FileNotFound {
            path: calc_dir.join("POSCAR").display().to_string(),
        })?;

    let structure = poscar::parse_poscar_file(&structure_path)?;
    let data = outcar::parse_outcar(&outcar_path)?;

    if let Some(n) = data.num_atoms {
        if n != structure.num_atoms() {
            return Err(PhonoflowError::ParseError {
                format: "outcar".to_string(),
                path: outcar_path.display().to_string(),
                reason: format!(
                    "NIONS = {} but {} has {} atoms",
                    n,
                    structure_path.display(),
                    structure.num_atoms()
                ),
            });
        }
    }

    Ok(CalculationRecord::new(
        slot,
        RecordOrigin::Immigrant {
            folder: folder.to_path_buf(),
        },
    )
    .with_structure(structure)
    .with_outputs(data.outputs))
}
