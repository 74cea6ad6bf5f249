//! # VASP OUTCAR 解析器
//!
//! 解析 VASP 计算输出文件 OUTCAR，提取受力、总能、Born 有效电荷和介电张量。
//!
//! ## 依赖关系
//! - 被 `engine/slurm.rs`、`engine/immigrant.rs` 使用
//! - 使用 `models/calculation.rs`

use crate::error::{PhonoflowError, Result};
use crate::models::calculation::{ENERGY_NO_ENTROPY, FINAL_FORCES};
use crate::models::{CalcOutputs, Misc};

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// 完成标记
pub const COMPLETION_MARKER: &str = "General timing and accounting informations for this job";

/// OUTCAR 中提取的信息
#[derive(Debug, Clone, Default)]
pub struct OutcarData {
    pub is_finished: bool,
    pub num_atoms: Option<usize>,
    pub outputs: CalcOutputs,
}

/// 解析 VASP OUTCAR 文件
pub fn parse_outcar(path: &Path) -> Result<OutcarData> {
    let content = fs::read_to_string(path).map_err(|e| PhonoflowError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_outcar_content(&content, &path.display().to_string())
}

/// 从字符串内容解析 OUTCAR
pub fn parse_outcar_content(content: &str, source: &str) -> Result<OutcarData> {
    let lines: Vec<&str> = content.lines().collect();
    let mut data = OutcarData::default();

    let mut last_forces: Option<Vec<[f64; 3]>> = None;
    let mut energies: BTreeMap<String, f64> = BTreeMap::new();
    let mut born: Option<Vec<[[f64; 3]; 3]>> = None;
    let mut epsilon_lfe: Option<[[f64; 3]; 3]> = None;
    let mut epsilon: Option<[[f64; 3]; 3]> = None;

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];

        if line.contains(COMPLETION_MARKER) {
            data.is_finished = true;
        }

        // "   NIONS =       8"
        if line.contains("NIONS =") {
            if let Some(val) = extract_last_number(line) {
                data.num_atoms = Some(val as usize);
            }
        }

        // " POSITION                                       TOTAL-FORCE (eV/Angst)"
        if line.contains("TOTAL-FORCE") {
            let (forces, next) = read_force_block(&lines, i + 1, source)?;
            last_forces = Some(forces);
            i = next;
            continue;
        }

        // "  free  energy   TOTEN  =       -23.84957328 eV"
        if line.contains("free  energy   TOTEN") {
            if let Some(val) = extract_number_after(line, "=") {
                energies.insert("energy_free".to_string(), val);
            }
        }

        // "  energy  without entropy=      -23.80549573  energy(sigma->0) =      -23.82753450"
        if line.contains("energy  without entropy") {
            if let Some(val) = extract_number_after(line, "=") {
                energies.insert(ENERGY_NO_ENTROPY.to_string(), val);
            }
            if let Some(pos) = line.find("energy(sigma->0)") {
                if let Some(val) = extract_number_after(&line[pos..], "=") {
                    energies.insert("energy_extrapolated".to_string(), val);
                }
            }
        }

        if line.contains("BORN EFFECTIVE CHARGES") {
            let (charges, next) = read_born_block(&lines, i + 1);
            if !charges.is_empty() {
                born = Some(charges);
            }
            i = next;
            continue;
        }

        if line.contains("MACROSCOPIC STATIC DIELECTRIC TENSOR") && !line.contains("IONIC") {
            if let Some(tensor) = read_tensor_block(&lines, i + 1) {
                if line.contains("including local field effects") {
                    epsilon_lfe = Some(tensor);
                } else {
                    epsilon = Some(tensor);
                }
            }
        }

        i += 1;
    }

    if let Some(forces) = last_forces {
        let mut named = BTreeMap::new();
        named.insert(FINAL_FORCES.to_string(), forces);
        data.outputs.forces = Some(named);
    }

    if !energies.is_empty() {
        data.outputs.misc = Some(Misc {
            total_energies: Some(energies),
        });
    }

    data.outputs.born_charges = born;
    data.outputs.dielectrics = epsilon_lfe.or(epsilon);

    Ok(data)
}

/// 读取 TOTAL-FORCE 块，返回受力和块后的行号
fn read_force_block(lines: &[&str], start: usize, source: &str) -> Result<(Vec<[f64; 3]>, usize)> {
    let mut i = start;
    // 表头下方的分隔线
    if i < lines.len() && is_dash_line(lines[i]) {
        i += 1;
    }

    let mut forces = Vec::new();
    while i < lines.len() && !is_dash_line(lines[i]) {
        let values: Vec<f64> = lines[i]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if values.len() != 6 {
            return Err(PhonoflowError::ParseError {
                format: "outcar".to_string(),
                path: source.to_string(),
                reason: format!("Malformed TOTAL-FORCE line {}: '{}'", i + 1, lines[i].trim()),
            });
        }
        forces.push([values[3], values[4], values[5]]);
        i += 1;
    }

    Ok((forces, i + 1))
}

/// 读取 Born 有效电荷块
///
/// ```text
///  ion    1
///     1     1.10890     0.00000     0.00000
///     2     0.00000     1.10890     0.00000
///     3     0.00000     0.00000     1.10890
/// ```
fn read_born_block(lines: &[&str], start: usize) -> (Vec<[[f64; 3]; 3]>, usize) {
    let mut i = start;
    if i < lines.len() && is_dash_line(lines[i]) {
        i += 1;
    }

    let mut charges = Vec::new();
    while i < lines.len() && lines[i].trim_start().starts_with("ion") {
        let mut tensor = [[0.0; 3]; 3];
        for row in 0..3 {
            let values: Vec<f64> = lines
                .get(i + 1 + row)
                .map(|l| l.split_whitespace().filter_map(|s| s.parse().ok()).collect())
                .unwrap_or_default();
            if values.len() < 4 {
                return (charges, i + 1 + row);
            }
            tensor[row] = [values[1], values[2], values[3]];
        }
        charges.push(tensor);
        i += 4;
    }

    (charges, i)
}

/// 读取 3x3 张量块（表头后一行分隔线）
fn read_tensor_block(lines: &[&str], start: usize) -> Option<[[f64; 3]; 3]> {
    let mut i = start;
    if i < lines.len() && is_dash_line(lines[i]) {
        i += 1;
    }
    let mut tensor = [[0.0; 3]; 3];
    for row in tensor.iter_mut() {
        let values: Vec<f64> = lines
            .get(i)?
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if values.len() < 3 {
            return None;
        }
        *row = [values[0], values[1], values[2]];
        i += 1;
    }
    Some(tensor)
}

fn is_dash_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c == '-')
}

/// 从字符串中提取指定标记之后的数字
fn extract_number_after(s: &str, marker: &str) -> Option<f64> {
    let pos = s.find(marker)?;
    let after = &s[pos + marker.len()..];
    after.split_whitespace().next()?.parse().ok()
}

/// 提取字符串中最后一个数字
fn extract_last_number(s: &str) -> Option<f64> {
    s.split_whitespace()
        .filter_map(|w| w.parse::<f64>().ok())
        .last()
}
