//! # phonopy 输出文件解析器
//!
//! 远程 phonopy 作业结束后读取其输出：
//! `FORCE_CONSTANTS`、`total_dos.dat`、`projected_dos.dat`、
//! `thermal_properties.yaml`、`band.yaml`。
//!
//! ## 依赖关系
//! - 被 `engine/slurm.rs` 使用
//! - 使用 `models/phonon.rs`
//! - 使用 `serde_yaml` 读取 yaml 输出

use crate::error::{PhonoflowError, Result};
use crate::models::{BandStructure, Dos, ForceConstants, Pdos, ThermalProperties};

use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const FORCE_CONSTANTS_FILE: &str = "FORCE_CONSTANTS";
pub const TOTAL_DOS_FILE: &str = "total_dos.dat";
pub const PROJECTED_DOS_FILE: &str = "projected_dos.dat";
pub const THERMAL_PROPERTIES_FILE: &str = "thermal_properties.yaml";
pub const BAND_FILE: &str = "band.yaml";

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| PhonoflowError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })
}

fn parse_error(format: &str, path: &str, reason: impl Into<String>) -> PhonoflowError {
    PhonoflowError::ParseError {
        format: format.to_string(),
        path: path.to_string(),
        reason: reason.into(),
    }
}

// ─────────────────────────────────────────────────────────────
// FORCE_CONSTANTS
// ─────────────────────────────────────────────────────────────

pub fn parse_force_constants_file(path: &Path) -> Result<ForceConstants> {
    parse_force_constants(&read_file(path)?, &path.display().to_string())
}

/// 解析完整的 FORCE_CONSTANTS 文本
///
/// ```text
///    2   2
///    1   1
///   x x x
///   x x x
///   x x x
///    1   2
///   ...
/// ```
pub fn parse_force_constants(content: &str, source: &str) -> Result<ForceConstants> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());

    let header: Vec<usize> = lines
        .next()
        .ok_or_else(|| parse_error("force_constants", source, "Empty file"))?
        .split_whitespace()
        .filter_map(|s| s.parse().ok())
        .collect();
    let (n_rows, n_cols) = match header.as_slice() {
        [n] => (*n, *n),
        [a, b] => (*a, *b),
        _ => return Err(parse_error("force_constants", source, "Invalid header")),
    };
    if n_rows != n_cols {
        return Err(parse_error(
            "force_constants",
            source,
            format!("Compact force constants ({}x{}) are not supported", n_rows, n_cols),
        ));
    }

    let mut fc = vec![vec![[[0.0; 3]; 3]; n_cols]; n_rows];
    for _ in 0..n_rows * n_cols {
        let idx: Vec<usize> = lines
            .next()
            .ok_or_else(|| parse_error("force_constants", source, "Unexpected end of file"))?
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if idx.len() != 2 || idx[0] == 0 || idx[1] == 0 || idx[0] > n_rows || idx[1] > n_cols {
            return Err(parse_error("force_constants", source, "Invalid atom pair line"));
        }
        let block = &mut fc[idx[0] - 1][idx[1] - 1];
        for row in block.iter_mut() {
            let values: Vec<f64> = lines
                .next()
                .ok_or_else(|| parse_error("force_constants", source, "Unexpected end of file"))?
                .split_whitespace()
                .filter_map(|s| s.parse().ok())
                .collect();
            if values.len() != 3 {
                return Err(parse_error("force_constants", source, "Invalid tensor row"));
            }
            *row = [values[0], values[1], values[2]];
        }
    }

    Ok(ForceConstants {
        force_constants: fc,
    })
}

// ─────────────────────────────────────────────────────────────
// DOS / PDOS
// ─────────────────────────────────────────────────────────────

/// 读取以 `#` 为注释的数值列
fn parse_columns(content: &str, source: &str, format: &str) -> Result<Vec<Vec<f64>>> {
    let mut rows = Vec::new();
    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let values: Vec<f64> = line
            .split_whitespace()
            .map(|s| s.parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| parse_error(format, source, format!("line {}: {}", n + 1, e)))?;
        if let Some(first) = rows.first() {
            let first: &Vec<f64> = first;
            if first.len() != values.len() {
                return Err(parse_error(format, source, format!("line {}: ragged row", n + 1)));
            }
        }
        rows.push(values);
    }
    Ok(rows)
}

pub fn parse_total_dos_file(path: &Path) -> Result<Dos> {
    parse_total_dos(&read_file(path)?, &path.display().to_string())
}

pub fn parse_total_dos(content: &str, source: &str) -> Result<Dos> {
    let rows = parse_columns(content, source, "total_dos")?;
    if rows.iter().any(|r| r.len() < 2) {
        return Err(parse_error("total_dos", source, "Expected two columns"));
    }
    Ok(Dos {
        frequencies: rows.iter().map(|r| r[0]).collect(),
        total_dos: rows.iter().map(|r| r[1]).collect(),
    })
}

pub fn parse_projected_dos_file(path: &Path) -> Result<Pdos> {
    parse_projected_dos(&read_file(path)?, &path.display().to_string())
}

pub fn parse_projected_dos(content: &str, source: &str) -> Result<Pdos> {
    let rows = parse_columns(content, source, "projected_dos")?;
    let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
    if n_cols < 2 {
        return Err(parse_error("projected_dos", source, "Expected at least two columns"));
    }
    let projected_dos = (1..n_cols)
        .map(|c| rows.iter().map(|r| r[c]).collect())
        .collect();
    Ok(Pdos {
        frequencies: rows.iter().map(|r| r[0]).collect(),
        projected_dos,
    })
}

// ─────────────────────────────────────────────────────────────
// thermal_properties.yaml
// ─────────────────────────────────────────────────────────────

mod cereal {
    use super::Deserialize;

    #[derive(Deserialize)]
    pub(super) struct ThermalYaml {
        pub thermal_properties: Vec<ThermalPoint>,
    }

    #[derive(Deserialize)]
    pub(super) struct ThermalPoint {
        pub temperature: f64,
        pub free_energy: f64,
        pub entropy: f64,
        pub heat_capacity: f64,
    }

    #[derive(Deserialize)]
    pub(super) struct BandYaml {
        #[serde(default)]
        pub labels: Vec<Vec<String>>,
        pub phonon: Vec<BandPoint>,
    }

    #[derive(Deserialize)]
    pub(super) struct BandPoint {
        #[serde(rename = "q-position")]
        pub q_position: [f64; 3],
        pub distance: f64,
        pub band: Vec<Band>,
    }

    #[derive(Deserialize)]
    pub(super) struct Band {
        pub frequency: f64,
    }
}

pub fn parse_thermal_properties_file(path: &Path) -> Result<ThermalProperties> {
    parse_thermal_properties(&read_file(path)?, &path.display().to_string())
}

pub fn parse_thermal_properties(content: &str, source: &str) -> Result<ThermalProperties> {
    let raw: cereal::ThermalYaml = serde_yaml::from_str(content)
        .map_err(|e| parse_error("thermal_properties", source, e.to_string()))?;

    let points = raw.thermal_properties;
    Ok(ThermalProperties {
        temperatures: points.iter().map(|p| p.temperature).collect(),
        free_energy: points.iter().map(|p| p.free_energy).collect(),
        entropy: points.iter().map(|p| p.entropy).collect(),
        heat_capacity: points.iter().map(|p| p.heat_capacity).collect(),
    })
}

// ─────────────────────────────────────────────────────────────
// band.yaml
// ─────────────────────────────────────────────────────────────

pub fn parse_band_file(path: &Path) -> Result<BandStructure> {
    parse_band(&read_file(path)?, &path.display().to_string())
}

pub fn parse_band(content: &str, source: &str) -> Result<BandStructure> {
    let raw: cereal::BandYaml =
        serde_yaml::from_str(content).map_err(|e| parse_error("band", source, e.to_string()))?;

    // 标签按路径段成对给出，相邻段首尾相同时合并
    let mut labels: Vec<String> = Vec::new();
    for pair in raw.labels {
        for label in pair {
            if labels.last() != Some(&label) {
                labels.push(label);
            }
        }
    }

    Ok(BandStructure {
        qpoints: raw.phonon.iter().map(|p| p.q_position).collect(),
        distances: raw.phonon.iter().map(|p| p.distance).collect(),
        frequencies: raw
            .phonon
            .iter()
            .map(|p| p.band.iter().map(|b| b.frequency).collect())
            .collect(),
        labels,
    })
}
