//! # VASP POSCAR 格式解析器
//!
//! 解析与写出 VASP POSCAR/CONTCAR 文件格式。
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # scaling factor
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # element symbols (VASP 5+)
//! n1 n2 ...              # number of atoms per element
//! Selective dynamics     # optional
//! Direct/Cartesian       # coordinate type
//! x1 y1 z1               # atom positions
//! ...
//! ```
//!
//! 写出时保持原子顺序不变：受力数组按 POSCAR 中的原子顺序返回，
//! 必须与 phonopy 生成的超胞一一对应。
//!
//! ## 依赖关系
//! - 被 `engine/`、`commands/` 使用
//! - 使用 `models/structure.rs`

use crate::error::{PhonoflowError, Result};
use crate::models::{Atom, Crystal, Lattice};
use std::fs;
use std::path::Path;

/// 解析 POSCAR/CONTCAR 文件
pub fn parse_poscar_file(path: &Path) -> Result<Crystal> {
    let content = fs::read_to_string(path).map_err(|e| PhonoflowError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_poscar_content(
        &content,
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown"),
    )
}

/// 从字符串内容解析 POSCAR 格式
pub fn parse_poscar_content(content: &str, default_name: &str) -> Result<Crystal> {
    let lines: Vec<&str> = content.lines().collect();

    let parse_err = |name: &str, reason: String| PhonoflowError::ParseError {
        format: "poscar".to_string(),
        path: name.to_string(),
        reason,
    };

    if lines.len() < 8 {
        return Err(parse_err(default_name, "File too short".to_string()));
    }

    // Line 0: Comment/name
    let name = lines[0].trim().to_string();
    let name = if name.is_empty() {
        default_name.to_string()
    } else {
        name
    };

    // Line 1: Scaling factor
    let scale: f64 = lines[1]
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| parse_err(&name, "Invalid scaling factor".to_string()))?;

    // Lines 2-4: Lattice vectors
    let mut matrix = [[0.0; 3]; 3];
    for i in 0..3 {
        let parts: Vec<f64> = lines[2 + i]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() < 3 {
            return Err(parse_err(
                &name,
                format!("Invalid lattice vector at line {}", 3 + i),
            ));
        }
        matrix[i] = [parts[0] * scale, parts[1] * scale, parts[2] * scale];
    }
    let lattice = Lattice::from_vectors(matrix);

    // Line 5: Element symbols (VASP 5+) or atom counts (VASP 4)
    let line5_parts: Vec<&str> = lines[5].split_whitespace().collect();
    if line5_parts.is_empty() {
        return Err(parse_err(&name, "Missing element line".to_string()));
    }
    let (elements, counts, atom_line_start) = if line5_parts[0].parse::<i32>().is_ok() {
        // VASP 4: 没有元素行，只能用占位元素名
        let counts: Vec<usize> = line5_parts.iter().filter_map(|s| s.parse().ok()).collect();
        let elements: Vec<String> = (0..counts.len()).map(|i| format!("X{}", i + 1)).collect();
        (elements, counts, 6)
    } else {
        let elements: Vec<String> = line5_parts.iter().map(|s| s.to_string()).collect();
        let counts: Vec<usize> = lines[6]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        (elements, counts, 7)
    };

    if elements.len() != counts.len() {
        return Err(parse_err(
            &name,
            "Element and count lines have different lengths".to_string(),
        ));
    }

    let mut coord_line = atom_line_start;
    if lines.len() > coord_line
        && lines[coord_line]
            .trim()
            .to_lowercase()
            .starts_with('s')
    {
        coord_line += 1;
    }

    if lines.len() <= coord_line {
        return Err(parse_err(&name, "Missing coordinate type line".to_string()));
    }

    let coord_type = lines[coord_line].trim().to_lowercase();
    let is_cartesian = coord_type.starts_with('c') || coord_type.starts_with('k');

    let expected: usize = counts.iter().sum();
    let mut atoms: Vec<Atom> = Vec::with_capacity(expected);
    let mut line_idx = coord_line + 1;

    for (elem, &count) in elements.iter().zip(counts.iter()) {
        for _ in 0..count {
            let parts: Vec<f64> = lines
                .get(line_idx)
                .map(|l| {
                    l.split_whitespace()
                        .take(3)
                        .filter_map(|s| s.parse().ok())
                        .collect()
                })
                .unwrap_or_default();

            if parts.len() < 3 {
                return Err(parse_err(
                    &name,
                    format!("Invalid atom position at line {}", line_idx + 1),
                ));
            }

            let position = if is_cartesian {
                let cart = [parts[0] * scale, parts[1] * scale, parts[2] * scale];
                lattice.cart_to_frac(cart)
            } else {
                [parts[0], parts[1], parts[2]]
            };
            atoms.push(Atom::new(elem.clone(), position));
            line_idx += 1;
        }
    }

    Ok(Crystal::new(name, lattice, atoms))
}

/// 连续相同元素的分组，保持原子顺序
pub fn species_runs(crystal: &Crystal) -> Vec<(String, usize)> {
    let mut runs: Vec<(String, usize)> = Vec::new();
    for atom in &crystal.atoms {
        match runs.last_mut() {
            Some((elem, count)) if *elem == atom.element => *count += 1,
            _ => runs.push((atom.element.clone(), 1)),
        }
    }
    runs
}

/// 将 Crystal 转换为 POSCAR 格式字符串
pub fn to_poscar_string(crystal: &Crystal) -> String {
    let runs = species_runs(crystal);
    let mut result = String::new();

    // Line 0: Comment
    result.push_str(&format!("{}\n", crystal.name));

    // Line 1: Scale
    result.push_str("1.0\n");

    // Lines 2-4: Lattice
    for row in &crystal.lattice.matrix {
        result.push_str(&format!(
            "  {:20.15}  {:20.15}  {:20.15}\n",
            row[0], row[1], row[2]
        ));
    }

    let elements: Vec<&str> = runs.iter().map(|(e, _)| e.as_str()).collect();
    let counts: Vec<String> = runs.iter().map(|(_, n)| n.to_string()).collect();
    result.push_str(&format!("   {}\n", elements.join("   ")));
    result.push_str(&format!("   {}\n", counts.join("   ")));

    result.push_str("Direct\n");

    for atom in &crystal.atoms {
        let p = atom.position;
        result.push_str(&format!(
            "  {:20.15}  {:20.15}  {:20.15}\n",
            p[0], p[1], p[2]
        ));
    }

    result
}

/// 写出 POSCAR 文件
pub fn write_poscar_file(crystal: &Crystal, path: &Path) -> Result<()> {
    fs::write(path, to_poscar_string(crystal)).map_err(|e| PhonoflowError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}
