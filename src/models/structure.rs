//! # 晶体结构数据模型
//!
//! 单胞、原胞以及每个位移超胞都用 `Crystal` 表示。
//! 结构在初始化阶段创建一次，之后只被引用，不会被修改。
//!
//! ## 依赖关系
//! - 被 `parsers/`、`phonopy/`、`engine/`、`workflow/` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};

/// 晶格参数表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 各晶格向量长度 (a, b, c)
    pub fn lengths(&self) -> [f64; 3] {
        let mut out = [0.0; 3];
        for (i, v) in self.matrix.iter().enumerate() {
            out[i] = (v[0].powi(2) + v[1].powi(2) + v[2].powi(2)).sqrt();
        }
        out
    }

    /// 计算晶格体积
    pub fn volume(&self) -> f64 {
        let a = self.matrix[0];
        let b = self.matrix[1];
        let c = self.matrix[2];

        // 行列式计算
        a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
            + a[2] * (b[0] * c[1] - b[1] * c[0])
    }

    /// 笛卡尔坐标转分数坐标
    pub fn cart_to_frac(&self, cart: [f64; 3]) -> [f64; 3] {
        let m = self.matrix;
        let det = self.volume();

        if det.abs() < 1e-10 {
            return cart;
        }

        let inv = [
            [
                (m[1][1] * m[2][2] - m[1][2] * m[2][1]) / det,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / det,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / det,
            ],
            [
                (m[1][2] * m[2][0] - m[1][0] * m[2][2]) / det,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / det,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) / det,
            ],
            [
                (m[1][0] * m[2][1] - m[1][1] * m[2][0]) / det,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) / det,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) / det,
            ],
        ];

        // r_cart = f · M  =>  f = r_cart · M^-1
        [
            cart[0] * inv[0][0] + cart[1] * inv[1][0] + cart[2] * inv[2][0],
            cart[0] * inv[0][1] + cart[1] * inv[1][1] + cart[2] * inv[2][1],
            cart[0] * inv[0][2] + cart[1] * inv[1][2] + cart[2] * inv[2][2],
        ]
    }

    /// 分数坐标转笛卡尔坐标
    pub fn frac_to_cart(&self, frac: [f64; 3]) -> [f64; 3] {
        let m = self.matrix;
        [
            frac[0] * m[0][0] + frac[1] * m[1][0] + frac[2] * m[2][0],
            frac[0] * m[0][1] + frac[1] * m[1][1] + frac[2] * m[2][1],
            frac[0] * m[0][2] + frac[1] * m[1][2] + frac[2] * m[2][2],
        ]
    }
}

/// 原子信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// 元素符号
    pub element: String,

    /// 分数坐标 [x, y, z]
    pub position: [f64; 3],

    /// 原子质量 (amu)，由 phonopy 给出时才有
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass: Option<f64>,
}

impl Atom {
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Atom {
            element: element.into(),
            position,
            mass: None,
        }
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = Some(mass);
        self
    }
}

/// 晶体结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crystal {
    /// 结构名称
    pub name: String,

    /// 晶格
    pub lattice: Lattice,

    /// 原子列表
    pub atoms: Vec<Atom>,
}

impl Crystal {
    pub fn new(name: impl Into<String>, lattice: Lattice, atoms: Vec<Atom>) -> Self {
        Crystal {
            name: name.into(),
            lattice,
            atoms,
        }
    }

    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// 计算化学式
    pub fn formula(&self) -> String {
        use std::collections::BTreeMap;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for atom in &self.atoms {
            *counts.entry(atom.element.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, count)| {
                if count == 1 {
                    el.to_string()
                } else {
                    format!("{}{}", el, count)
                }
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// 按出现顺序去重的元素列表（POSCAR/POTCAR 的顺序）
    pub fn species(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        for atom in &self.atoms {
            if !order.contains(&atom.element) {
                order.push(atom.element.clone());
            }
        }
        order
    }

    /// 判断两个结构在容差内是否一致。
    ///
    /// 原子数、元素顺序必须完全相同；晶格向量逐分量比较；
    /// 分数坐标之差先减去最近的整数平移再比较。
    pub fn matches(&self, other: &Crystal, tolerance: f64) -> bool {
        if self.atoms.len() != other.atoms.len() {
            return false;
        }

        for (row_a, row_b) in self.lattice.matrix.iter().zip(other.lattice.matrix.iter()) {
            for k in 0..3 {
                if (row_a[k] - row_b[k]).abs() > tolerance {
                    return false;
                }
            }
        }

        self.atoms.iter().zip(other.atoms.iter()).all(|(a, b)| {
            if a.element != b.element {
                return false;
            }
            (0..3).all(|k| {
                let diff = a.position[k] - b.position[k];
                (diff - diff.round()).abs() <= tolerance
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rocksalt() -> Crystal {
        let lattice = Lattice::from_vectors([[5.64, 0.0, 0.0], [0.0, 5.64, 0.0], [0.0, 0.0, 5.64]]);
        let atoms = vec![
            Atom::new("Na", [0.0, 0.0, 0.0]),
            Atom::new("Na", [0.5, 0.5, 0.0]),
            Atom::new("Cl", [0.5, 0.0, 0.0]),
            Atom::new("Cl", [0.0, 0.5, 0.0]),
        ];
        Crystal::new("NaCl", lattice, atoms)
    }

    #[test]
    fn test_lattice_volume_cubic() {
        let lattice = Lattice::from_vectors([[5.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 5.0]]);
        assert!((lattice.volume().abs() - 125.0).abs() < 1e-6);
    }

    #[test]
    fn test_frac_cart_inverse() {
        let lattice = Lattice::from_vectors([[3.0, 0.0, 0.0], [-1.5, 2.598, 0.0], [0.0, 0.0, 5.0]]);
        let frac = [0.25, 0.5, 0.75];
        let back = lattice.cart_to_frac(lattice.frac_to_cart(frac));
        for k in 0..3 {
            assert!((back[k] - frac[k]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_crystal_formula_and_species() {
        let crystal = rocksalt();
        assert_eq!(crystal.formula(), "Cl2Na2");
        assert_eq!(crystal.species(), vec!["Na".to_string(), "Cl".to_string()]);
    }

    #[test]
    fn test_matches_across_periodic_image() {
        let a = rocksalt();
        let mut b = rocksalt();
        b.atoms[0].position = [0.999999, 1e-7, -1e-7];
        assert!(a.matches(&b, 1e-5));
    }

    #[test]
    fn test_matches_rejects_displaced_atom() {
        let a = rocksalt();
        let mut b = rocksalt();
        b.atoms[2].position[0] += 0.01;
        assert!(!a.matches(&b, 1e-5));
    }

    #[test]
    fn test_matches_rejects_species_swap() {
        let a = rocksalt();
        let mut b = rocksalt();
        b.atoms.swap(0, 2);
        assert!(!a.matches(&b, 1e-5));
    }

    #[test]
    fn test_matches_rejects_lattice_strain() {
        let a = rocksalt();
        let mut b = rocksalt();
        b.lattice.matrix[2][2] = 5.65;
        assert!(!a.matches(&b, 1e-5));
    }
}
