//! # 声子计算设置
//!
//! `PhononSettings` 是用户输入的原始设置，`PhononSettingInfo` 是初始化阶段由
//! phonopy 补全后的整合记录，下游每一步都只读它。
//!
//! ## 依赖关系
//! - 被 `workflow/`、`phonopy/`、`engine/` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};

pub const DEFAULT_MESH_DENSITY: f64 = 100.0;
pub const DEFAULT_DISTANCE: f64 = 0.01;
pub const DEFAULT_SYMMETRY_TOLERANCE: f64 = 1e-5;

/// 超胞变换矩阵：三个整数（对角）或 3x3 整数矩阵
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SupercellMatrix {
    Diagonal([i64; 3]),
    Full([[i64; 3]; 3]),
}

impl SupercellMatrix {
    /// 展开为 3x3 矩阵
    pub fn to_matrix(&self) -> [[i64; 3]; 3] {
        match *self {
            SupercellMatrix::Diagonal([a, b, c]) => [[a, 0, 0], [0, b, 0], [0, 0, c]],
            SupercellMatrix::Full(m) => m,
        }
    }

    /// 行列式，即超胞包含的单胞数
    pub fn determinant(&self) -> i64 {
        let m = self.to_matrix();
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// phonopy conf 中 `DIM` 标签的值
    pub fn to_dim_tag(&self) -> String {
        match self {
            SupercellMatrix::Diagonal(d) => format!("{} {} {}", d[0], d[1], d[2]),
            SupercellMatrix::Full(m) => m
                .iter()
                .flat_map(|row| row.iter())
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// 原胞矩阵；缺省时交给 phonopy 自动判断
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimitiveMatrix {
    Keyword(String),
    Matrix([[f64; 3]; 3]),
}

impl Default for PrimitiveMatrix {
    fn default() -> Self {
        PrimitiveMatrix::Keyword("auto".to_string())
    }
}

impl PrimitiveMatrix {
    /// phonopy conf 中 `PRIMITIVE_AXES` 标签的值
    pub fn to_axes_tag(&self) -> String {
        match self {
            PrimitiveMatrix::Keyword(k) => k.to_uppercase(),
            PrimitiveMatrix::Matrix(m) => m
                .iter()
                .flat_map(|row| row.iter())
                .map(|v| format!("{}", v))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// q 点网格：三个整数或采样密度
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Mesh {
    Numbers([u32; 3]),
    Density(f64),
}

impl Default for Mesh {
    fn default() -> Self {
        Mesh::Density(DEFAULT_MESH_DENSITY)
    }
}

impl Mesh {
    /// phonopy conf 中 `MESH` 标签的值
    pub fn to_mesh_tag(&self) -> String {
        match self {
            Mesh::Numbers(n) => format!("{} {} {}", n[0], n[1], n[2]),
            Mesh::Density(d) => format!("{}", d),
        }
    }
}

/// 单个原子位移（phonopy type-1 dataset 的一项）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomDisplacement {
    /// 超胞中的原子序号，从 0 开始
    pub number: usize,
    /// 笛卡尔位移 (Å)
    pub displacement: [f64; 3],
}

/// phonopy 可理解的位移数据集
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplacementDataset {
    pub natom: usize,
    pub first_atoms: Vec<AtomDisplacement>,
}

impl DisplacementDataset {
    /// 位移超胞的个数
    pub fn num_supercells(&self) -> usize {
        self.first_atoms.len()
    }
}

/// 用户提供的声子设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhononSettings {
    /// 必需，缺失时在初始化阶段报错
    #[serde(default)]
    pub supercell_matrix: Option<SupercellMatrix>,

    #[serde(default)]
    pub primitive_matrix: PrimitiveMatrix,

    #[serde(default)]
    pub mesh: Mesh,

    #[serde(default = "default_distance")]
    pub distance: f64,

    #[serde(default)]
    pub is_nac: bool,
}

fn default_distance() -> f64 {
    DEFAULT_DISTANCE
}

impl PhononSettings {
    pub fn new(supercell_matrix: SupercellMatrix) -> Self {
        PhononSettings {
            supercell_matrix: Some(supercell_matrix),
            primitive_matrix: PrimitiveMatrix::default(),
            mesh: Mesh::default(),
            distance: DEFAULT_DISTANCE,
            is_nac: false,
        }
    }
}

/// 初始化后整合的设置记录（输出 `phonon_setting_info`）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhononSettingInfo {
    pub supercell_matrix: [[i64; 3]; 3],
    pub primitive_matrix: [[f64; 3]; 3],
    pub mesh: Mesh,
    pub distance: f64,
    pub is_nac: bool,
    pub symmetry_tolerance: f64,
    pub displacement_dataset: DisplacementDataset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl PhononSettingInfo {
    pub fn num_supercells(&self) -> usize {
        self.displacement_dataset.num_supercells()
    }

    /// 以 3x3 矩阵写出的 `DIM` 标签
    pub fn dim_tag(&self) -> String {
        SupercellMatrix::Full(self.supercell_matrix).to_dim_tag()
    }

    /// 以 3x3 矩阵写出的 `PRIMITIVE_AXES` 标签
    pub fn primitive_axes_tag(&self) -> String {
        PrimitiveMatrix::Matrix(self.primitive_matrix).to_axes_tag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults_from_json() {
        let settings: PhononSettings =
            serde_json::from_str(r#"{"supercell_matrix": [2, 2, 2]}"#).unwrap();
        assert_eq!(
            settings.supercell_matrix,
            Some(SupercellMatrix::Diagonal([2, 2, 2]))
        );
        assert_eq!(settings.mesh, Mesh::Density(100.0));
        assert!((settings.distance - 0.01).abs() < 1e-12);
        assert!(!settings.is_nac);
        assert_eq!(settings.primitive_matrix, PrimitiveMatrix::default());
    }

    #[test]
    fn test_settings_without_supercell_matrix_still_parse() {
        let settings: PhononSettings = serde_json::from_str(r#"{"is_nac": true}"#).unwrap();
        assert!(settings.supercell_matrix.is_none());
        assert!(settings.is_nac);
    }

    #[test]
    fn test_full_supercell_matrix_and_mesh_numbers() {
        let settings: PhononSettings = serde_json::from_str(
            r#"{"supercell_matrix": [[0, 2, 2], [2, 0, 2], [2, 2, 0]], "mesh": [11, 11, 11]}"#,
        )
        .unwrap();
        let smat = settings.supercell_matrix.unwrap();
        assert_eq!(smat.determinant(), 16);
        assert_eq!(smat.to_dim_tag(), "0 2 2 2 0 2 2 2 0");
        assert_eq!(settings.mesh.to_mesh_tag(), "11 11 11");
    }

    #[test]
    fn test_diagonal_expansion() {
        let smat = SupercellMatrix::Diagonal([2, 3, 1]);
        assert_eq!(smat.to_matrix(), [[2, 0, 0], [0, 3, 0], [0, 0, 1]]);
        assert_eq!(smat.determinant(), 6);
    }

    #[test]
    fn test_dataset_counts_supercells() {
        let dataset: DisplacementDataset = serde_json::from_str(
            r#"{"natom": 64, "first_atoms": [
                {"number": 0, "displacement": [0.01, 0.0, 0.0]},
                {"number": 32, "displacement": [0.01, 0.0, 0.0], "forces": []}
            ]}"#,
        )
        .unwrap();
        assert_eq!(dataset.num_supercells(), 2);
        assert_eq!(dataset.first_atoms[1].number, 32);
    }
}
