//! # 声子结果数据模型
//!
//! 力集、NAC 参数、力常数以及声子性质曲线。
//! 每一项在输出集合中都是独立可选的，取决于实际执行的分支。
//!
//! ## 依赖关系
//! - 被 `phonopy/`、`parsers/phonopy_out.rs`、`workflow/`、`utils/export.rs` 使用
//! - 使用 `models/structure.rs`

use super::structure::Crystal;

use serde::{Deserialize, Serialize};

/// VASP 单位下的 NAC 换算因子 (Hartree * Bohr)
pub const VASP_NAC_FACTOR: f64 = 14.399652;

/// 按超胞顺序排列的受力集合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceSets {
    /// 每个位移超胞一项，每项为每个原子的力 (eV/Å)
    pub force_sets: Vec<Vec<[f64; 3]>>,
    /// 每个超胞的总能，只有全部超胞都有时才存在
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energies: Option<Vec<f64>>,
}

impl ForceSets {
    pub fn len(&self) -> usize {
        self.force_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.force_sets.is_empty()
    }
}

/// 非解析项修正参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NacParams {
    /// 原胞中每个原子的 Born 有效电荷
    pub born_charges: Vec<[[f64; 3]; 3]>,
    pub dielectric: [[f64; 3]; 3],
    pub primitive: Crystal,
    pub factor: f64,
    /// 对称独立原子（原胞中的序号，从 0 开始），写 BORN 时使用
    pub independent_atoms: Vec<usize>,
}

/// 力常数 (natom x natom 个 3x3 块)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceConstants {
    pub force_constants: Vec<Vec<[[f64; 3]; 3]>>,
}

impl ForceConstants {
    pub fn num_atoms(&self) -> usize {
        self.force_constants.len()
    }
}

/// 热力学性质曲线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalProperties {
    /// K
    pub temperatures: Vec<f64>,
    /// kJ/mol
    pub free_energy: Vec<f64>,
    /// J/K/mol
    pub entropy: Vec<f64>,
    /// J/K/mol
    pub heat_capacity: Vec<f64>,
}

/// 总态密度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dos {
    /// THz
    pub frequencies: Vec<f64>,
    pub total_dos: Vec<f64>,
}

/// 投影态密度，`projected_dos[i]` 为第 i 组原子的曲线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pdos {
    pub frequencies: Vec<f64>,
    pub projected_dos: Vec<Vec<f64>>,
}

/// 能带结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandStructure {
    pub qpoints: Vec<[f64; 3]>,
    pub distances: Vec<f64>,
    /// `frequencies[q][band]`，THz
    pub frequencies: Vec<Vec<f64>>,
    /// 高对称点标签（路径端点）
    #[serde(default)]
    pub labels: Vec<String>,
}

impl BandStructure {
    pub fn num_bands(&self) -> usize {
        self.frequencies.first().map(|f| f.len()).unwrap_or(0)
    }
}

/// 远程 phonopy 作业的五个命名输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonopyOutputs {
    pub thermal_properties: ThermalProperties,
    pub dos: Dos,
    pub pdos: Pdos,
    pub band_structure: BandStructure,
    pub force_constants: ForceConstants,
}

/// 本地计算得到的声子性质（不含 PDOS）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalPhonon {
    pub thermal_properties: ThermalProperties,
    pub dos: Dos,
    pub band_structure: BandStructure,
}
