//! # 计算记录数据模型
//!
//! `CalculationRecord` 是一次外部计算（新提交、从目录导入或从记录库读取）的结果引用。
//! 采集阶段产生，组装阶段只读。
//!
//! ## 依赖关系
//! - 被 `parsers/outcar.rs`、`engine/`、`workflow/` 使用
//! - 使用 `models/structure.rs`

use super::structure::Crystal;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 力数组中最终离子步对应的名字
pub const FINAL_FORCES: &str = "final";
/// 总能中不含熵项的能量
pub const ENERGY_NO_ENTROPY: &str = "energy_no_entropy";

/// 计算类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalcType {
    /// 位移超胞受力
    Forces,
    /// Born 有效电荷与介电张量
    Nac,
}

impl std::fmt::Display for CalcType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalcType::Forces => write!(f, "forces"),
            CalcType::Nac => write!(f, "nac"),
        }
    }
}

/// 记录所属的槽位：第 n 个超胞（从 1 开始）或 NAC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalcSlot {
    Supercell(usize),
    Nac,
}

impl CalcSlot {
    /// 作业标签，例如 `supercell_001`、`born_and_epsilon`
    pub fn label(&self) -> String {
        match self {
            CalcSlot::Supercell(n) => format!("supercell_{:03}", n),
            CalcSlot::Nac => "born_and_epsilon".to_string(),
        }
    }

    pub fn calc_type(&self) -> CalcType {
        match self {
            CalcSlot::Supercell(_) => CalcType::Forces,
            CalcSlot::Nac => CalcType::Nac,
        }
    }
}

impl std::fmt::Display for CalcSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// 记录来源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordOrigin {
    Submitted { job_id: String, workdir: PathBuf },
    Immigrant { folder: PathBuf },
    Stored { node_id: String },
}

/// 杂项输出
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Misc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_energies: Option<BTreeMap<String, f64>>,
}

/// 计算输出；每一项都可能缺失，由组装阶段判断
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalcOutputs {
    /// 命名的力数组，组装只使用 `final`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forces: Option<BTreeMap<String, Vec<[f64; 3]>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub misc: Option<Misc>,

    /// 每个原子的 Born 有效电荷张量
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub born_charges: Option<Vec<[[f64; 3]; 3]>>,

    /// 宏观介电张量
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dielectrics: Option<[[f64; 3]; 3]>,
}

impl CalcOutputs {
    /// 最终受力，没有时返回 None
    pub fn final_forces(&self) -> Option<&Vec<[f64; 3]>> {
        self.forces.as_ref().and_then(|f| f.get(FINAL_FORCES))
    }

    /// 不含熵项的总能
    pub fn energy_no_entropy(&self) -> Option<f64> {
        self.misc
            .as_ref()
            .and_then(|m| m.total_energies.as_ref())
            .and_then(|e| e.get(ENERGY_NO_ENTROPY).copied())
    }
}

/// 一次计算的完整记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationRecord {
    pub slot: CalcSlot,
    pub origin: RecordOrigin,
    /// 计算使用的输入结构
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<Crystal>,
    #[serde(default)]
    pub outputs: CalcOutputs,
}

impl CalculationRecord {
    pub fn new(slot: CalcSlot, origin: RecordOrigin) -> Self {
        CalculationRecord {
            slot,
            origin,
            structure: None,
            outputs: CalcOutputs::default(),
        }
    }

    pub fn with_structure(mut self, structure: Crystal) -> Self {
        self.structure = Some(structure);
        self
    }

    pub fn with_outputs(mut self, outputs: CalcOutputs) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn label(&self) -> String {
        self.slot.label()
    }
}
