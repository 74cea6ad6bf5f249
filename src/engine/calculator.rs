//! # VASP 计算设置
//!
//! 工作流输入中的 `calculator_settings`，以及由它写出的 INCAR、KPOINTS、POTCAR。
//!
//! ## 依赖关系
//! - 被 `engine/slurm.rs`、`workflow/inputs.rs` 使用
//! - 使用 `parsers/poscar.rs` 的元素分组

use crate::error::{PhonoflowError, Result};
use crate::models::{CalcType, Crystal};
use crate::parsers::poscar::species_runs;
use crate::utils::slurm::JobOptions;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// INCAR 标签值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl IncarValue {
    fn to_tag(&self) -> String {
        match self {
            IncarValue::Bool(true) => ".TRUE.".to_string(),
            IncarValue::Bool(false) => ".FALSE.".to_string(),
            IncarValue::Int(v) => v.to_string(),
            IncarValue::Float(v) => format!("{}", v),
            IncarValue::Text(v) => v.clone(),
        }
    }
}

fn default_command() -> String {
    "srun vasp_std".to_string()
}

/// 单类计算（受力或 NAC）的设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatorConfig {
    #[serde(default)]
    pub incar: BTreeMap<String, IncarValue>,

    /// Gamma 中心 k 点网格
    pub kpoints_mesh: [u32; 3],

    /// 按元素存放 `<dir>/<name>/POTCAR` 的赝势库
    #[serde(default)]
    pub potcar_dir: Option<PathBuf>,

    /// 元素到赝势目录名的映射，如 `Na: Na_pv`
    #[serde(default)]
    pub potcar_map: BTreeMap<String, String>,

    /// 直接使用的完整 POTCAR，优先于 `potcar_dir`
    #[serde(default)]
    pub potcar_file: Option<PathBuf>,

    #[serde(default = "default_command")]
    pub command: String,

    /// 该类作业的 Slurm 覆盖项
    #[serde(default)]
    pub options: Option<JobOptions>,
}

/// `calculator_settings`：受力计算必需，NAC 计算缺省时沿用受力设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatorSettings {
    pub forces: CalculatorConfig,
    #[serde(default)]
    pub nac: Option<CalculatorConfig>,
}

impl CalculatorSettings {
    pub fn for_type(&self, calc_type: CalcType) -> &CalculatorConfig {
        match calc_type {
            CalcType::Forces => &self.forces,
            CalcType::Nac => self.nac.as_ref().unwrap_or(&self.forces),
        }
    }
}

impl CalculatorConfig {
    /// INCAR 文本；NAC 计算强制 `LEPSILON = .TRUE.`
    pub fn incar_string(&self, calc_type: CalcType) -> String {
        let mut tags: BTreeMap<String, String> = self
            .incar
            .iter()
            .map(|(k, v)| (k.to_uppercase(), v.to_tag()))
            .collect();

        if calc_type == CalcType::Nac {
            tags.insert("LEPSILON".to_string(), ".TRUE.".to_string());
        }

        tags.iter()
            .map(|(k, v)| format!("{} = {}\n", k, v))
            .collect()
    }

    pub fn kpoints_string(&self) -> String {
        let m = self.kpoints_mesh;
        format!(
            "Automatic mesh\n0\nGamma\n  {}  {}  {}\n  0  0  0\n",
            m[0], m[1], m[2]
        )
    }

    /// 按 POSCAR 中的元素分组顺序拼接 POTCAR
    pub fn potcar_content(&self, structure: &Crystal) -> Result<String> {
        if let Some(file) = &self.potcar_file {
            return read(file);
        }

        let dir = self
            .potcar_dir
            .as_ref()
            .ok_or_else(|| PhonoflowError::MissingSetting("potcar_dir or potcar_file".to_string()))?;

        let mut content = String::new();
        for (element, _) in species_runs(structure) {
            let name = self.potcar_map.get(&element).unwrap_or(&element);
            content.push_str(&read(&dir.join(name).join("POTCAR"))?);
        }
        Ok(content)
    }

    /// 在作业目录中写出 INCAR、KPOINTS、POTCAR
    pub fn write_inputs(&self, dir: &Path, structure: &Crystal, calc_type: CalcType) -> Result<()> {
        write(&dir.join("INCAR"), &self.incar_string(calc_type))?;
        write(&dir.join("KPOINTS"), &self.kpoints_string())?;
        write(&dir.join("POTCAR"), &self.potcar_content(structure)?)?;
        Ok(())
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| PhonoflowError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })
}

fn write(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| PhonoflowError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}
