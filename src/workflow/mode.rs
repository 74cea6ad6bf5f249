//! # 运行模式
//!
//! 工作流开始时一次性决定的运行方式：
//! 受力获取策略 × 后处理分支，再加上是否做 NAC。
//!
//! ## 依赖关系
//! - 被 `workflow/inputs.rs`、`workflow/mod.rs`、`commands/plan.rs` 使用

use crate::utils::output::KeyValue;
use crate::utils::slurm::JobOptions;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 从已有计算目录导入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImmigrantFolders {
    /// 按超胞顺序排列
    #[serde(default)]
    pub force: Vec<PathBuf>,
    #[serde(default)]
    pub nac: Vec<PathBuf>,
}

/// 从记录存储导入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationNodes {
    #[serde(default)]
    pub force: Vec<String>,
    #[serde(default)]
    pub nac: Vec<String>,
}

/// 受力与 NAC 的获取方式
#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition {
    Fresh,
    ImportFolders(ImmigrantFolders),
    ImportRecords(CalculationNodes),
}

/// 远程 phonopy 作业设置
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePhonopy {
    pub code_string: String,
    pub options: JobOptions,
}

/// 组装之后的后处理分支
#[derive(Debug, Clone, PartialEq)]
pub enum Postprocess {
    DryRun,
    Remote(RemotePhonopy),
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub acquisition: Acquisition,
    pub postprocess: Postprocess,
    pub is_nac: bool,
}

impl RunPlan {
    pub fn is_import(&self) -> bool {
        !matches!(self.acquisition, Acquisition::Fresh)
    }

    /// 用于 `plan` 命令与运行开始时的摘要
    pub fn summary(&self) -> Vec<KeyValue> {
        let acquisition = match &self.acquisition {
            Acquisition::Fresh => "fresh submission".to_string(),
            Acquisition::ImportFolders(f) => format!(
                "import {} force folder(s), {} NAC folder(s)",
                f.force.len(),
                f.nac.len()
            ),
            Acquisition::ImportRecords(n) => format!(
                "import {} force record(s), {} NAC record(s)",
                n.force.len(),
                n.nac.len()
            ),
        };
        let postprocess = match &self.postprocess {
            Postprocess::DryRun => "dry run (stop after assembly)".to_string(),
            Postprocess::Remote(r) => format!("remote phonopy ({})", r.code_string),
            Postprocess::Local => "local phonopy".to_string(),
        };
        vec![
            KeyValue::new("Acquisition", acquisition),
            KeyValue::new("Post-processing", postprocess),
            KeyValue::new("NAC", self.is_nac),
        ]
    }
}
