//! # 计算记录存储
//!
//! 每条完成的计算记录以 `<store>/<node_id>.json` 保存，供后续运行按标识导入。
//!
//! ## 依赖关系
//! - 被 `engine/slurm.rs` 使用
//! - 使用 `serde_json`

use crate::error::{PhonoflowError, Result};
use crate::models::CalculationRecord;

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        RecordStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 节点标识对应的文件路径；标识可带或不带 `.json`
    pub fn path_for(&self, node_id: &str) -> PathBuf {
        let id = node_id.trim().trim_end_matches(".json");
        self.dir.join(format!("{}.json", id))
    }

    pub fn save(&self, node_id: &str, record: &CalculationRecord) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| PhonoflowError::FileWriteError {
            path: self.dir.display().to_string(),
            source: e,
        })?;
        let path = self.path_for(node_id);
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json).map_err(|e| PhonoflowError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(path)
    }

    pub fn load(&self, node_id: &str) -> Result<CalculationRecord> {
        let path = self.path_for(node_id);
        if !path.exists() {
            return Err(PhonoflowError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = fs::read_to_string(&path).map_err(|e| PhonoflowError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| PhonoflowError::ParseError {
            format: "record".to_string(),
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}
