//! # 统一错误处理模块
//!
//! 定义 phonoflow 的所有错误类型，使用 `thiserror` 派生。
//! 工作流中的所有致命错误都会终止整个运行，本层不做任何重试。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// phonoflow 统一错误类型
#[derive(Error, Debug)]
pub enum PhonoflowError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Invalid workflow input '{path}': {reason}")]
    InvalidInput { path: String, reason: String },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // 外部命令错误
    // ─────────────────────────────────────────────────────────────
    #[error("External command '{command}' not found in PATH")]
    CommandNotFound { command: String },

    #[error("External command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Phonopy call '{task}' failed: {reason}")]
    PhonopyError { task: String, reason: String },

    #[error("Job '{label}' did not finish within {seconds} s")]
    JobTimeout { label: String, seconds: u64 },

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // 工作流错误
    // ─────────────────────────────────────────────────────────────
    #[error("{0} was not found in the workflow inputs")]
    MissingSetting(String),

    #[error("code_string and options have to be specified for remote phonopy")]
    RemoteConfigIncomplete,

    #[error("immigrant_calculation_folders and calculation_nodes are mutually exclusive")]
    ConflictingImports,

    #[error("Immigrant failed because of inconsistency of supercell structure {index:03}")]
    SupercellMismatch { index: usize },

    #[error("{field} could not be found in calculation {label}")]
    MissingResult { field: String, label: String },

    #[error("Forces could not be retrieved: found {found} of {expected} (missing: {})", format_ordinals(.missing))]
    ForcesNotRetrieved {
        found: usize,
        expected: usize,
        missing: Vec<usize>,
    },

    // ─────────────────────────────────────────────────────────────
    // CSV 错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

fn format_ordinals(ordinals: &[usize]) -> String {
    ordinals
        .iter()
        .map(|i| format!("{:03}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, PhonoflowError>;
