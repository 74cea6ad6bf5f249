//! # plan 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/plan.rs`

use super::run::ModeFlags;

use clap::Args;
use std::path::PathBuf;

/// plan 子命令参数
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Workflow input file (YAML or JSON)
    pub input: PathBuf,

    #[command(flatten)]
    pub flags: ModeFlags,
}
