//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `workflow/`, `engine/`, `phonopy/`, `utils/`
//! - 子模块: run, init, plan

pub mod init;
pub mod plan;
pub mod run;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Run(args) => run::execute(args),
        Commands::Init(args) => init::execute(args),
        Commands::Plan(args) => plan::execute(args),
    }
}
