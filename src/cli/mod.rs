//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `run`: 执行完整的声子工作流
//! - `init`: 只生成位移超胞
//! - `plan`: 校验输入并打印运行计划
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: run, init, plan

pub mod init;
pub mod plan;
pub mod run;

use clap::{Parser, Subcommand};

/// phonoflow - 有限位移法声子计算工作流
#[derive(Parser)]
#[command(name = "phonoflow")]
#[command(version)]
#[command(about = "Finite-displacement phonon workflow driving VASP and phonopy on Slurm", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Run the phonon workflow described by an input file
    Run(run::RunArgs),

    /// Generate displaced supercells without running any calculation
    Init(init::InitArgs),

    /// Validate an input file and print the run plan
    Plan(plan::PlanArgs),
}
