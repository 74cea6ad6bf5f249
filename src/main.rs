//! # phonoflow - 有限位移法声子计算工作流
//!
//! 生成位移超胞，在 Slurm 上用 VASP 计算受力（或导入已有结果），
//! 组装力集与 NAC 参数，再用 phonopy 得到力常数、热力学性质、DOS 与能带。
//!
//! ## 子命令
//! - `run`  - 执行完整的工作流
//! - `init` - 只生成位移超胞
//! - `plan` - 校验输入并打印运行计划
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     └── workflow/  (工作流编排)
//!   │           ├── engine/   (作业提交、等待与记录存储)
//!   │           └── phonopy/  (声子计算库接口)
//!   ├── parsers/    (POSCAR、OUTCAR 与 phonopy 输出解析)
//!   ├── models/     (数据模型)
//!   ├── batch/      (文件收集与并行处理)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod engine;
mod error;
mod models;
mod parsers;
mod phonopy;
mod utils;
mod workflow;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
