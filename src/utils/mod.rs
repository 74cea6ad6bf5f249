//! # 工具函数模块
//!
//! 提供美化输出、进度条、Slurm 脚本生成、曲线导出与绘图等工具。
//!
//! ## 依赖关系
//! - 被 `commands/`、`engine/`、`workflow/` 使用
//! - 子模块: output, progress, slurm, export, plot

pub mod export;
pub mod output;
pub mod plot;
pub mod progress;
pub mod slurm;
