//! # 批量处理模块
//!
//! 提供计算目录的文件查找与并行处理能力。
//!
//! ## 功能
//! - 收集匹配文件列表
//! - 并行处理，结果保持顺序
//! - 进度反馈
//!
//! ## 依赖关系
//! - 被 `engine/` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::FileCollector;
pub use runner::BatchRunner;
