//! # 解析器模块
//!
//! 提供结构文件、VASP 输出和 phonopy 输出的解析器。
//!
//! ## 依赖关系
//! - 被 `engine/`、`commands/`、`workflow/` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: poscar, outcar, phonopy_out

pub mod outcar;
pub mod phonopy_out;
pub mod poscar;
