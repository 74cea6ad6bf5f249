//! # init 子命令 CLI 定义
//!
//! 只做超胞初始化，不需要工作流输入文件。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/init.rs`

use clap::Args;
use std::path::PathBuf;

/// init 子命令参数
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Unit cell in POSCAR format
    pub structure: PathBuf,

    /// Supercell matrix: 3 diagonal elements or 9 row-major elements
    #[arg(long, num_args = 1.., value_delimiter = ',', required = true, allow_negative_numbers = true)]
    pub dim: Vec<i64>,

    /// q-point mesh: 3 integers or a single sampling density
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub mesh: Option<Vec<f64>>,

    /// Displacement distance (Angstrom)
    #[arg(long, default_value_t = 0.01)]
    pub distance: f64,

    /// Record that NAC will be applied
    #[arg(long)]
    pub nac: bool,

    /// Symmetry tolerance
    #[arg(long, default_value_t = 1e-5)]
    pub symprec: f64,

    /// Python interpreter with phonopy installed
    #[arg(long, env = "PHONOFLOW_PYTHON", default_value = "python3")]
    pub python: String,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}
