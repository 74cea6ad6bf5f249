//! # run 子命令 CLI 定义
//!
//! 引擎、Slurm 与 phonopy 相关的参数都在这里；
//! 引擎路径与 Python 解释器可以通过环境变量给出。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/run.rs`

use clap::Args;
use std::path::PathBuf;

/// 与输入文件中同名开关取或
#[derive(Args, Debug, Clone, Copy)]
pub struct ModeFlags {
    /// Stop after force sets (and NAC params) are assembled
    #[arg(long)]
    pub dry_run: bool,

    /// Compute phonon properties after assembly
    #[arg(long)]
    pub run_phonopy: bool,

    /// Run phonopy as a Slurm job instead of in-process
    #[arg(long)]
    pub remote_phonopy: bool,
}

/// run 子命令参数
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Workflow input file (YAML or JSON)
    pub input: PathBuf,

    /// Directory receiving the published outputs
    #[arg(short, long, default_value = "phonoflow_out")]
    pub output_dir: PathBuf,

    /// Do not draw DOS and band structure plots
    #[arg(long)]
    pub no_plot: bool,

    #[command(flatten)]
    pub flags: ModeFlags,

    #[command(flatten)]
    pub engine: EngineArgs,

    #[command(flatten)]
    pub slurm: SlurmArgs,
}

#[derive(Args, Debug)]
pub struct EngineArgs {
    /// Root directory for job folders
    #[arg(long, env = "PHONOFLOW_WORK_DIR", default_value = "phonoflow_jobs")]
    pub work_dir: PathBuf,

    /// Calculation record store [default: <work-dir>/records]
    #[arg(long, env = "PHONOFLOW_STORE")]
    pub store: Option<PathBuf>,

    /// Python interpreter with phonopy installed
    #[arg(long, env = "PHONOFLOW_PYTHON", default_value = "python3")]
    pub python: String,

    /// Seconds between job status polls
    #[arg(long, default_value_t = 60)]
    pub poll_interval: u64,

    /// Give up waiting for jobs after this many seconds
    #[arg(long)]
    pub max_wait: Option<u64>,

    /// Number of parallel jobs for parsing imported folders (0 = all CPUs)
    #[arg(short = 'j', long, default_value_t = 0)]
    pub jobs: usize,

    // ─────────────────────────────────────────────────────────────
    // Phonon property sampling
    // ─────────────────────────────────────────────────────────────
    /// Minimum temperature for thermal properties (K)
    #[arg(long, default_value_t = 0.0)]
    pub tmin: f64,

    /// Maximum temperature for thermal properties (K)
    #[arg(long, default_value_t = 1000.0)]
    pub tmax: f64,

    /// Temperature step for thermal properties (K)
    #[arg(long, default_value_t = 10.0)]
    pub tstep: f64,

    /// Number of q-points per band segment
    #[arg(long, default_value_t = 51)]
    pub band_points: usize,
}

/// 作业的默认 Slurm 设置；输入文件中的 `options` 可以逐项覆盖
#[derive(Args, Debug)]
pub struct SlurmArgs {
    /// Slurm partition
    #[arg(long, default_value = "cpu")]
    pub partition: String,

    /// Slurm constraint
    #[arg(long, default_value = "")]
    pub constraint: String,

    /// Number of nodes
    #[arg(long, default_value_t = 1)]
    pub nodes: u32,

    /// Number of tasks
    #[arg(long, default_value_t = 32)]
    pub ntasks: u32,

    /// CPUs per task
    #[arg(long, default_value_t = 1)]
    pub cpus_per_task: u32,

    /// Memory per CPU
    #[arg(long, default_value = "3G")]
    pub mem_per_cpu: String,

    /// Time limit
    #[arg(long, default_value = "24:00:00")]
    pub time_limit: String,

    /// Modules to load (comma-separated)
    #[arg(long, default_value = "")]
    pub modules: String,

    /// Extra module path
    #[arg(long)]
    pub module_path: Option<String>,
}
