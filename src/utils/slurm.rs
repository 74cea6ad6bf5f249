//! # Slurm 工具
//!
//! 生成 sbatch 提交脚本，调用 `sbatch`/`squeue` 提交与查询作业。
//!
//! ## 依赖关系
//! - 被 `engine/slurm.rs`、`cli/run.rs` 使用
//! - 使用 `regex` 解析 sbatch 输出

use crate::error::{PhonoflowError, Result};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

/// Slurm 作业配置
#[derive(Debug, Clone, PartialEq)]
pub struct SlurmConfig {
    pub job_name: String,
    pub partition: String,
    /// 为空时不写 `--constraint`
    pub constraint: String,
    pub nodes: u32,
    pub ntasks: u32,
    pub cpus_per_task: u32,
    pub mem_per_cpu: String,
    pub time_limit: String,
    pub modules: Vec<String>,
    pub module_path: Option<String>,
}

impl Default for SlurmConfig {
    fn default() -> Self {
        SlurmConfig {
            job_name: "job".to_string(),
            partition: "cpu".to_string(),
            constraint: String::new(),
            nodes: 1,
            ntasks: 32,
            cpus_per_task: 1,
            mem_per_cpu: "3G".to_string(),
            time_limit: "24:00:00".to_string(),
            modules: vec![],
            module_path: None,
        }
    }
}

/// 单个作业对默认配置的覆盖项（工作流输入中的 `options`）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobOptions {
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default)]
    pub constraint: Option<String>,
    #[serde(default)]
    pub nodes: Option<u32>,
    #[serde(default)]
    pub ntasks: Option<u32>,
    #[serde(default)]
    pub cpus_per_task: Option<u32>,
    #[serde(default)]
    pub mem_per_cpu: Option<String>,
    #[serde(default)]
    pub time_limit: Option<String>,
    #[serde(default)]
    pub modules: Option<Vec<String>>,
}

impl SlurmConfig {
    /// 应用覆盖项并设置作业名
    pub fn with_options(&self, job_name: &str, options: Option<&JobOptions>) -> SlurmConfig {
        let mut config = self.clone();
        config.job_name = job_name.to_string();

        let Some(opts) = options else {
            return config;
        };
        if let Some(v) = &opts.partition {
            config.partition = v.clone();
        }
        if let Some(v) = &opts.constraint {
            config.constraint = v.clone();
        }
        if let Some(v) = opts.nodes {
            config.nodes = v;
        }
        if let Some(v) = opts.ntasks {
            config.ntasks = v;
        }
        if let Some(v) = opts.cpus_per_task {
            config.cpus_per_task = v;
        }
        if let Some(v) = &opts.mem_per_cpu {
            config.mem_per_cpu = v.clone();
        }
        if let Some(v) = &opts.time_limit {
            config.time_limit = v.clone();
        }
        if let Some(v) = &opts.modules {
            config.modules = v.clone();
        }
        config
    }
}

/// 生成 sbatch 脚本内容，`exec_lines` 依次执行
pub fn generate_sbatch_script(config: &SlurmConfig, workdir: &Path, exec_lines: &[String]) -> String {
    let constraint = if config.constraint.is_empty() {
        String::new()
    } else {
        format!("#SBATCH --constraint \"{}\"\n", config.constraint)
    };

    let module_path = config
        .module_path
        .as_ref()
        .map(|p| format!("export MODULEPATH=\"{}:$MODULEPATH\"\n", p))
        .unwrap_or_default();

    let module_loads = config
        .modules
        .iter()
        .map(|m| format!("module load {}", m))
        .collect::<Vec<_>>()
        .join("\n");

    let commands = exec_lines
        .iter()
        .map(|cmd| format!("echo \"Running: {}\"\n{}", cmd.replace('"', "\\\""), cmd))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"#!/bin/bash
{}#SBATCH --partition {}
#SBATCH --nodes={}
#SBATCH --mem-per-cpu {}
#SBATCH --time {}
#SBATCH -c {}
#SBATCH -n {}
#SBATCH -J {}
#SBATCH -o slurm_logs/%x.out
#SBATCH -e slurm_logs/%x.err

set -euo pipefail

{}module purge 2>&1
{}
echo "Loaded modules"

cd "{}"
echo "PWD=$(pwd)"
{}

echo "Timings:"
sacct -o JobID,Submit,Start,End,CPUTime,State -j $SLURM_JOBID
"#,
        constraint,
        config.partition,
        config.nodes,
        config.mem_per_cpu,
        config.time_limit,
        config.cpus_per_task,
        config.ntasks,
        config.job_name,
        module_path,
        module_loads,
        workdir.display(),
        commands,
    )
}

/// 从 sbatch 输出中提取作业号
pub fn parse_job_id(stdout: &str) -> Option<String> {
    let pattern = Regex::new(r"Submitted batch job\s+(\d+)").ok()?;
    pattern
        .captures(stdout)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// 在作业目录中提交脚本，返回作业号
pub fn submit_script(script: &Path, workdir: &Path) -> Result<String> {
    let out = Command::new("sbatch")
        .arg(script)
        .current_dir(workdir)
        .output()
        .map_err(|_| PhonoflowError::CommandNotFound {
            command: "sbatch".to_string(),
        })?;

    let stdout = String::from_utf8_lossy(&out.stdout);
    if !out.status.success() {
        return Err(PhonoflowError::CommandFailed {
            command: format!("sbatch {}", script.display()),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        });
    }

    parse_job_id(&stdout).ok_or_else(|| PhonoflowError::CommandFailed {
        command: format!("sbatch {}", script.display()),
        stderr: format!("unexpected output: {}", stdout.trim()),
    })
}

/// 作业是否仍在队列中
///
/// squeue 对已清除的作业返回非零状态，视为不在队列中。
pub fn is_queued(job_id: &str) -> Result<bool> {
    let out = Command::new("squeue")
        .args(["-h", "-o", "%T", "-j", job_id])
        .output()
        .map_err(|_| PhonoflowError::CommandNotFound {
            command: "squeue".to_string(),
        })?;

    if !out.status.success() {
        return Ok(false);
    }
    Ok(!String::from_utf8_lossy(&out.stdout).trim().is_empty())
}
