//! # run 命令实现
//!
//! 读取工作流输入，构造 Slurm 引擎与 phonopy 桥接，执行工作流，
//! 然后写出已发布的输出。任何一步失败时，已发布的输出照样写出。
//!
//! ## 依赖关系
//! - 使用 `cli/run.rs` 定义的参数
//! - 使用 `workflow/`, `engine/slurm.rs`, `phonopy/bridge.rs`, `utils/output.rs`

use crate::cli::run::{EngineArgs, RunArgs, SlurmArgs};
use crate::engine::{EngineConfig, SlurmEngine};
use crate::error::Result;
use crate::parsers::poscar::parse_poscar_file;
use crate::phonopy::{PropertyGrid, PythonPhonopy};
use crate::utils::output::{self, KeyValue};
use crate::utils::slurm::SlurmConfig;
use crate::workflow::{PhononWorkflow, WorkflowInputs};

/// 执行 run 命令
pub fn execute(args: RunArgs) -> Result<()> {
    output::print_header("Phonon Workflow");

    let mut inputs = WorkflowInputs::load(&args.input)?;
    inputs.apply_flags(
        args.flags.dry_run,
        args.flags.run_phonopy,
        args.flags.remote_phonopy,
    );

    let structure = parse_poscar_file(&inputs.structure)?;
    output::print_info(&format!(
        "Unit cell {} ({} atoms) from {}",
        structure.formula(),
        structure.num_atoms(),
        inputs.structure.display()
    ));

    let grid = property_grid(&args.engine);
    let library = PythonPhonopy::new(args.engine.python.clone()).with_grid(grid);
    let version = library.check_availability()?;
    output::print_info(&format!("Using phonopy {}", version));

    let config = engine_config(&args.engine, &args.slurm, inputs.label(), grid);
    output::print_info(&format!("Job folders under {}", config.work_dir.display()));
    let mut engine = SlurmEngine::new(config);
    output::print_info(&format!(
        "Calculation records in {}",
        engine.store().dir().display()
    ));

    let mut workflow = PhononWorkflow::new(inputs, structure, &mut engine, &library)?;
    output::print_table(&workflow.plan().summary());

    let result = workflow.run();
    let outputs = workflow.into_outputs();

    let written = outputs.write_to_dir(&args.output_dir, !args.no_plot);
    match &written {
        Ok(files) => output::print_info(&format!(
            "{} file(s) written to {}",
            files.len(),
            args.output_dir.display()
        )),
        Err(e) => output::print_error(&format!("Could not write outputs: {}", e)),
    }

    let rows: Vec<KeyValue> = outputs
        .published()
        .into_iter()
        .map(|name| KeyValue::new(name, "published"))
        .collect();
    output::print_table(&rows);

    result?;
    written?;
    output::print_done("Phonon workflow completed");
    Ok(())
}

fn property_grid(args: &EngineArgs) -> PropertyGrid {
    PropertyGrid {
        t_min: args.tmin,
        t_max: args.tmax,
        t_step: args.tstep,
        band_points: args.band_points,
    }
}

fn engine_config(
    args: &EngineArgs,
    slurm: &SlurmArgs,
    label: &str,
    grid: PropertyGrid,
) -> EngineConfig {
    let mut config = EngineConfig::new(&args.work_dir);
    if let Some(store) = &args.store {
        config.store_dir = store.clone();
    }
    config.run_label = label.to_string();
    config.poll_interval = args.poll_interval.max(1);
    config.max_wait = args.max_wait;
    config.jobs = args.jobs;
    config.grid = grid;
    config.slurm = SlurmConfig {
        job_name: label.to_string(),
        partition: slurm.partition.clone(),
        constraint: slurm.constraint.clone(),
        nodes: slurm.nodes,
        ntasks: slurm.ntasks,
        cpus_per_task: slurm.cpus_per_task,
        mem_per_cpu: slurm.mem_per_cpu.clone(),
        time_limit: slurm.time_limit.clone(),
        modules: split_modules(&slurm.modules),
        module_path: slurm.module_path.clone(),
    };
    config
}

fn split_modules(modules: &str) -> Vec<String> {
    modules
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::cli::Commands;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn test_split_modules() {
        assert_eq!(split_modules("vasp/6.4, phonopy/2.20,"), vec!["vasp/6.4", "phonopy/2.20"]);
        assert!(split_modules("").is_empty());
    }

    #[test]
    fn test_engine_config_from_args() {
        let cli = Cli::parse_from([
            "phonoflow",
            "run",
            "wf.yaml",
            "--work-dir",
            "/scratch/run",
            "--store",
            "/scratch/records",
            "--partition",
            "gpu",
            "--modules",
            "vasp/6.4",
            "--max-wait",
            "600",
            "--run-phonopy",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.flags.run_phonopy);
        assert!(!args.flags.dry_run);

        let grid = property_grid(&args.engine);
        let config = engine_config(&args.engine, &args.slurm, "si", grid);
        assert_eq!(config.work_dir, PathBuf::from("/scratch/run"));
        assert_eq!(config.store_dir, PathBuf::from("/scratch/records"));
        assert_eq!(config.run_label, "si");
        assert_eq!(config.max_wait, Some(600));
        assert_eq!(config.slurm.partition, "gpu");
        assert_eq!(config.slurm.modules, vec!["vasp/6.4"]);
        assert_eq!(config.grid.band_points, 51);
    }
}
