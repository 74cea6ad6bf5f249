//! # plan 命令实现
//!
//! 校验工作流输入并打印运行计划，不提交任何作业。
//!
//! ## 依赖关系
//! - 使用 `cli/plan.rs` 定义的参数
//! - 使用 `workflow/inputs.rs`, `utils/output.rs`

use crate::cli::plan::PlanArgs;
use crate::error::Result;
use crate::parsers::poscar::parse_poscar_file;
use crate::utils::output::{self, KeyValue};
use crate::workflow::WorkflowInputs;

/// 执行 plan 命令
pub fn execute(args: PlanArgs) -> Result<()> {
    output::print_header("Run Plan");

    let mut inputs = WorkflowInputs::load(&args.input)?;
    inputs.apply_flags(
        args.flags.dry_run,
        args.flags.run_phonopy,
        args.flags.remote_phonopy,
    );
    let plan = inputs.plan()?;
    let structure = parse_poscar_file(&inputs.structure)?;

    let mut rows = vec![
        KeyValue::new("Label", inputs.label()),
        KeyValue::new(
            "Unit cell",
            format!("{} ({} atoms)", structure.formula(), structure.num_atoms()),
        ),
        KeyValue::new("Species", structure.species().join(" ")),
        KeyValue::new(
            "Lattice (a, b, c)",
            structure
                .lattice
                .lengths()
                .iter()
                .map(|l| format!("{:.4}", l))
                .collect::<Vec<_>>()
                .join(" "),
        ),
    ];
    if let Some(smat) = inputs.phonon_settings.supercell_matrix {
        rows.push(KeyValue::new("Supercell matrix", smat.to_dim_tag()));
        rows.push(KeyValue::new(
            "Supercell atoms",
            smat.determinant().unsigned_abs() as usize * structure.num_atoms(),
        ));
    }
    rows.push(KeyValue::new(
        "Mesh",
        inputs.phonon_settings.mesh.to_mesh_tag(),
    ));
    rows.push(KeyValue::new(
        "Symmetry tolerance",
        inputs.symmetry_tolerance,
    ));
    rows.extend(plan.summary());

    output::print_table(&rows);
    output::print_success("Inputs are valid");
    Ok(())
}
