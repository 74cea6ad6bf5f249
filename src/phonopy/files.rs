//! # phonopy 输入文件
//!
//! 远程 phonopy 作业需要的 `FORCE_SETS`、`BORN` 与 conf 文件的生成。
//!
//! ## 依赖关系
//! - 被 `engine/slurm.rs` 使用
//! - 使用 `models/`

use crate::error::{PhonoflowError, Result};
use crate::models::{DisplacementDataset, ForceSets, NacParams, PhononSettingInfo};

use std::collections::BTreeMap;
use std::fmt::Write;

/// phonopy conf 文件；键保持有序以便输出稳定
pub type Conf = BTreeMap<String, String>;

pub const FORCE_SETS_FILE: &str = "FORCE_SETS";
pub const BORN_FILE: &str = "BORN";

/// 写出 conf 文本
pub fn conf_to_string(conf: &Conf) -> Result<String> {
    let mut out = String::new();
    for (key, val) in conf {
        if key.contains('=') || val.contains('#') {
            return Err(PhonoflowError::InvalidArgument(format!(
                "Cannot write phonopy conf entry '{} = {}'",
                key, val
            )));
        }
        // String 写入不会失败
        let _ = writeln!(out, "{} = {}", key, val);
    }
    Ok(out)
}

/// 写出 FORCE_SETS（type-1）文本
pub fn force_sets_to_string(dataset: &DisplacementDataset, force_sets: &ForceSets) -> Result<String> {
    if dataset.first_atoms.len() != force_sets.len() {
        return Err(PhonoflowError::InvalidArgument(format!(
            "{} displacements but {} force sets",
            dataset.first_atoms.len(),
            force_sets.len()
        )));
    }

    let mut out = String::new();
    let _ = writeln!(out, "{}", dataset.natom);
    let _ = writeln!(out, "{}", dataset.first_atoms.len());
    let _ = writeln!(out);

    for (disp, forces) in dataset.first_atoms.iter().zip(&force_sets.force_sets) {
        if forces.len() != dataset.natom {
            return Err(PhonoflowError::InvalidArgument(format!(
                "force set for atom {} has {} rows, expected {}",
                disp.number + 1,
                forces.len(),
                dataset.natom
            )));
        }
        // phonopy 的原子序号从 1 开始
        let _ = writeln!(out, "{}", disp.number + 1);
        let d = disp.displacement;
        let _ = writeln!(out, "{:20.16} {:20.16} {:20.16}", d[0], d[1], d[2]);
        for f in forces {
            let _ = writeln!(out, "{:15.10} {:15.10} {:15.10}", f[0], f[1], f[2]);
        }
        let _ = writeln!(out);
    }
    Ok(out)
}

/// 写出 BORN 文本：换算因子、介电张量、对称独立原子的 Born 电荷
pub fn born_to_string(nac: &NacParams) -> Result<String> {
    let mut out = String::new();
    let _ = writeln!(out, "{:.8}", nac.factor);
    let _ = writeln!(out, "{}", flatten_tensor(&nac.dielectric));
    for &i in &nac.independent_atoms {
        let z = nac.born_charges.get(i).ok_or_else(|| {
            PhonoflowError::InvalidArgument(format!(
                "independent atom {} outside of {} Born charges",
                i,
                nac.born_charges.len()
            ))
        })?;
        let _ = writeln!(out, "{}", flatten_tensor(z));
    }
    Ok(out)
}

fn flatten_tensor(t: &[[f64; 3]; 3]) -> String {
    t.iter()
        .flat_map(|row| row.iter())
        .map(|v| format!("{:13.8}", v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// 远程作业中的一步 phonopy 调用
#[derive(Debug, Clone)]
pub struct PhonopyTask {
    pub conf_name: &'static str,
    pub conf: Conf,
}

/// 温度范围与能带采样
#[derive(Debug, Clone, Copy)]
pub struct PropertyGrid {
    pub t_min: f64,
    pub t_max: f64,
    pub t_step: f64,
    pub band_points: usize,
}

impl Default for PropertyGrid {
    fn default() -> Self {
        PropertyGrid {
            t_min: 0.0,
            t_max: 1000.0,
            t_step: 10.0,
            band_points: 51,
        }
    }
}

/// 远程作业依次执行的 phonopy 调用：力常数、网格（热力学+DOS）、PDOS、能带
pub fn remote_tasks(info: &PhononSettingInfo, with_nac: bool, grid: &PropertyGrid) -> Vec<PhonopyTask> {
    let mut base = Conf::new();
    base.insert("DIM".to_string(), info.dim_tag());
    base.insert("PRIMITIVE_AXES".to_string(), info.primitive_axes_tag());
    base.insert("SYMMETRY_TOLERANCE".to_string(), format!("{}", info.symmetry_tolerance));
    if with_nac {
        base.insert("NAC".to_string(), ".TRUE.".to_string());
    }

    let mut fc = base.clone();
    fc.insert("FORCE_CONSTANTS".to_string(), "WRITE".to_string());

    let mut read = base;
    read.insert("FORCE_CONSTANTS".to_string(), "READ".to_string());

    let mut mesh = read.clone();
    mesh.insert("MESH".to_string(), info.mesh.to_mesh_tag());
    mesh.insert("TPROP".to_string(), ".TRUE.".to_string());
    mesh.insert("TMIN".to_string(), format!("{}", grid.t_min));
    mesh.insert("TMAX".to_string(), format!("{}", grid.t_max));
    mesh.insert("TSTEP".to_string(), format!("{}", grid.t_step));
    mesh.insert("DOS".to_string(), ".TRUE.".to_string());
    mesh.insert("WRITE_MESH".to_string(), ".FALSE.".to_string());

    let mut pdos = read.clone();
    pdos.insert("MESH".to_string(), info.mesh.to_mesh_tag());
    pdos.insert("PDOS".to_string(), "AUTO".to_string());
    pdos.insert("WRITE_MESH".to_string(), ".FALSE.".to_string());

    let mut band = read;
    band.insert("BAND".to_string(), "AUTO".to_string());
    band.insert("BAND_POINTS".to_string(), grid.band_points.to_string());

    vec![
        PhonopyTask { conf_name: "fc.conf", conf: fc },
        PhonopyTask { conf_name: "mesh.conf", conf: mesh },
        PhonopyTask { conf_name: "pdos.conf", conf: pdos },
        PhonopyTask { conf_name: "band.conf", conf: band },
    ]
}
