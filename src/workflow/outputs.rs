//! # 工作流输出
//!
//! 每个命名输出都是独立可选的，取决于实际执行到哪一步、走了哪个分支。
//! `write_to_dir` 把已发布的输出写成 JSON、POSCAR、phonopy 文件、CSV 与图表。
//!
//! ## 依赖关系
//! - 被 `workflow/mod.rs`、`commands/run.rs` 使用
//! - 使用 `parsers/poscar.rs`、`phonopy/files.rs`、`utils/export.rs`、`utils/plot.rs`

use crate::error::{PhonoflowError, Result};
use crate::models::{
    BandStructure, Crystal, Dos, ForceConstants, ForceSets, NacParams, Pdos, PhononSettingInfo,
    ThermalProperties,
};
use crate::parsers::poscar::write_poscar_file;
use crate::phonopy::files::{born_to_string, force_sets_to_string, BORN_FILE, FORCE_SETS_FILE};
use crate::utils::output::print_warning;
use crate::utils::{export, plot};

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct WorkflowOutputs {
    pub phonon_setting_info: Option<PhononSettingInfo>,
    pub primitive: Option<Crystal>,
    pub supercell: Option<Crystal>,
    /// 位移超胞，随 `init` 命令写出
    pub supercells: Vec<Crystal>,
    pub force_sets: Option<ForceSets>,
    pub nac_params: Option<NacParams>,
    pub force_constants: Option<ForceConstants>,
    pub thermal_properties: Option<ThermalProperties>,
    pub dos: Option<Dos>,
    pub pdos: Option<Pdos>,
    pub band_structure: Option<BandStructure>,
}

impl WorkflowOutputs {
    /// 已发布输出的名字，按声明顺序
    pub fn published(&self) -> Vec<&'static str> {
        let flags = [
            ("phonon_setting_info", self.phonon_setting_info.is_some()),
            ("primitive", self.primitive.is_some()),
            ("supercell", self.supercell.is_some()),
            ("force_sets", self.force_sets.is_some()),
            ("nac_params", self.nac_params.is_some()),
            ("force_constants", self.force_constants.is_some()),
            ("thermal_properties", self.thermal_properties.is_some()),
            ("dos", self.dos.is_some()),
            ("pdos", self.pdos.is_some()),
            ("band_structure", self.band_structure.is_some()),
        ];
        flags
            .iter()
            .filter(|(_, present)| *present)
            .map(|(name, _)| *name)
            .collect()
    }

    /// 写出全部已发布的输出，返回写出的文件列表
    pub fn write_to_dir(&self, dir: &Path, plots: bool) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir).map_err(|e| PhonoflowError::FileWriteError {
            path: dir.display().to_string(),
            source: e,
        })?;

        let mut written = Vec::new();

        write_json(dir, "phonon_setting_info", &self.phonon_setting_info, &mut written)?;
        write_json(dir, "force_sets", &self.force_sets, &mut written)?;
        write_json(dir, "nac_params", &self.nac_params, &mut written)?;
        write_json(dir, "force_constants", &self.force_constants, &mut written)?;
        write_json(dir, "thermal_properties", &self.thermal_properties, &mut written)?;
        write_json(dir, "dos", &self.dos, &mut written)?;
        write_json(dir, "pdos", &self.pdos, &mut written)?;
        write_json(dir, "band_structure", &self.band_structure, &mut written)?;

        if let Some(primitive) = &self.primitive {
            let path = dir.join("POSCAR-primitive");
            write_poscar_file(primitive, &path)?;
            written.push(path);
        }
        if let Some(supercell) = &self.supercell {
            let path = dir.join("SPOSCAR");
            write_poscar_file(supercell, &path)?;
            written.push(path);
        }
        for (i, cell) in self.supercells.iter().enumerate() {
            let path = dir.join(format!("POSCAR-{:03}", i + 1));
            write_poscar_file(cell, &path)?;
            written.push(path);
        }

        if let (Some(info), Some(force_sets)) = (&self.phonon_setting_info, &self.force_sets) {
            let path = dir.join(FORCE_SETS_FILE);
            write_text(&path, &force_sets_to_string(&info.displacement_dataset, force_sets)?)?;
            written.push(path);
        }
        if let Some(nac) = &self.nac_params {
            let path = dir.join(BORN_FILE);
            write_text(&path, &born_to_string(nac)?)?;
            written.push(path);
        }

        if let Some(tp) = &self.thermal_properties {
            let path = dir.join("thermal_properties.csv");
            export::thermal_to_csv(tp, &path)?;
            written.push(path);
        }
        if let Some(dos) = &self.dos {
            let path = dir.join("total_dos.csv");
            export::dos_to_csv(dos, &path)?;
            written.push(path);
        }
        if let Some(pdos) = &self.pdos {
            let path = dir.join("projected_dos.csv");
            export::pdos_to_csv(pdos, &path)?;
            written.push(path);
        }
        if let Some(band) = &self.band_structure {
            let path = dir.join("band.csv");
            export::band_to_csv(band, &path)?;
            written.push(path);
        }

        if plots {
            // 绘图失败不影响其余输出
            if let Some(dos) = &self.dos {
                let path = dir.join("total_dos.png");
                match plot::plot_dos(dos, "Phonon DOS", &path) {
                    Ok(()) => written.push(path),
                    Err(e) => print_warning(&format!("DOS plot skipped: {}", e)),
                }
            }
            if let Some(band) = &self.band_structure {
                let path = dir.join("band.png");
                match plot::plot_band_structure(band, "Phonon band structure", &path) {
                    Ok(()) => written.push(path),
                    Err(e) => print_warning(&format!("Band plot skipped: {}", e)),
                }
            }
        }

        Ok(written)
    }
}

fn write_json<T: Serialize>(
    dir: &Path,
    name: &str,
    value: &Option<T>,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    if let Some(value) = value {
        let path = dir.join(format!("{}.json", name));
        write_text(&path, &serde_json::to_string_pretty(value)?)?;
        written.push(path);
    }
    Ok(())
}

fn write_text(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| PhonoflowError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}
