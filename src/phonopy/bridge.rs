//! # phonopy Python 桥接
//!
//! 每次调用将内嵌脚本写入临时目录，以 JSON 请求写入其 stdin，
//! 从 stdout 读取 `{"Ok": ...}` 或 `{"Err": "..."}` 形式的响应。
//!
//! ## 依赖关系
//! - 被 `phonopy/mod.rs`、`commands/` 使用
//! - 使用 `models/`、`tempfile`、`serde_json`

use super::files::PropertyGrid;
use super::{PhononLibrary, SupercellSetup};
use crate::error::{PhonoflowError, Result};
use crate::models::{
    Atom, Crystal, DisplacementDataset, ForceConstants, ForceSets, Lattice, LocalPhonon, Mesh,
    NacParams, PhononSettingInfo, PhononSettings, PrimitiveMatrix,
};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::{Command, Stdio};

const BRIDGE_SCRIPT: &str = include_str!("bridge.py");

/// 通过 Python 调用 phonopy
#[derive(Debug, Clone)]
pub struct PythonPhonopy {
    pub python: String,
    pub grid: PropertyGrid,
}

impl Default for PythonPhonopy {
    fn default() -> Self {
        PythonPhonopy {
            python: "python3".to_string(),
            grid: PropertyGrid::default(),
        }
    }
}

/// phonopy 中的结构表示（分数坐标）
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CellJson {
    lattice: [[f64; 3]; 3],
    symbols: Vec<String>,
    positions: Vec<[f64; 3]>,
    #[serde(default)]
    masses: Option<Vec<f64>>,
}

impl CellJson {
    fn from_crystal(crystal: &Crystal) -> Self {
        let masses: Option<Vec<f64>> = crystal.atoms.iter().map(|a| a.mass).collect();
        CellJson {
            lattice: crystal.lattice.matrix,
            symbols: crystal.atoms.iter().map(|a| a.element.clone()).collect(),
            positions: crystal.atoms.iter().map(|a| a.position).collect(),
            masses,
        }
    }

    fn into_crystal(self, name: &str) -> Result<Crystal> {
        if self.symbols.len() != self.positions.len() {
            return Err(PhonoflowError::Other(format!(
                "phonopy returned {} symbols for {} positions",
                self.symbols.len(),
                self.positions.len()
            )));
        }
        let masses = self.masses.unwrap_or_default();
        let atoms = self
            .symbols
            .into_iter()
            .zip(self.positions)
            .enumerate()
            .map(|(i, (symbol, position))| {
                let atom = Atom::new(symbol, position);
                match masses.get(i) {
                    Some(&m) => atom.with_mass(m),
                    None => atom,
                }
            })
            .collect();
        Ok(Crystal::new(name, Lattice::from_vectors(self.lattice), atoms))
    }
}

#[derive(Serialize)]
#[serde(tag = "task", rename_all = "snake_case")]
enum Request<'a> {
    SettingInfo {
        unitcell: CellJson,
        supercell_matrix: [[i64; 3]; 3],
        primitive_matrix: &'a PrimitiveMatrix,
        distance: f64,
        mesh: Mesh,
        is_nac: bool,
        symprec: f64,
        dataset: Option<&'a DisplacementDataset>,
    },
    NacParams {
        born_charges: &'a [[[f64; 3]; 3]],
        epsilon: &'a [[f64; 3]; 3],
        structure: CellJson,
        primitive: Option<CellJson>,
        symprec: f64,
    },
    ForceConstants {
        unitcell: CellJson,
        setting_info: &'a PhononSettingInfo,
        force_sets: &'a ForceSets,
    },
    PhononProperties {
        unitcell: CellJson,
        setting_info: &'a PhononSettingInfo,
        force_constants: &'a ForceConstants,
        nac_params: Option<&'a NacParams>,
        t_min: f64,
        t_max: f64,
        t_step: f64,
        band_points: usize,
    },
}

impl Request<'_> {
    fn task(&self) -> &'static str {
        match self {
            Request::SettingInfo { .. } => "setting_info",
            Request::NacParams { .. } => "nac_params",
            Request::ForceConstants { .. } => "force_constants",
            Request::PhononProperties { .. } => "phonon_properties",
        }
    }
}

#[derive(Deserialize)]
struct SettingInfoResponse {
    phonon_setting_info: PhononSettingInfo,
    primitive: CellJson,
    supercell: CellJson,
    supercells: Vec<CellJson>,
}

#[derive(Deserialize)]
struct NacResponse {
    born_charges: Vec<[[f64; 3]; 3]>,
    dielectric: [[f64; 3]; 3],
    primitive: CellJson,
    factor: f64,
    independent_atoms: Vec<usize>,
}

impl PythonPhonopy {
    pub fn new(python: impl Into<String>) -> Self {
        PythonPhonopy {
            python: python.into(),
            ..Default::default()
        }
    }

    pub fn with_grid(mut self, grid: PropertyGrid) -> Self {
        self.grid = grid;
        self
    }

    /// 确认 Python 与 phonopy 可用，返回 phonopy 版本
    pub fn check_availability(&self) -> Result<String> {
        let output = Command::new(&self.python)
            .args(["-c", "import phonopy; print(phonopy.__version__)"])
            .output()
            .map_err(|_| PhonoflowError::CommandNotFound {
                command: self.python.clone(),
            })?;
        if !output.status.success() {
            return Err(PhonoflowError::PhonopyError {
                task: "import".to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn call<Out: DeserializeOwned>(&self, request: &Request) -> Result<Out> {
        let task = request.task();
        let fail = |reason: String| PhonoflowError::PhonopyError {
            task: task.to_string(),
            reason,
        };

        let tmp = tempfile::Builder::new()
            .prefix("phonoflow")
            .tempdir()
            .map_err(|e| fail(format!("cannot create temporary directory: {}", e)))?;
        let script = tmp.path().join("bridge.py");
        std::fs::write(&script, BRIDGE_SCRIPT).map_err(|e| PhonoflowError::FileWriteError {
            path: script.display().to_string(),
            source: e,
        })?;

        let payload = serde_json::to_vec(request)?;

        let mut child = Command::new(&self.python)
            .arg(&script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|_| PhonoflowError::CommandNotFound {
                command: self.python.clone(),
            })?;

        // stdin 在独立线程中写入，避免与 stdout 互相阻塞
        let stdin = child.stdin.take();
        let writer = std::thread::spawn(move || -> std::io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&payload)?;
            }
            Ok(())
        });

        let output = child
            .wait_with_output()
            .map_err(|e| fail(format!("cannot collect python output: {}", e)))?;
        let written = writer
            .join()
            .map_err(|_| fail("stdin writer panicked".to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(last_lines(&stderr, 20)));
        }
        written.map_err(|e| fail(format!("cannot send request: {}", e)))?;

        let response: std::result::Result<Out, String> = serde_json::from_slice(&output.stdout)?;
        response.map_err(fail)
    }
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

impl PhononLibrary for PythonPhonopy {
    fn phonon_setting_info(
        &self,
        settings: &PhononSettings,
        structure: &Crystal,
        symmetry_tolerance: f64,
        dataset: Option<&DisplacementDataset>,
    ) -> Result<SupercellSetup> {
        let supercell_matrix = settings
            .supercell_matrix
            .ok_or_else(|| PhonoflowError::MissingSetting("supercell_matrix".to_string()))?;

        let response: SettingInfoResponse = self.call(&Request::SettingInfo {
            unitcell: CellJson::from_crystal(structure),
            supercell_matrix: supercell_matrix.to_matrix(),
            primitive_matrix: &settings.primitive_matrix,
            distance: settings.distance,
            mesh: settings.mesh,
            is_nac: settings.is_nac,
            symprec: symmetry_tolerance,
            dataset,
        })?;

        let supercells = response
            .supercells
            .into_iter()
            .enumerate()
            .map(|(i, cell)| cell.into_crystal(&format!("supercell_{:03}", i + 1)))
            .collect::<Result<Vec<_>>>()?;

        Ok(SupercellSetup {
            phonon_setting_info: response.phonon_setting_info,
            primitive: response.primitive.into_crystal("primitive")?,
            supercell: response.supercell.into_crystal("supercell")?,
            supercells,
        })
    }

    fn nac_params(
        &self,
        born_charges: &[[[f64; 3]; 3]],
        dielectric: &[[f64; 3]; 3],
        structure: &Crystal,
        primitive: Option<&Crystal>,
        symmetry_tolerance: f64,
    ) -> Result<NacParams> {
        let response: NacResponse = self.call(&Request::NacParams {
            born_charges,
            epsilon: dielectric,
            structure: CellJson::from_crystal(structure),
            primitive: primitive.map(CellJson::from_crystal),
            symprec: symmetry_tolerance,
        })?;

        Ok(NacParams {
            born_charges: response.born_charges,
            dielectric: response.dielectric,
            primitive: response.primitive.into_crystal("primitive")?,
            factor: response.factor,
            independent_atoms: response.independent_atoms,
        })
    }

    fn force_constants(
        &self,
        structure: &Crystal,
        info: &PhononSettingInfo,
        force_sets: &ForceSets,
    ) -> Result<ForceConstants> {
        self.call(&Request::ForceConstants {
            unitcell: CellJson::from_crystal(structure),
            setting_info: info,
            force_sets,
        })
    }

    fn phonon_properties(
        &self,
        structure: &Crystal,
        info: &PhononSettingInfo,
        force_constants: &ForceConstants,
        nac_params: Option<&NacParams>,
    ) -> Result<LocalPhonon> {
        self.call(&Request::PhononProperties {
            unitcell: CellJson::from_crystal(structure),
            setting_info: info,
            force_constants,
            nac_params,
            t_min: self.grid.t_min,
            t_max: self.grid.t_max,
            t_step: self.grid.t_step,
            band_points: self.grid.band_points,
        })
    }
}
