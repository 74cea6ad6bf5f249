//! # 工作流输入
//!
//! 从 YAML 或 JSON 文件读取工作流输入，并决定运行计划。
//! 所有致命的输入错误都在提交任何作业之前报告。
//!
//! ## 输入文件示例
//! ```yaml
//! structure: POSCAR
//! phonon_settings:
//!   supercell_matrix: [2, 2, 2]
//!   mesh: 100.0
//!   is_nac: true
//! calculator_settings:
//!   forces:
//!     incar: {encut: 520, ediff: 1.0e-8, ibrion: -1}
//!     kpoints_mesh: [4, 4, 4]
//!     potcar_dir: /opt/vasp/potpaw_PBE
//! run_phonopy: true
//! ```
//!
//! ## 依赖关系
//! - 被 `workflow/mod.rs`、`commands/` 使用
//! - 使用 `serde_yaml`、`serde_json`

use super::mode::{Acquisition, CalculationNodes, ImmigrantFolders, Postprocess, RemotePhonopy, RunPlan};
use crate::engine::CalculatorSettings;
use crate::error::{PhonoflowError, Result};
use crate::models::settings::DEFAULT_SYMMETRY_TOLERANCE;
use crate::models::{DisplacementDataset, PhononSettings};
use crate::utils::slurm::JobOptions;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_symmetry_tolerance() -> f64 {
    DEFAULT_SYMMETRY_TOLERANCE
}

/// 工作流输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowInputs {
    /// 单胞 POSCAR 路径，相对路径以输入文件所在目录为基准
    pub structure: PathBuf,

    pub phonon_settings: PhononSettings,

    #[serde(default)]
    pub displacement_dataset: Option<DisplacementDataset>,

    #[serde(default)]
    pub immigrant_calculation_folders: Option<ImmigrantFolders>,

    #[serde(default)]
    pub calculation_nodes: Option<CalculationNodes>,

    #[serde(default)]
    pub calculator_settings: Option<CalculatorSettings>,

    /// 集群上的 phonopy 命令
    #[serde(default)]
    pub code_string: Option<String>,

    /// 远程 phonopy 作业的 Slurm 覆盖项
    #[serde(default)]
    pub options: Option<JobOptions>,

    #[serde(default = "default_symmetry_tolerance")]
    pub symmetry_tolerance: f64,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub run_phonopy: bool,

    #[serde(default)]
    pub remote_phonopy: bool,

    #[serde(default)]
    pub label: Option<String>,
}

impl WorkflowInputs {
    /// 读取输入文件；`.json` 按 JSON 解析，其余按 YAML
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| PhonoflowError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let mut inputs: WorkflowInputs = if is_json {
            serde_json::from_str(&content).map_err(|e| invalid(path, e.to_string()))?
        } else {
            serde_yaml::from_str(&content).map_err(|e| invalid(path, e.to_string()))?
        };

        if let Some(base) = path.parent() {
            inputs.resolve_paths(base);
        }
        Ok(inputs)
    }

    /// 将相对路径解析到 `base` 之下
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.structure);
        if let Some(folders) = &mut self.immigrant_calculation_folders {
            folders.force.iter_mut().for_each(resolve);
            folders.nac.iter_mut().for_each(resolve);
        }
    }

    /// 命令行开关与文件中的值取或
    pub fn apply_flags(&mut self, dry_run: bool, run_phonopy: bool, remote_phonopy: bool) {
        self.dry_run |= dry_run;
        self.run_phonopy |= run_phonopy;
        self.remote_phonopy |= remote_phonopy;
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("phonon")
    }

    /// 校验输入并决定运行计划
    pub fn plan(&self) -> Result<RunPlan> {
        if self.phonon_settings.supercell_matrix.is_none() {
            return Err(PhonoflowError::MissingSetting("supercell_matrix".to_string()));
        }
        if self.symmetry_tolerance <= 0.0 {
            return Err(PhonoflowError::InvalidArgument(format!(
                "symmetry_tolerance must be positive, got {}",
                self.symmetry_tolerance
            )));
        }

        let is_nac = self.phonon_settings.is_nac;

        let remote = if self.run_phonopy && self.remote_phonopy {
            match (&self.code_string, &self.options) {
                (Some(code_string), Some(options)) => Some(RemotePhonopy {
                    code_string: code_string.clone(),
                    options: options.clone(),
                }),
                _ => return Err(PhonoflowError::RemoteConfigIncomplete),
            }
        } else {
            None
        };

        let acquisition = match (&self.immigrant_calculation_folders, &self.calculation_nodes) {
            (Some(_), Some(_)) => return Err(PhonoflowError::ConflictingImports),
            (Some(folders), None) => {
                if is_nac && folders.nac.is_empty() {
                    return Err(PhonoflowError::MissingSetting(
                        "immigrant_calculation_folders.nac".to_string(),
                    ));
                }
                Acquisition::ImportFolders(folders.clone())
            }
            (None, Some(nodes)) => {
                if is_nac && nodes.nac.is_empty() {
                    return Err(PhonoflowError::MissingSetting(
                        "calculation_nodes.nac".to_string(),
                    ));
                }
                Acquisition::ImportRecords(nodes.clone())
            }
            (None, None) => {
                if self.calculator_settings.is_none() {
                    return Err(PhonoflowError::MissingSetting(
                        "calculator_settings".to_string(),
                    ));
                }
                Acquisition::Fresh
            }
        };

        let postprocess = if self.dry_run || !self.run_phonopy {
            Postprocess::DryRun
        } else {
            match remote {
                Some(r) => Postprocess::Remote(r),
                None => Postprocess::Local,
            }
        };

        Ok(RunPlan {
            acquisition,
            postprocess,
            is_nac,
        })
    }
}

fn invalid(path: &Path, reason: String) -> PhonoflowError {
    PhonoflowError::InvalidInput {
        path: path.display().to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SupercellMatrix;

    const BASE: &str = r#"
structure: POSCAR
phonon_settings:
  supercell_matrix: [2, 2, 2]
calculator_settings:
  forces:
    kpoints_mesh: [4, 4, 4]
"#;

    fn inputs(extra: &str) -> WorkflowInputs {
        serde_yaml::from_str(&format!("{}{}", BASE, extra)).unwrap()
    }

    #[test]
    fn test_defaults() {
        let inputs = inputs("");
        assert_eq!(inputs.symmetry_tolerance, 1e-5);
        assert!(!inputs.dry_run && !inputs.run_phonopy && !inputs.remote_phonopy);
        assert_eq!(
            inputs.phonon_settings.supercell_matrix,
            Some(SupercellMatrix::Diagonal([2, 2, 2]))
        );
        assert_eq!(inputs.label(), "phonon");
    }

    #[test]
    fn test_fresh_without_run_phonopy_is_dry_run() {
        let plan = inputs("").plan().unwrap();
        assert_eq!(plan.acquisition, Acquisition::Fresh);
        assert_eq!(plan.postprocess, Postprocess::DryRun);
        assert!(!plan.is_nac);
    }

    #[test]
    fn test_dry_run_wins_over_run_phonopy() {
        let plan = inputs("dry_run: true\nrun_phonopy: true\n").plan().unwrap();
        assert_eq!(plan.postprocess, Postprocess::DryRun);
    }

    #[test]
    fn test_local_and_remote() {
        let plan = inputs("run_phonopy: true\n").plan().unwrap();
        assert_eq!(plan.postprocess, Postprocess::Local);

        let plan = inputs("run_phonopy: true\nremote_phonopy: true\ncode_string: phonopy\noptions:\n  ntasks: 4\n")
            .plan()
            .unwrap();
        match plan.postprocess {
            Postprocess::Remote(r) => {
                assert_eq!(r.code_string, "phonopy");
                assert_eq!(r.options.ntasks, Some(4));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_remote_requires_code_and_options() {
        let err = inputs("run_phonopy: true\nremote_phonopy: true\ncode_string: phonopy\n")
            .plan()
            .unwrap_err();
        assert!(matches!(err, PhonoflowError::RemoteConfigIncomplete));

        // 与 dry_run 无关，同样在开始前报错
        let err = inputs("run_phonopy: true\nremote_phonopy: true\ndry_run: true\n")
            .plan()
            .unwrap_err();
        assert!(matches!(err, PhonoflowError::RemoteConfigIncomplete));
    }

    #[test]
    fn test_remote_without_run_phonopy_is_dry_run() {
        let plan = inputs("remote_phonopy: true\n").plan().unwrap();
        assert_eq!(plan.postprocess, Postprocess::DryRun);
    }

    #[test]
    fn test_both_imports_conflict() {
        let err = inputs(
            "immigrant_calculation_folders:\n  force: [a]\ncalculation_nodes:\n  force: ['1']\n",
        )
        .plan()
        .unwrap_err();
        assert!(matches!(err, PhonoflowError::ConflictingImports));
    }

    #[test]
    fn test_missing_supercell_matrix() {
        let inputs: WorkflowInputs =
            serde_yaml::from_str("structure: POSCAR\nphonon_settings:\n  is_nac: true\n").unwrap();
        assert!(matches!(
            inputs.plan(),
            Err(PhonoflowError::MissingSetting(s)) if s == "supercell_matrix"
        ));
    }

    #[test]
    fn test_fresh_requires_calculator_settings() {
        let inputs: WorkflowInputs = serde_yaml::from_str(
            "structure: POSCAR\nphonon_settings:\n  supercell_matrix: [1, 1, 1]\n",
        )
        .unwrap();
        assert!(matches!(
            inputs.plan(),
            Err(PhonoflowError::MissingSetting(s)) if s == "calculator_settings"
        ));
    }

    #[test]
    fn test_nac_import_requires_nac_entry() {
        let mut inputs = inputs("calculation_nodes:\n  force: ['11', '12']\n");
        inputs.phonon_settings.is_nac = true;
        assert!(matches!(inputs.plan(), Err(PhonoflowError::MissingSetting(_))));

        inputs.calculation_nodes.as_mut().unwrap().nac = vec!["13".to_string()];
        let plan = inputs.plan().unwrap();
        assert!(plan.is_import());
        assert!(plan.is_nac);
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workflow.yaml");
        fs::write(
            &path,
            format!("{}immigrant_calculation_folders:\n  force: [disp-001, /abs/disp-002]\n", BASE),
        )
        .unwrap();

        let inputs = WorkflowInputs::load(&path).unwrap();
        assert_eq!(inputs.structure, dir.path().join("POSCAR"));
        let folders = inputs.immigrant_calculation_folders.unwrap();
        assert_eq!(folders.force[0], dir.path().join("disp-001"));
        assert_eq!(folders.force[1], PathBuf::from("/abs/disp-002"));
    }

    #[test]
    fn test_load_json_and_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workflow.json");
        fs::write(
            &path,
            r#"{"structure": "POSCAR", "phonon_settings": {"supercell_matrix": [[2,0,0],[0,2,0],[0,0,2]]}}"#,
        )
        .unwrap();
        let inputs = WorkflowInputs::load(&path).unwrap();
        assert_eq!(
            inputs.phonon_settings.supercell_matrix.unwrap().determinant(),
            8
        );

        fs::write(&path, r#"{"structure": "POSCAR", "phonon_setings": {}}"#).unwrap();
        assert!(matches!(
            WorkflowInputs::load(&path),
            Err(PhonoflowError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_flags_or_into_file_values() {
        let mut inputs = inputs("run_phonopy: true\n");
        inputs.apply_flags(true, false, false);
        assert!(inputs.dry_run);
        assert!(inputs.run_phonopy);
    }
}
