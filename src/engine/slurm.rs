//! # Slurm 引擎
//!
//! [`Engine`] 的生产实现：为每个作业生成目录与 sbatch 脚本并提交，
//! 轮询直到作业结束，再解析输出并写入记录存储。
//!
//! ## 作业目录
//! ```text
//! <work_dir>/supercell_001/   POSCAR INCAR KPOINTS POTCAR job.sh
//! <work_dir>/born_and_epsilon/
//! <work_dir>/phonopy/         POSCAR FORCE_SETS [BORN] *.conf job.sh
//! ```
//!
//! ## 依赖关系
//! - 被 `commands/run.rs` 使用
//! - 使用 `utils/slurm.rs`、`utils/progress.rs`、`batch/`、`parsers/`、`phonopy/files.rs`

use super::immigrant;
use super::store::RecordStore;
use super::{Engine, ImmigrantRequest, JobHandle, JobKind, JobRequest, PhonopyJob, VaspJob};
use crate::batch::BatchRunner;
use crate::error::{PhonoflowError, Result};
use crate::models::{CalculationRecord, PhonopyOutputs, RecordOrigin};
use crate::parsers::{outcar, phonopy_out, poscar};
use crate::phonopy::files::{self, PropertyGrid};
use crate::utils::slurm::{self, SlurmConfig};
use crate::utils::{output, progress};

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// 作业脚本成功结束时写出的标记文件
pub const DONE_MARKER: &str = ".phonoflow_done";
pub const SCRIPT_NAME: &str = "job.sh";
const PHONOPY_DIR: &str = "phonopy";

/// 引擎配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub work_dir: PathBuf,
    pub store_dir: PathBuf,
    /// 作业名前缀
    pub run_label: String,
    /// 轮询间隔（秒）
    pub poll_interval: u64,
    /// 最长等待时间（秒），None 表示不限
    pub max_wait: Option<u64>,
    /// 解析导入目录的并行数，0 表示全部 CPU
    pub jobs: usize,
    pub slurm: SlurmConfig,
    pub grid: PropertyGrid,
}

impl EngineConfig {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        EngineConfig {
            store_dir: work_dir.join("records"),
            work_dir,
            run_label: "phonon".to_string(),
            poll_interval: 60,
            max_wait: None,
            jobs: 0,
            slurm: SlurmConfig::default(),
            grid: PropertyGrid::default(),
        }
    }
}

pub struct SlurmEngine {
    config: EngineConfig,
    store: RecordStore,
}

impl SlurmEngine {
    pub fn new(config: EngineConfig) -> Self {
        let store = RecordStore::new(&config.store_dir);
        SlurmEngine { config, store }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    fn job_name(&self, label: &str) -> String {
        if self.config.run_label.is_empty() {
            label.to_string()
        } else {
            format!("{}_{}", self.config.run_label, label)
        }
    }

    fn create_job_dir(&self, label: &str) -> Result<PathBuf> {
        let dir = self.config.work_dir.join(label);
        fs::create_dir_all(dir.join("slurm_logs")).map_err(|e| PhonoflowError::FileWriteError {
            path: dir.display().to_string(),
            source: e,
        })?;
        // 旧运行留下的标记
        let marker = dir.join(DONE_MARKER);
        if marker.exists() {
            fs::remove_file(&marker).map_err(|e| PhonoflowError::FileWriteError {
                path: marker.display().to_string(),
                source: e,
            })?;
        }
        Ok(dir)
    }

    /// 生成 VASP 作业目录，返回 (目录, 脚本路径)
    pub fn prepare_vasp_job(&self, job: &VaspJob) -> Result<(PathBuf, PathBuf)> {
        let label = job.slot.label();
        let dir = self.create_job_dir(&label)?;

        poscar::write_poscar_file(&job.structure, &dir.join("POSCAR"))?;
        job.config
            .write_inputs(&dir, &job.structure, job.slot.calc_type())?;

        let slurm_config = self
            .config
            .slurm
            .with_options(&self.job_name(&label), job.config.options.as_ref());
        let lines = vec![job.config.command.clone(), format!("touch {}", DONE_MARKER)];
        let script = dir.join(SCRIPT_NAME);
        write_text(&script, &slurm::generate_sbatch_script(&slurm_config, &dir, &lines))?;

        Ok((dir, script))
    }

    /// 生成远程 phonopy 作业目录，返回 (目录, 脚本路径)
    pub fn prepare_phonopy_job(&self, job: &PhonopyJob) -> Result<(PathBuf, PathBuf)> {
        let dir = self.create_job_dir(PHONOPY_DIR)?;

        poscar::write_poscar_file(&job.unitcell, &dir.join("POSCAR"))?;
        write_text(
            &dir.join(files::FORCE_SETS_FILE),
            &files::force_sets_to_string(&job.setting_info.displacement_dataset, &job.force_sets)?,
        )?;
        if let Some(nac) = &job.nac_params {
            write_text(&dir.join(files::BORN_FILE), &files::born_to_string(nac)?)?;
        }

        let mut lines = Vec::new();
        for task in files::remote_tasks(&job.setting_info, job.nac_params.is_some(), &self.config.grid) {
            write_text(&dir.join(task.conf_name), &files::conf_to_string(&task.conf)?)?;
            lines.push(format!("{} {}", job.code_string, task.conf_name));
        }
        lines.push(format!("touch {}", DONE_MARKER));

        let slurm_config = self
            .config
            .slurm
            .with_options(&self.job_name(PHONOPY_DIR), Some(&job.options));
        let script = dir.join(SCRIPT_NAME);
        write_text(&script, &slurm::generate_sbatch_script(&slurm_config, &dir, &lines))?;

        Ok((dir, script))
    }

    /// 作业是否已结束：有完成标记，或已不在队列中
    pub fn is_complete(&self, handle: &JobHandle) -> Result<bool> {
        if handle.workdir.join(DONE_MARKER).exists() {
            return Ok(true);
        }
        match &handle.job_id {
            Some(id) => Ok(!slurm::is_queued(id)?),
            None => Ok(true),
        }
    }

    fn wait_for(&self, handles: &[&JobHandle]) -> Result<()> {
        let mut remaining: Vec<&JobHandle> = handles.to_vec();
        if remaining.is_empty() {
            return Ok(());
        }

        let total = remaining.len();
        let start = Instant::now();
        let spinner = progress::create_spinner(&format!("Waiting for {} jobs", total));

        loop {
            let mut pending = Vec::with_capacity(remaining.len());
            for handle in remaining {
                if !self.is_complete(handle)? {
                    pending.push(handle);
                }
            }
            remaining = pending;

            let Some(first) = remaining.first() else {
                spinner.finish_and_clear();
                return Ok(());
            };

            spinner.set_message(format!(
                "Waiting for {} of {} jobs ({})",
                remaining.len(),
                total,
                first.label
            ));

            if let Some(max) = self.config.max_wait {
                if start.elapsed().as_secs() >= max {
                    spinner.finish_and_clear();
                    return Err(PhonoflowError::JobTimeout {
                        label: first.label.clone(),
                        seconds: max,
                    });
                }
            }

            thread::sleep(Duration::from_secs(self.config.poll_interval));
        }
    }

    /// 解析已结束的 VASP 作业；OUTCAR 缺失时输出为空，由组装阶段报告
    fn collect_calculation(&self, handle: &JobHandle) -> Result<CalculationRecord> {
        let slot = handle.slot.ok_or_else(|| {
            PhonoflowError::InvalidArgument(format!("calculation '{}' has no slot", handle.label))
        })?;

        match handle.kind {
            JobKind::Immigrant => immigrant::parse_folder(slot, &handle.workdir),
            JobKind::Calculation => {
                let structure = poscar::parse_poscar_file(&handle.workdir.join("POSCAR"))?;
                let outcar_path = handle.workdir.join("OUTCAR");
                let outputs = if outcar_path.exists() {
                    let data = outcar::parse_outcar(&outcar_path)?;
                    if !data.is_finished {
                        output::print_warning(&format!("{}: OUTCAR is incomplete", handle.label));
                    }
                    data.outputs
                } else {
                    output::print_warning(&format!("{}: no OUTCAR", handle.label));
                    Default::default()
                };
                Ok(CalculationRecord::new(
                    slot,
                    RecordOrigin::Submitted {
                        job_id: handle.job_id.clone().unwrap_or_default(),
                        workdir: handle.workdir.clone(),
                    },
                )
                .with_structure(structure)
                .with_outputs(outputs))
            }
            JobKind::Phonopy => Err(PhonoflowError::InvalidArgument(format!(
                "'{}' is a phonopy job",
                handle.label
            ))),
        }
    }

    fn node_id(&self, handle: &JobHandle) -> String {
        match &handle.job_id {
            Some(id) => id.clone(),
            None => {
                let secs = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                format!("{}-{}", self.job_name(&handle.label), secs)
            }
        }
    }
}

impl Engine for SlurmEngine {
    fn submit(&mut self, request: JobRequest) -> Result<JobHandle> {
        let label = request.label();
        let (kind, slot, (dir, script)) = match &request {
            JobRequest::Vasp(job) => (JobKind::Calculation, Some(job.slot), self.prepare_vasp_job(job)?),
            JobRequest::Phonopy(job) => (JobKind::Phonopy, None, self.prepare_phonopy_job(job)?),
        };

        let job_id = slurm::submit_script(&script, &dir)?;
        output::print_success(&format!("Submitted {} as job {}", label, job_id));

        Ok(JobHandle {
            kind,
            label,
            slot,
            job_id: Some(job_id),
            workdir: dir,
        })
    }

    fn immigrate(&mut self, request: ImmigrantRequest) -> Result<JobHandle> {
        if !request.folder.is_dir() {
            return Err(PhonoflowError::DirectoryNotFound {
                path: request.folder.display().to_string(),
            });
        }
        Ok(JobHandle {
            kind: JobKind::Immigrant,
            label: request.slot.label(),
            slot: Some(request.slot),
            job_id: None,
            workdir: request.folder,
        })
    }

    fn wait_calculations(&mut self, handles: &[JobHandle]) -> Result<Vec<CalculationRecord>> {
        let scheduled: Vec<&JobHandle> = handles
            .iter()
            .filter(|h| h.kind == JobKind::Calculation)
            .collect();
        self.wait_for(&scheduled)?;

        let this = &*self;
        let runner = BatchRunner::new(this.config.jobs);
        let records = runner
            .run(handles, "Parsing calculations", |h| this.collect_calculation(h))
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        for (handle, record) in handles.iter().zip(&records) {
            let node_id = self.node_id(handle);
            let path = self.store.save(&node_id, record)?;
            output::print_info(&format!("{} stored as {}", handle.label, path.display()));
        }

        Ok(records)
    }

    fn wait_phonopy(&mut self, handle: &JobHandle) -> Result<PhonopyOutputs> {
        self.wait_for(&[handle])?;
        read_phonopy_outputs(&handle.workdir)
    }

    fn load_record(&self, node_id: &str) -> Result<CalculationRecord> {
        let mut record = self.store.load(node_id)?;
        record.origin = RecordOrigin::Stored {
            node_id: node_id.trim_end_matches(".json").to_string(),
        };
        Ok(record)
    }
}

/// 读取 phonopy 作业目录中的五个输出
pub fn read_phonopy_outputs(dir: &Path) -> Result<PhonopyOutputs> {
    Ok(PhonopyOutputs {
        thermal_properties: phonopy_out::parse_thermal_properties_file(
            &dir.join(phonopy_out::THERMAL_PROPERTIES_FILE),
        )?,
        dos: phonopy_out::parse_total_dos_file(&dir.join(phonopy_out::TOTAL_DOS_FILE))?,
        pdos: phonopy_out::parse_projected_dos_file(&dir.join(phonopy_out::PROJECTED_DOS_FILE))?,
        band_structure: phonopy_out::parse_band_file(&dir.join(phonopy_out::BAND_FILE))?,
        force_constants: phonopy_out::parse_force_constants_file(
            &dir.join(phonopy_out::FORCE_CONSTANTS_FILE),
        )?,
    })
}

fn write_text(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| PhonoflowError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}
