//! # 宿主引擎接口
//!
//! 工作流只声明要提交什么、按什么顺序消费结果；
//! 作业的提交、等待与结果存储由 [`Engine`] 的实现负责。
//!
//! ## 依赖关系
//! - 被 `workflow/`、`commands/run.rs` 使用
//! - 使用 `models/`、`phonopy/`
//! - 子模块: calculator, immigrant, slurm, store

pub mod calculator;
pub mod immigrant;
pub mod slurm;
pub mod store;

pub use calculator::{CalculatorConfig, CalculatorSettings};
pub use slurm::{EngineConfig, SlurmEngine};

use crate::error::Result;
use crate::models::{
    CalcSlot, CalculationRecord, Crystal, ForceSets, NacParams, PhononSettingInfo, PhonopyOutputs,
};
use crate::utils::slurm::JobOptions;

use std::path::PathBuf;

/// VASP 单点计算请求
#[derive(Debug, Clone)]
pub struct VaspJob {
    pub slot: CalcSlot,
    pub structure: Crystal,
    pub config: CalculatorConfig,
}

/// 远程 phonopy 后处理请求
#[derive(Debug, Clone)]
pub struct PhonopyJob {
    pub unitcell: Crystal,
    pub setting_info: PhononSettingInfo,
    pub force_sets: ForceSets,
    pub nac_params: Option<NacParams>,
    pub code_string: String,
    pub options: JobOptions,
}

/// 提交给引擎的作业
#[derive(Debug, Clone)]
pub enum JobRequest {
    Vasp(VaspJob),
    Phonopy(Box<PhonopyJob>),
}

impl JobRequest {
    pub fn vasp(slot: CalcSlot, structure: Crystal, config: CalculatorConfig) -> Self {
        JobRequest::Vasp(VaspJob {
            slot,
            structure,
            config,
        })
    }

    pub fn phonopy(job: PhonopyJob) -> Self {
        JobRequest::Phonopy(Box::new(job))
    }

    pub fn label(&self) -> String {
        match self {
            JobRequest::Vasp(job) => job.slot.label(),
            JobRequest::Phonopy(_) => "phonopy".to_string(),
        }
    }
}

/// 从已有计算目录导入结果的请求
#[derive(Debug, Clone)]
pub struct ImmigrantRequest {
    pub slot: CalcSlot,
    pub folder: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Calculation,
    Immigrant,
    Phonopy,
}

/// 已提交作业的句柄
#[derive(Debug, Clone, PartialEq)]
pub struct JobHandle {
    pub kind: JobKind,
    pub label: String,
    /// 后处理作业没有 slot
    pub slot: Option<CalcSlot>,
    /// 调度器作业号；导入作业为 None
    pub job_id: Option<String>,
    pub workdir: PathBuf,
}

/// 宿主工作流引擎
pub trait Engine {
    fn submit(&mut self, request: JobRequest) -> Result<JobHandle>;

    fn immigrate(&mut self, request: ImmigrantRequest) -> Result<JobHandle>;

    /// 等待全部计算结束，按句柄顺序返回记录
    fn wait_calculations(&mut self, handles: &[JobHandle]) -> Result<Vec<CalculationRecord>>;

    fn wait_phonopy(&mut self, handle: &JobHandle) -> Result<PhonopyOutputs>;

    /// 按节点标识读取已存储的计算记录
    fn load_record(&self, node_id: &str) -> Result<CalculationRecord>;
}
