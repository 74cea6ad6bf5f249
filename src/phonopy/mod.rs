//! # 声子计算库接口
//!
//! 工作流需要的四个声子物理操作被抽象为 [`PhononLibrary`]：
//! 位移超胞生成、NAC 参数对称化、力常数计算与声子性质计算。
//! 默认实现 [`PythonPhonopy`] 通过内嵌的 Python 脚本调用 phonopy。
//!
//! ## 依赖关系
//! - 被 `workflow/`、`commands/`、`engine/slurm.rs` 使用
//! - 使用 `models/`
//! - 子模块: bridge, files

pub mod bridge;
pub mod files;

pub use bridge::PythonPhonopy;
pub use files::PropertyGrid;

use crate::error::Result;
use crate::models::{
    Crystal, DisplacementDataset, ForceConstants, ForceSets, LocalPhonon, NacParams,
    PhononSettingInfo, PhononSettings,
};

/// 初始化阶段的产物
#[derive(Debug, Clone)]
pub struct SupercellSetup {
    pub phonon_setting_info: PhononSettingInfo,
    pub primitive: Crystal,
    pub supercell: Crystal,
    /// 带位移的超胞，顺序与位移数据集一致
    pub supercells: Vec<Crystal>,
}

/// 声子物理计算
pub trait PhononLibrary {
    /// 生成（或按给定数据集重建）位移超胞
    fn phonon_setting_info(
        &self,
        settings: &PhononSettings,
        structure: &Crystal,
        symmetry_tolerance: f64,
        dataset: Option<&DisplacementDataset>,
    ) -> Result<SupercellSetup>;

    /// 对 Born 电荷与介电张量做对称化，得到原胞的 NAC 参数
    fn nac_params(
        &self,
        born_charges: &[[[f64; 3]; 3]],
        dielectric: &[[f64; 3]; 3],
        structure: &Crystal,
        primitive: Option<&Crystal>,
        symmetry_tolerance: f64,
    ) -> Result<NacParams>;

    fn force_constants(
        &self,
        structure: &Crystal,
        info: &PhononSettingInfo,
        force_sets: &ForceSets,
    ) -> Result<ForceConstants>;

    /// 热力学性质、总 DOS 与能带（不含 PDOS）
    fn phonon_properties(
        &self,
        structure: &Crystal,
        info: &PhononSettingInfo,
        force_constants: &ForceConstants,
        nac_params: Option<&NacParams>,
    ) -> Result<LocalPhonon>;
}
