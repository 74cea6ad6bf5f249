//! # 数据模型模块
//!
//! 定义晶体结构、声子设置、计算记录和声子结果的数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`、`phonopy/`、`engine/`、`workflow/` 使用
//! - 子模块: structure, settings, calculation, phonon

pub mod calculation;
pub mod phonon;
pub mod settings;
pub mod structure;

pub use calculation::{CalcOutputs, CalcSlot, CalcType, CalculationRecord, Misc, RecordOrigin};
pub use phonon::{
    BandStructure, Dos, ForceConstants, ForceSets, LocalPhonon, NacParams, Pdos, PhonopyOutputs,
    ThermalProperties, VASP_NAC_FACTOR,
};
pub use settings::{
    DisplacementDataset, Mesh, PhononSettingInfo, PhononSettings, PrimitiveMatrix,
    SupercellMatrix,
};
pub use structure::{Atom, Crystal, Lattice};
