//! # 运行上下文
//!
//! 一次运行的中间状态：初始化产物与按槽位存放的计算记录。
//! 运行结束时随工作流一起释放。
//!
//! ## 依赖关系
//! - 被 `workflow/mod.rs` 使用

use crate::models::{CalcSlot, CalculationRecord};
use crate::phonopy::SupercellSetup;

#[derive(Debug, Default)]
pub struct WorkflowContext {
    pub setup: Option<SupercellSetup>,
    /// 下标 i 对应第 i+1 个超胞
    pub supercell_calcs: Vec<Option<CalculationRecord>>,
    pub nac_calc: Option<CalculationRecord>,
}

impl WorkflowContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为 n 个超胞预留空槽
    pub fn reset_calcs(&mut self, num_supercells: usize) {
        self.supercell_calcs = vec![None; num_supercells];
        self.nac_calc = None;
    }

    /// 按记录的槽位存放；超出范围的超胞记录返回 false
    pub fn store(&mut self, record: CalculationRecord) -> bool {
        match record.slot {
            CalcSlot::Supercell(n) if n >= 1 && n <= self.supercell_calcs.len() => {
                self.supercell_calcs[n - 1] = Some(record);
                true
            }
            CalcSlot::Supercell(_) => false,
            CalcSlot::Nac => {
                self.nac_calc = Some(record);
                true
            }
        }
    }

    pub fn num_collected(&self) -> usize {
        self.supercell_calcs.iter().filter(|c| c.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordOrigin;

    fn record(slot: CalcSlot) -> CalculationRecord {
        CalculationRecord::new(
            slot,
            RecordOrigin::Stored {
                node_id: slot.label(),
            },
        )
    }

    #[test]
    fn test_store_by_slot() {
        let mut ctx = WorkflowContext::new();
        ctx.reset_calcs(3);

        assert!(ctx.store(record(CalcSlot::Supercell(2))));
        assert!(ctx.store(record(CalcSlot::Nac)));
        assert!(!ctx.store(record(CalcSlot::Supercell(4))));
        assert!(!ctx.store(record(CalcSlot::Supercell(0))));

        assert_eq!(ctx.num_collected(), 1);
        assert!(ctx.supercell_calcs[1].is_some());
        assert!(ctx.nac_calc.is_some());
    }
}
