//! # LIMS库存模块
//!
//! 所有库存变动走唯一的台账入口，集中保证"流水之和等于当前库存"：
//! - 库存台账：采购、发放、损耗等独立变动的唯一提交入口
//! - 扣减协调器：采集转换触发的耗材需求汇总与原子扣减

pub mod deduction;
pub mod ledger;

// 重新导出主要类型
pub use deduction::{CollectionConsumption, DeductionCoordinator};
pub use ledger::{InventoryLedger, TransactionDraft};
