//! # LIMS持久层
//!
//! 面向核心的键值化记录存储：样本、医嘱、检验目录、库存及各类台账。
//! 所有写入通过带前置条件的 `WriteBatch` 原子提交，保证临床状态变更
//! 与库存流水要么全部生效、要么全部回滚。

pub mod batch;
pub mod memory;
pub mod store;

// 重新导出主要类型
pub use batch::{CommitReceipt, Precondition, StockLevel, Write, WriteBatch};
pub use memory::MemoryStore;
pub use store::RecordStore;
