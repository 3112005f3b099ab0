//! 原子写入批次
//!
//! 一次用户动作产生的全部写入（状态变更、库存增减、台账追加）组装成
//! 一个批次，连同状态前置条件一起提交。前置条件在提交锁内核查，
//! 读后写的竞态（如同一样本被并发重复采集）因此无法发生。

use lims_core::models::{
    CriticalCommLog, InventoryItem, InventoryTransaction, Order, Patient, Sample, SampleStatus,
    Test,
};
use uuid::Uuid;

/// 提交前置条件
#[derive(Debug, Clone)]
pub enum Precondition {
    /// 样本必须处于指定状态，否则整个批次以 InvalidTransition 拒绝
    SampleStatus {
        sample_id: Uuid,
        expected: SampleStatus,
        event: String, // 触发动作名，用于错误信息
    },
    /// 样本必须是危急且尚未完成危急值沟通
    CriticalUnreported { sample_id: Uuid },
}

/// 单条写入
#[derive(Debug, Clone)]
pub enum Write {
    PutPatient(Patient),
    PutOrder(Order),
    PutTest(Test),
    PutSample(Sample),
    PutInventoryItem(InventoryItem),
    /// 对库存数量做原子增减，绝不读改写
    AdjustStock { item_id: Uuid, delta: f64 },
    AppendTransaction(InventoryTransaction),
    AppendCriticalLog(CriticalCommLog),
}

/// 写入批次
#[derive(Debug, Default)]
pub struct WriteBatch {
    pub(crate) preconditions: Vec<Precondition>,
    pub(crate) writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// 要求样本当前处于 expected 状态
    pub fn require_status(mut self, sample_id: Uuid, expected: SampleStatus, event: &str) -> Self {
        self.preconditions.push(Precondition::SampleStatus {
            sample_id,
            expected,
            event: event.to_string(),
        });
        self
    }

    /// 要求样本危急且未完成危急值沟通
    pub fn require_critical_unreported(mut self, sample_id: Uuid) -> Self {
        self.preconditions
            .push(Precondition::CriticalUnreported { sample_id });
        self
    }

    pub fn put_patient(mut self, patient: Patient) -> Self {
        self.writes.push(Write::PutPatient(patient));
        self
    }

    pub fn put_order(mut self, order: Order) -> Self {
        self.writes.push(Write::PutOrder(order));
        self
    }

    pub fn put_test(mut self, test: Test) -> Self {
        self.writes.push(Write::PutTest(test));
        self
    }

    pub fn put_sample(mut self, sample: Sample) -> Self {
        self.writes.push(Write::PutSample(sample));
        self
    }

    pub fn put_inventory_item(mut self, item: InventoryItem) -> Self {
        self.writes.push(Write::PutInventoryItem(item));
        self
    }

    pub fn adjust_stock(mut self, item_id: Uuid, delta: f64) -> Self {
        self.writes.push(Write::AdjustStock { item_id, delta });
        self
    }

    pub fn append_transaction(mut self, tx: InventoryTransaction) -> Self {
        self.writes.push(Write::AppendTransaction(tx));
        self
    }

    pub fn append_critical_log(mut self, log: CriticalCommLog) -> Self {
        self.writes.push(Write::AppendCriticalLog(log));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// 受本次提交影响的库存水位
#[derive(Debug, Clone)]
pub struct StockLevel {
    pub item_id: Uuid,
    pub name: String,
    pub quantity: f64,
    pub reorder_level: f64,
}

/// 提交回执
///
/// 返回提交后被增减物品的库存水位，调用方据此发出低库存告警。
#[derive(Debug, Clone, Default)]
pub struct CommitReceipt {
    pub stock_levels: Vec<StockLevel>,
}
