//! 记录存储接口

use crate::batch::{CommitReceipt, WriteBatch};
use async_trait::async_trait;
use lims_core::models::{
    CriticalCommLog, InventoryItem, InventoryTransaction, Order, Sample, Test,
};
use lims_core::Result;
use std::collections::HashMap;
use uuid::Uuid;

/// 键值化记录存储接口
///
/// 读操作按单键或按索引键返回记录；`get_tests` 在一个一致性快照内
/// 返回整批目录，保证批量采集的耗材需求汇总不会跨两次读取。
/// 写操作只有 `commit` 一个入口。
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_sample(&self, id: Uuid) -> Result<Sample>;

    /// 同一医嘱下的全部样本
    async fn samples_by_order(&self, order_id: Uuid) -> Result<Vec<Sample>>;

    /// 全部样本（队列视图的数据源）
    async fn all_samples(&self) -> Result<Vec<Sample>>;

    async fn get_order(&self, id: Uuid) -> Result<Order>;

    async fn get_test(&self, id: Uuid) -> Result<Test>;

    /// 一次锁内读取整批检验目录（一致性快照）
    async fn get_tests(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Test>>;

    async fn get_inventory_item(&self, id: Uuid) -> Result<InventoryItem>;

    /// 某物品的全部库存流水，按时间先后排列
    async fn transactions_for_item(&self, item_id: Uuid) -> Result<Vec<InventoryTransaction>>;

    /// 某样本的危急值沟通日志
    async fn critical_logs_for_sample(&self, sample_id: Uuid) -> Result<Vec<CriticalCommLog>>;

    /// 原子提交一个写入批次
    ///
    /// 前置条件与写入在同一把锁内核查并应用，任一失败则整体不生效。
    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt>;
}
