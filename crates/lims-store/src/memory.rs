//! 内存实现
//!
//! 用一把 `RwLock` 保护全部键值表。提交分两阶段：先在锁内校验所有
//! 前置条件与写入目标，再一次性应用，保证全有或全无。

use crate::batch::{CommitReceipt, Precondition, StockLevel, Write, WriteBatch};
use crate::store::RecordStore;
use async_trait::async_trait;
use chrono::Utc;
use lims_core::models::{
    CriticalCommLog, InventoryItem, InventoryTransaction, Order, Patient, Sample, Test,
};
use lims_core::validation::validate_sample_record;
use lims_core::{LimsError, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct StoreInner {
    patients: HashMap<Uuid, Patient>,
    orders: HashMap<Uuid, Order>,
    tests: HashMap<Uuid, Test>,
    samples: HashMap<Uuid, Sample>,
    inventory: HashMap<Uuid, InventoryItem>,
    transactions: Vec<InventoryTransaction>,
    critical_logs: Vec<CriticalCommLog>,
}

/// 内存记录存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_sample(&self, id: Uuid) -> Result<Sample> {
        let inner = self.inner.read().await;
        inner
            .samples
            .get(&id)
            .cloned()
            .ok_or_else(|| LimsError::NotFound(format!("样本 {} 不存在", id)))
    }

    async fn samples_by_order(&self, order_id: Uuid) -> Result<Vec<Sample>> {
        let inner = self.inner.read().await;
        let mut samples: Vec<Sample> = inner
            .samples
            .values()
            .filter(|s| s.order_id == order_id)
            .cloned()
            .collect();
        samples.sort_by_key(|s| s.created_at);
        Ok(samples)
    }

    async fn all_samples(&self) -> Result<Vec<Sample>> {
        let inner = self.inner.read().await;
        let mut samples: Vec<Sample> = inner.samples.values().cloned().collect();
        samples.sort_by_key(|s| s.created_at);
        Ok(samples)
    }

    async fn get_order(&self, id: Uuid) -> Result<Order> {
        let inner = self.inner.read().await;
        inner
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| LimsError::NotFound(format!("医嘱 {} 不存在", id)))
    }

    async fn get_test(&self, id: Uuid) -> Result<Test> {
        let inner = self.inner.read().await;
        inner
            .tests
            .get(&id)
            .cloned()
            .ok_or_else(|| LimsError::NotFound(format!("检验项目 {} 不存在", id)))
    }

    async fn get_tests(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Test>> {
        let inner = self.inner.read().await;
        let mut result = HashMap::new();
        for id in ids {
            let test = inner
                .tests
                .get(id)
                .cloned()
                .ok_or_else(|| LimsError::NotFound(format!("检验项目 {} 不存在", id)))?;
            result.insert(*id, test);
        }
        Ok(result)
    }

    async fn get_inventory_item(&self, id: Uuid) -> Result<InventoryItem> {
        let inner = self.inner.read().await;
        inner
            .inventory
            .get(&id)
            .cloned()
            .ok_or_else(|| LimsError::NotFound(format!("库存物品 {} 不存在", id)))
    }

    async fn transactions_for_item(&self, item_id: Uuid) -> Result<Vec<InventoryTransaction>> {
        let inner = self.inner.read().await;
        Ok(inner
            .transactions
            .iter()
            .filter(|tx| tx.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn critical_logs_for_sample(&self, sample_id: Uuid) -> Result<Vec<CriticalCommLog>> {
        let inner = self.inner.read().await;
        Ok(inner
            .critical_logs
            .iter()
            .filter(|log| log.sample_id == sample_id)
            .cloned()
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt> {
        let mut inner = self.inner.write().await;

        // 第一阶段：在锁内核查全部前置条件与写入目标
        for precondition in &batch.preconditions {
            match precondition {
                Precondition::SampleStatus {
                    sample_id,
                    expected,
                    event,
                } => {
                    let sample = inner.samples.get(sample_id).ok_or_else(|| {
                        LimsError::NotFound(format!("样本 {} 不存在", sample_id))
                    })?;
                    if sample.status != *expected {
                        return Err(LimsError::InvalidTransition {
                            from: sample.status.to_string(),
                            event: event.clone(),
                        });
                    }
                }
                Precondition::CriticalUnreported { sample_id } => {
                    let sample = inner.samples.get(sample_id).ok_or_else(|| {
                        LimsError::NotFound(format!("样本 {} 不存在", sample_id))
                    })?;
                    if !sample.is_critical {
                        return Err(LimsError::Validation(format!(
                            "样本 {} 不是危急样本，不可确认沟通",
                            sample_id
                        )));
                    }
                    if sample.critical_reported {
                        return Err(LimsError::Validation(format!(
                            "样本 {} 的危急值沟通已确认过",
                            sample_id
                        )));
                    }
                }
            }
        }
        for write in &batch.writes {
            match write {
                Write::PutSample(sample) => validate_sample_record(sample)?,
                Write::AdjustStock { item_id, .. } | Write::AppendTransaction(
                    InventoryTransaction { item_id, .. },
                ) => {
                    if !inner.inventory.contains_key(item_id) {
                        return Err(LimsError::PartialWrite(format!(
                            "库存物品 {} 不存在，批次整体拒绝",
                            item_id
                        )));
                    }
                }
                _ => {}
            }
        }

        // 第二阶段：一次性应用
        let mut touched_items = Vec::new();
        for write in batch.writes {
            match write {
                Write::PutPatient(patient) => {
                    inner.patients.insert(patient.id, patient);
                }
                Write::PutOrder(order) => {
                    inner.orders.insert(order.id, order);
                }
                Write::PutTest(test) => {
                    inner.tests.insert(test.id, test);
                }
                Write::PutSample(sample) => {
                    inner.samples.insert(sample.id, sample);
                }
                Write::PutInventoryItem(item) => {
                    inner.inventory.insert(item.id, item);
                }
                Write::AdjustStock { item_id, delta } => {
                    // 存在性已在第一阶段核查
                    if let Some(item) = inner.inventory.get_mut(&item_id) {
                        item.quantity += delta;
                        item.updated_at = Utc::now();
                        if !touched_items.contains(&item_id) {
                            touched_items.push(item_id);
                        }
                    }
                }
                Write::AppendTransaction(tx) => {
                    inner.transactions.push(tx);
                }
                Write::AppendCriticalLog(log) => {
                    inner.critical_logs.push(log);
                }
            }
        }

        let stock_levels = touched_items
            .into_iter()
            .filter_map(|id| inner.inventory.get(&id))
            .map(|item| StockLevel {
                item_id: item.id,
                name: item.name.clone(),
                quantity: item.quantity,
                reorder_level: item.reorder_level,
            })
            .collect();

        Ok(CommitReceipt { stock_levels })
    }
}
