//! 采集扣减协调器
//!
//! 采集转换触发：把批内各样本检验项目的静态耗材需求与本次临时追加
//! 的物品汇总后，将扣减流水并入采集批次，与样本状态变更同生共死。
//! 库存不足从不阻塞采集，透支只产生非阻塞告警。

use crate::ledger::{InventoryLedger, TransactionDraft};
use lims_core::models::{ConsumableRequirement, InventoryItem, Test, TransactionKind};
use lims_core::notify::Notifier;
use lims_core::{LimsError, Result};
use lims_store::{CommitReceipt, RecordStore, WriteBatch};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// 一次采集动作的耗材消耗
///
/// 批内每个样本映射其检验项目的静态需求；临时物品属于整批。
#[derive(Debug, Default)]
pub struct CollectionConsumption {
    /// (样本ID, 该样本检验项目的静态耗材需求)
    pub per_sample: Vec<(Uuid, Vec<ConsumableRequirement>)>,
    /// 本次采集事件临时追加的物品
    pub ad_hoc: Vec<ConsumableRequirement>,
}

impl CollectionConsumption {
    /// 汇总需求：静态需求按样本展开后连同临时物品按物品ID求和
    pub fn resolve(&self) -> BTreeMap<Uuid, f64> {
        let mut totals: BTreeMap<Uuid, f64> = BTreeMap::new();
        for (_, requirements) in &self.per_sample {
            for req in requirements {
                *totals.entry(req.item_id).or_insert(0.0) += req.quantity;
            }
        }
        for req in &self.ad_hoc {
            *totals.entry(req.item_id).or_insert(0.0) += req.quantity;
        }
        totals
    }

    /// 从检验项目目录组装批内样本的静态需求
    pub fn from_batch(samples_with_tests: &[(Uuid, &Test)], ad_hoc: Vec<ConsumableRequirement>) -> Self {
        Self {
            per_sample: samples_with_tests
                .iter()
                .map(|(sample_id, test)| (*sample_id, test.consumables.clone()))
                .collect(),
            ad_hoc,
        }
    }
}

/// 采集扣减协调器
pub struct DeductionCoordinator {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
}

impl DeductionCoordinator {
    pub fn new(store: Arc<dyn RecordStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// 把扣减流水并入采集批次
    ///
    /// 每个样本的每项耗材各记一条扣减流水（保留样本追溯），临时物品
    /// 按整批各记一条；数量增减随流水逐条并入，提交时按物品累加。
    /// 单价取并入时刻的物品单价。
    pub async fn stage_deductions(
        &self,
        mut batch: WriteBatch,
        consumption: &CollectionConsumption,
    ) -> Result<WriteBatch> {
        // 临时物品来自请求方，数量与静态需求同样必须为正
        for req in &consumption.ad_hoc {
            if req.quantity <= 0.0 {
                return Err(LimsError::Validation(format!(
                    "临时耗材数量必须为正: 物品 {} 收到 {}",
                    req.item_id, req.quantity
                )));
            }
        }
        let items = self.load_items(consumption).await?;

        for (sample_id, requirements) in &consumption.per_sample {
            for req in requirements {
                let item = &items[&req.item_id];
                let tx = InventoryLedger::build_transaction(
                    item,
                    &TransactionDraft {
                        item_id: req.item_id,
                        kind: TransactionKind::Deduction,
                        quantity: -req.quantity,
                        sample_id: Some(*sample_id),
                        note: None,
                    },
                )?;
                debug!(
                    "Staged deduction of {} x{} for sample {}",
                    item.name, req.quantity, sample_id
                );
                batch = InventoryLedger::stage(batch, tx);
            }
        }
        for req in &consumption.ad_hoc {
            let item = &items[&req.item_id];
            let tx = InventoryLedger::build_transaction(
                item,
                &TransactionDraft {
                    item_id: req.item_id,
                    kind: TransactionKind::Deduction,
                    quantity: -req.quantity,
                    sample_id: None,
                    note: Some("采集临时追加".to_string()),
                },
            )?;
            batch = InventoryLedger::stage(batch, tx);
        }

        Ok(batch)
    }

    /// 提交后依据回执发出库存告警（非阻塞）
    pub async fn notify_after_commit(&self, receipt: &CommitReceipt) {
        for alert in InventoryLedger::alerts_from(receipt) {
            self.notifier.stock_alert(&alert).await;
        }
    }

    async fn load_items(
        &self,
        consumption: &CollectionConsumption,
    ) -> Result<HashMap<Uuid, InventoryItem>> {
        let mut items = HashMap::new();
        for item_id in consumption.resolve().keys() {
            let item = self.store.get_inventory_item(*item_id).await?;
            items.insert(*item_id, item);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lims_core::models::{Parameter, ParameterKind};
    use lims_core::TracingNotifier;
    use lims_store::MemoryStore;

    fn test_with_consumable(item_id: Uuid, quantity: f64) -> Test {
        Test {
            id: Uuid::new_v4(),
            code: "CBC".to_string(),
            name: "血常规".to_string(),
            parameters: vec![Parameter {
                name: "WBC".to_string(),
                unit: Some("10^9/L".to_string()),
                kind: ParameterKind::Numeric,
                mandatory: true,
                ranges: vec![],
            }],
            consumables: vec![ConsumableRequirement { item_id, quantity }],
            created_at: Utc::now(),
        }
    }

    fn stock_item(quantity: f64) -> InventoryItem {
        let now = Utc::now();
        InventoryItem {
            id: Uuid::new_v4(),
            name: "EDTA管".to_string(),
            unit: "支".to_string(),
            quantity,
            unit_price: 2.0,
            reorder_level: 3.0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_resolve_sums_by_item() {
        let item_a = Uuid::new_v4();
        let item_b = Uuid::new_v4();
        let consumption = CollectionConsumption {
            per_sample: vec![
                (Uuid::new_v4(), vec![ConsumableRequirement { item_id: item_a, quantity: 2.0 }]),
                (Uuid::new_v4(), vec![ConsumableRequirement { item_id: item_a, quantity: 2.0 }]),
            ],
            ad_hoc: vec![ConsumableRequirement { item_id: item_b, quantity: 1.0 }],
        };
        let totals = consumption.resolve();
        assert_eq!(totals[&item_a], 4.0);
        assert_eq!(totals[&item_b], 1.0);
    }

    #[tokio::test]
    async fn test_stage_deductions_one_entry_per_sample() {
        let store = Arc::new(MemoryStore::new());
        let stock = stock_item(10.0);
        let item_id = stock.id;
        store
            .commit(WriteBatch::new().put_inventory_item(stock))
            .await
            .unwrap();

        let test = test_with_consumable(item_id, 2.0);
        let samples: Vec<(Uuid, &Test)> = vec![
            (Uuid::new_v4(), &test),
            (Uuid::new_v4(), &test),
            (Uuid::new_v4(), &test),
        ];
        let consumption = CollectionConsumption::from_batch(&samples, vec![]);

        let coordinator = DeductionCoordinator::new(store.clone(), Arc::new(TracingNotifier));
        let batch = coordinator
            .stage_deductions(WriteBatch::new(), &consumption)
            .await
            .unwrap();
        store.commit(batch).await.unwrap();

        // 起始库存10，3个样本各扣2 -> 4
        assert_eq!(store.get_inventory_item(item_id).await.unwrap().quantity, 4.0);
        let entries = store.transactions_for_item(item_id).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|tx| tx.quantity == -2.0 && tx.cost == 4.0));
        assert!(entries.iter().all(|tx| tx.sample_id.is_some()));
    }

    #[tokio::test]
    async fn test_non_positive_ad_hoc_quantity_rejected() {
        let store = Arc::new(MemoryStore::new());
        let stock = stock_item(10.0);
        let item_id = stock.id;
        store
            .commit(WriteBatch::new().put_inventory_item(stock))
            .await
            .unwrap();

        let coordinator = DeductionCoordinator::new(store.clone(), Arc::new(TracingNotifier));
        // 负数临时数量会把扣减变成入库，必须拒绝
        for quantity in [-1.0, 0.0] {
            let consumption = CollectionConsumption {
                per_sample: vec![],
                ad_hoc: vec![ConsumableRequirement { item_id, quantity }],
            };
            let result = coordinator
                .stage_deductions(WriteBatch::new(), &consumption)
                .await;
            assert!(matches!(result, Err(LimsError::Validation(_))));
        }
        assert_eq!(store.get_inventory_item(item_id).await.unwrap().quantity, 10.0);
    }

    #[tokio::test]
    async fn test_deduction_never_blocks_on_insufficient_stock() {
        let store = Arc::new(MemoryStore::new());
        let stock = stock_item(1.0);
        let item_id = stock.id;
        store
            .commit(WriteBatch::new().put_inventory_item(stock))
            .await
            .unwrap();

        let test = test_with_consumable(item_id, 2.0);
        let samples: Vec<(Uuid, &Test)> = vec![(Uuid::new_v4(), &test)];
        let consumption = CollectionConsumption::from_batch(&samples, vec![]);

        let coordinator = DeductionCoordinator::new(store.clone(), Arc::new(TracingNotifier));
        let batch = coordinator
            .stage_deductions(WriteBatch::new(), &consumption)
            .await
            .unwrap();
        let receipt = store.commit(batch).await.unwrap();

        // 允许透支为负，同时产生告警
        assert_eq!(store.get_inventory_item(item_id).await.unwrap().quantity, -1.0);
        assert_eq!(InventoryLedger::alerts_from(&receipt).len(), 1);
    }
}
