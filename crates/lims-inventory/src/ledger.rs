//! 库存台账
//!
//! 任何库存变动（采购、发放、损耗、采集扣减）都必须经过这里成为一条
//! 带符号的流水并伴随一次原子增减，分散的改库存入口不被允许。

use chrono::Utc;
use lims_core::models::{InventoryItem, InventoryTransaction, TransactionKind};
use lims_core::notify::{Notifier, StockAlert, StockAlertLevel};
use lims_core::{LimsError, Result};
use lims_store::{CommitReceipt, RecordStore, WriteBatch};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// 待记账的库存变动
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub item_id: Uuid,
    pub kind: TransactionKind,
    /// 入库为正，出库为负
    pub quantity: f64,
    pub sample_id: Option<Uuid>,
    pub note: Option<String>,
}

/// 库存台账
pub struct InventoryLedger {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn RecordStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// 以记账时刻的单价构造流水
    pub fn build_transaction(item: &InventoryItem, draft: &TransactionDraft) -> Result<InventoryTransaction> {
        if draft.quantity == 0.0 {
            return Err(LimsError::Validation("库存变动数量不能为零".to_string()));
        }
        Ok(InventoryTransaction {
            id: Uuid::new_v4(),
            item_id: draft.item_id,
            kind: draft.kind,
            quantity: draft.quantity,
            unit_price: item.unit_price,
            cost: draft.quantity.abs() * item.unit_price,
            sample_id: draft.sample_id,
            note: draft.note.clone(),
            created_at: Utc::now(),
        })
    }

    /// 把一条流水及其原子增减并入既有批次
    ///
    /// 采集扣减用此入口与样本状态变更共用同一个批次。
    pub fn stage(batch: WriteBatch, tx: InventoryTransaction) -> WriteBatch {
        batch
            .adjust_stock(tx.item_id, tx.quantity)
            .append_transaction(tx)
    }

    /// 独立库存变动的唯一提交入口
    pub async fn post(&self, draft: TransactionDraft) -> Result<InventoryTransaction> {
        let item = self.store.get_inventory_item(draft.item_id).await?;
        let tx = Self::build_transaction(&item, &draft)?;

        let batch = Self::stage(WriteBatch::new(), tx.clone());
        let receipt = self.store.commit(batch).await?;

        info!(
            "Posted {:?} of {} x{} (cost {:.2})",
            tx.kind, item.name, tx.quantity, tx.cost
        );
        self.notify_levels(&receipt).await;
        Ok(tx)
    }

    /// 从提交回执提取库存告警
    pub fn alerts_from(receipt: &CommitReceipt) -> Vec<StockAlert> {
        receipt
            .stock_levels
            .iter()
            .filter_map(|level| {
                let alert_level = if level.quantity <= 0.0 {
                    StockAlertLevel::Out
                } else if level.quantity <= level.reorder_level {
                    StockAlertLevel::Low
                } else {
                    return None;
                };
                Some(StockAlert {
                    item_id: level.item_id,
                    item_name: level.name.clone(),
                    quantity: level.quantity,
                    reorder_level: level.reorder_level,
                    level: alert_level,
                })
            })
            .collect()
    }

    /// 发出提交后的库存告警（非阻塞副作用）
    pub async fn notify_levels(&self, receipt: &CommitReceipt) {
        for alert in Self::alerts_from(receipt) {
            self.notifier.stock_alert(&alert).await;
        }
    }

    /// 核对某物品"流水之和等于当前库存"
    ///
    /// 以初始入账数量为基准，返回 (流水合计, 当前库存)。
    pub async fn reconcile(&self, item_id: Uuid) -> Result<(f64, f64)> {
        let item = self.store.get_inventory_item(item_id).await?;
        let movements: f64 = self
            .store
            .transactions_for_item(item_id)
            .await?
            .iter()
            .map(|tx| tx.quantity)
            .sum();
        Ok((movements, item.quantity))
    }
}
