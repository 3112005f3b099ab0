//! 通知与审计协作方接口
//!
//! 低库存、危急值待沟通、医嘱完成等事件经此接口外发，发出即忘，
//! 永不阻塞临床动作。

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

/// 库存告警级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockAlertLevel {
    Low,
    Out, // 库存为零或已透支
}

/// 库存告警
#[derive(Debug, Clone)]
pub struct StockAlert {
    pub item_id: Uuid,
    pub item_name: String,
    pub quantity: f64,
    pub reorder_level: f64,
    pub level: StockAlertLevel,
}

/// 通知发送器特征
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 库存不足告警（非阻塞）
    async fn stock_alert(&self, alert: &StockAlert);

    /// 出现待沟通的危急值
    async fn critical_pending(&self, sample_id: Uuid, label: Option<&str>);

    /// 医嘱下全部样本已发布
    async fn order_complete(&self, order_id: Uuid);

    /// 每个动作一条审计描述，发出即忘
    async fn audit(&self, description: &str);
}

/// 默认通知发送器实现（仅记录日志）
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn stock_alert(&self, alert: &StockAlert) {
        warn!(
            "Stock alert ({:?}): {} at {} (reorder level {})",
            alert.level, alert.item_name, alert.quantity, alert.reorder_level
        );
    }

    async fn critical_pending(&self, sample_id: Uuid, label: Option<&str>) {
        warn!(
            "Critical result pending communication: sample {} ({})",
            sample_id,
            label.unwrap_or("unlabeled")
        );
    }

    async fn order_complete(&self, order_id: Uuid) {
        info!("All samples reported for order {}", order_id);
    }

    async fn audit(&self, description: &str) {
        info!("Audit: {}", description);
    }
}
