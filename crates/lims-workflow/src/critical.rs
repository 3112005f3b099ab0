//! 危急值追踪器
//!
//! 维护"危急且尚未沟通"的样本集合，并管理沟通确认闭环。此生命周期与
//! 样本的临床状态互相独立：样本可以已发布而危急值尚未沟通，反之亦然。

use chrono::Utc;
use lims_core::models::{CommMethod, CriticalCommLog, Sample};
use lims_core::notify::Notifier;
use lims_core::validation::require_text;
use lims_core::Result;
use lims_store::{RecordStore, WriteBatch};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// 危急值追踪器
pub struct CriticalResultTracker {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
}

impl CriticalResultTracker {
    pub fn new(store: Arc<dyn RecordStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// 待沟通队列：is_critical 且未确认，按开单时间先后排列
    pub async fn pending(&self) -> Result<Vec<Sample>> {
        let samples = self.store.all_samples().await?;
        Ok(samples
            .into_iter()
            .filter(|s| s.is_critical && !s.critical_reported)
            .collect())
    }

    /// 确认危急值已沟通
    ///
    /// 写入一条只追加的沟通日志并落下样本的确认标记，两者在同一批次内
    /// 提交。非危急样本或已确认样本在提交锁内被拒绝。
    pub async fn acknowledge(
        &self,
        sample_id: Uuid,
        recipient: &str,
        method: CommMethod,
        acknowledged_by: &str,
    ) -> Result<CriticalCommLog> {
        require_text("接收人", recipient)?;
        require_text("确认人", acknowledged_by)?;

        let sample = self.store.get_sample(sample_id).await?;
        let now = Utc::now();
        let log = CriticalCommLog {
            id: Uuid::new_v4(),
            sample_id,
            recipient: recipient.to_string(),
            method,
            acknowledged_by: acknowledged_by.to_string(),
            acknowledged_at: now,
        };

        let mut updated = sample;
        updated.critical_reported = true;
        updated.critical_reported_at = Some(now);
        updated.critical_reported_by = Some(acknowledged_by.to_string());
        updated.updated_at = now;

        self.store
            .commit(
                WriteBatch::new()
                    .require_critical_unreported(sample_id)
                    .append_critical_log(log.clone())
                    .put_sample(updated),
            )
            .await?;

        info!(
            "Critical result of sample {} communicated to {} via {:?}",
            sample_id, recipient, method
        );
        self.notifier
            .audit(&format!(
                "危急值沟通确认: 样本 {} -> {} ({:?})",
                sample_id, recipient, method
            ))
            .await;
        Ok(log)
    }

    /// 某样本的沟通日志（只读）
    pub async fn logs(&self, sample_id: Uuid) -> Result<Vec<CriticalCommLog>> {
        self.store.critical_logs_for_sample(sample_id).await
    }
}
