//! 就诊聚合器
//!
//! 把共享同一医嘱的样本集合实时汇总为一个工作单元。聚合结果永不持久化，
//! 每次读取都从当前样本集合重新计算，医嘱上不存在独立的状态字段。

use chrono::{DateTime, Utc};
use lims_core::models::{Sample, SampleStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 就诊整体状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VisitStatus {
    Ordered,
    PartialCollected,
    Collected,
    Analyzing,
    Ready,           // 有样本待审核，尚无已发布
    PartialReported, // 部分已发布，部分待审核
    Reported,
}

/// 就诊汇总（派生视图，永不持久化）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visit {
    pub order_id: Uuid,
    pub test_count: usize,
    pub collected_count: usize,
    pub pending_collection_count: usize,
    pub analyzed_count: usize,
    pub pending_analysis_count: usize,
    pub approved_count: usize,
    pub pending_approval_count: usize,
    pub overall_status: VisitStatus,
    pub has_critical: bool,
    pub is_urgent: bool,
    pub created_at: DateTime<Utc>,
}

impl Visit {
    /// 从某医嘱的当前样本集合计算汇总
    pub fn aggregate(order_id: Uuid, samples: &[Sample]) -> Self {
        let test_count = samples.len();
        let collected_count = samples
            .iter()
            .filter(|s| s.status != SampleStatus::Ordered)
            .count();
        let analyzed_count = samples
            .iter()
            .filter(|s| matches!(s.status, SampleStatus::Review | SampleStatus::Reported))
            .count();
        let approved_count = samples
            .iter()
            .filter(|s| s.status == SampleStatus::Reported)
            .count();

        Self {
            order_id,
            test_count,
            collected_count,
            pending_collection_count: test_count - collected_count,
            analyzed_count,
            pending_analysis_count: test_count - analyzed_count,
            approved_count,
            pending_approval_count: test_count - approved_count,
            overall_status: overall_status(samples),
            has_critical: samples.iter().any(|s| s.is_critical),
            is_urgent: samples.iter().any(|s| s.is_urgent),
            created_at: samples
                .iter()
                .map(|s| s.created_at)
                .min()
                .unwrap_or_else(Utc::now),
        }
    }
}

/// 整体状态的严格自上而下优先级
fn overall_status(samples: &[Sample]) -> VisitStatus {
    if samples.is_empty() {
        return VisitStatus::Ordered;
    }
    let count = |status: SampleStatus| samples.iter().filter(|s| s.status == status).count();
    let reported = count(SampleStatus::Reported);
    let review = count(SampleStatus::Review);
    let analyzing = count(SampleStatus::Analyzing);
    let ordered = count(SampleStatus::Ordered);
    let collected = count(SampleStatus::Collected);

    if reported == samples.len() {
        VisitStatus::Reported
    } else if reported > 0 && review > 0 {
        VisitStatus::PartialReported
    } else if review > 0 {
        VisitStatus::Ready
    } else if analyzing > 0 {
        VisitStatus::Analyzing
    } else if ordered == 0 {
        VisitStatus::Collected
    } else if collected > 0 {
        VisitStatus::PartialCollected
    } else {
        VisitStatus::Ordered
    }
}

/// 队列排序契约：危急优先（降序），其次加急（降序），最后开单时间（升序）
///
/// 任何列出就诊供操作的界面统一使用此顺序。
pub fn sort_queue(visits: &mut [Visit]) {
    visits.sort_by(|a, b| {
        b.has_critical
            .cmp(&a.has_critical)
            .then(b.is_urgent.cmp(&a.is_urgent))
            .then(a.created_at.cmp(&b.created_at))
    });
}
