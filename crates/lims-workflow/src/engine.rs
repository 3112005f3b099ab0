//! 工作流引擎
//!
//! 协调记录存储、状态机、库存扣减与危急值追踪的核心引擎。每个用户
//! 意图（采集、录入、提交、审核、驳回、重采、危急值确认）对应一个
//! 方法；一次意图内的全部写入组装为一个带前置条件的批次原子提交，
//! 并发的重复动作在提交锁内被拒绝。

use crate::critical::CriticalResultTracker;
use crate::result_entry::ResultEntrySession;
use crate::state_machine::SampleStateMachine;
use crate::visit::{sort_queue, Visit, VisitStatus};
use chrono::Utc;
use lims_core::models::{CommMethod, ConsumableRequirement, CriticalCommLog, ResultValue, Sample, SampleStatus};
use lims_core::notify::Notifier;
use lims_core::utils::{generate_sample_label, label_sequence};
use lims_core::validation::{require_text, validate_sample_record, validate_test_record};
use lims_core::{LimsError, Result};
use lims_inventory::{CollectionConsumption, DeductionCoordinator};
use lims_store::{RecordStore, WriteBatch};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// 工作流引擎
pub struct WorkflowEngine {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    state_machine: SampleStateMachine,
    deduction: DeductionCoordinator,
    critical: CriticalResultTracker,
}

impl WorkflowEngine {
    /// 创建新的工作流引擎
    pub fn new(store: Arc<dyn RecordStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            state_machine: SampleStateMachine::new(),
            deduction: DeductionCoordinator::new(store.clone(), notifier.clone()),
            critical: CriticalResultTracker::new(store.clone(), notifier.clone()),
            store,
            notifier,
        }
    }

    /// 批量采集：Ordered -> Collected
    ///
    /// 生成样本号、记录采集人，并把整批的耗材扣减并入同一个批次：
    /// 样本状态变更、库存增减、台账条目全有或全无。
    pub async fn collect(
        &self,
        sample_ids: &[Uuid],
        collected_by: &str,
        ad_hoc: Vec<ConsumableRequirement>,
    ) -> Result<Vec<Sample>> {
        require_text("采集人", collected_by)?;
        if sample_ids.is_empty() {
            return Err(LimsError::Validation("采集批次不能为空".to_string()));
        }

        let mut samples = Vec::new();
        for id in sample_ids {
            let sample = self.store.get_sample(*id).await?;
            validate_sample_record(&sample)?;
            samples.push(sample);
        }

        // 目录读取使用一致性快照，避免跨两次读取汇总耗材需求
        let mut test_ids: Vec<Uuid> = samples.iter().map(|s| s.test_id).collect();
        test_ids.sort();
        test_ids.dedup();
        let tests = self.store.get_tests(&test_ids).await?;
        for test in tests.values() {
            validate_test_record(test)?;
        }

        let now = Utc::now();
        let mut batch = WriteBatch::new();
        let mut updated_samples = Vec::new();
        let mut order_seq: HashMap<Uuid, usize> = HashMap::new();
        for sample in &samples {
            let order = self.store.get_order(sample.order_id).await?;
            // 批内序号接续该医嘱既有样本号的最大序号，分多批采集不重号
            let seq = match order_seq.get(&sample.order_id).copied() {
                Some(seq) => seq,
                None => self
                    .store
                    .samples_by_order(sample.order_id)
                    .await?
                    .iter()
                    .filter_map(|s| s.label.as_deref().and_then(label_sequence))
                    .max()
                    .unwrap_or(0),
            };
            let label = generate_sample_label(now, &order.order_no, seq);
            order_seq.insert(sample.order_id, seq + 1);

            let updated = self
                .state_machine
                .apply_collect(sample, collected_by, label, now)?;
            batch = batch
                .require_status(sample.id, SampleStatus::Ordered, "Collect")
                .put_sample(updated.clone());
            updated_samples.push(updated);
        }

        let samples_with_tests: Vec<(Uuid, &lims_core::models::Test)> = samples
            .iter()
            .map(|s| (s.id, &tests[&s.test_id]))
            .collect();
        let consumption = CollectionConsumption::from_batch(&samples_with_tests, ad_hoc);
        batch = self.deduction.stage_deductions(batch, &consumption).await?;

        let receipt = self.store.commit(batch).await?;
        self.deduction.notify_after_commit(&receipt).await;

        info!("Collected {} samples by {}", updated_samples.len(), collected_by);
        self.notifier
            .audit(&format!("采集 {} 个样本, 采集人 {}", updated_samples.len(), collected_by))
            .await;
        Ok(updated_samples)
    }

    /// 结果录入：Collected -> Analyzing（录入中重复保存原地更新）
    ///
    /// 逐参数评估严重程度标志并重算 is_critical；必填参数缺失时
    /// 整个动作以 IncompleteResults 拒绝，不发生任何转换。
    pub async fn enter_results(
        &self,
        sample_id: Uuid,
        values: BTreeMap<String, ResultValue>,
    ) -> Result<Sample> {
        let sample = self.store.get_sample(sample_id).await?;
        validate_sample_record(&sample)?;
        let test = self.store.get_test(sample.test_id).await?;

        let updated = self
            .state_machine
            .apply_results(&sample, &test, &values, Utc::now())?;

        self.store
            .commit(
                WriteBatch::new()
                    // 前置条件取服务端确认的当前状态，并发修改在锁内被拒绝
                    .require_status(sample_id, sample.status, "EnterResults")
                    .put_sample(updated.clone()),
            )
            .await?;

        if updated.is_critical && !updated.critical_reported {
            self.notifier
                .critical_pending(updated.id, updated.label.as_deref())
                .await;
        }
        self.notifier
            .audit(&format!("录入样本 {} 的结果 ({} 项)", sample_id, updated.results.len()))
            .await;
        Ok(updated)
    }

    /// 批量录入：按样本逐个落盘
    ///
    /// 每个样本一次独立提交，中途失败只影响当前样本，之前的保存不回滚。
    pub async fn enter_results_batch(
        &self,
        entries: Vec<(Uuid, BTreeMap<String, ResultValue>)>,
    ) -> Vec<(Uuid, Result<Sample>)> {
        let ids: Vec<Uuid> = entries.iter().map(|(id, _)| *id).collect();
        let mut session = ResultEntrySession::begin(&ids);
        let mut outcomes = Vec::new();

        for (sample_id, values) in entries {
            if session.mark_saving(sample_id).is_err() {
                outcomes.push((
                    sample_id,
                    Err(LimsError::Internal(format!("样本 {} 的录入会话状态异常", sample_id))),
                ));
                continue;
            }
            let outcome = self.enter_results(sample_id, values).await;
            match &outcome {
                Ok(_) => {
                    let _ = session.mark_saved(sample_id);
                }
                Err(_) => {
                    let _ = session.mark_failed(sample_id);
                }
            }
            outcomes.push((sample_id, outcome));
        }
        outcomes
    }

    /// 批量提交审核：Analyzing -> Review
    pub async fn submit_for_review(&self, sample_ids: &[Uuid]) -> Result<Vec<Sample>> {
        let now = Utc::now();
        let mut batch = WriteBatch::new();
        let mut updated_samples = Vec::new();
        for id in sample_ids {
            let sample = self.store.get_sample(*id).await?;
            let updated = self.state_machine.apply_submit_for_review(&sample, now)?;
            batch = batch
                .require_status(*id, SampleStatus::Analyzing, "SubmitForReview")
                .put_sample(updated.clone());
            updated_samples.push(updated);
        }
        self.store.commit(batch).await?;

        self.notifier
            .audit(&format!("提交 {} 个样本待审核", updated_samples.len()))
            .await;
        Ok(updated_samples)
    }

    /// 批量审核通过：Review -> Reported
    ///
    /// 审核人必填，结论可选。医嘱下全部兄弟样本发布后发出完成通知。
    pub async fn approve(
        &self,
        sample_ids: &[Uuid],
        verified_by: &str,
        conclusion: Option<String>,
    ) -> Result<Vec<Sample>> {
        let now = Utc::now();
        let mut batch = WriteBatch::new();
        let mut updated_samples = Vec::new();
        for id in sample_ids {
            let sample = self.store.get_sample(*id).await?;
            let updated =
                self.state_machine
                    .apply_approve(&sample, verified_by, conclusion.clone(), now)?;
            batch = batch
                .require_status(*id, SampleStatus::Review, "Approve")
                .put_sample(updated.clone());
            updated_samples.push(updated);
        }
        self.store.commit(batch).await?;

        // 医嘱完成检查（外部协作方关注点，发出即忘）
        let mut order_ids: Vec<Uuid> = updated_samples.iter().map(|s| s.order_id).collect();
        order_ids.sort();
        order_ids.dedup();
        for order_id in order_ids {
            let siblings = self.store.samples_by_order(order_id).await?;
            if siblings.iter().all(|s| s.status == SampleStatus::Reported) {
                self.notifier.order_complete(order_id).await;
            }
        }

        self.notifier
            .audit(&format!("审核发布 {} 个样本, 审核人 {}", updated_samples.len(), verified_by))
            .await;
        Ok(updated_samples)
    }

    /// 驳回：Review -> Analyzing，原因必填
    pub async fn reject(&self, sample_id: Uuid, reason: &str) -> Result<Sample> {
        let sample = self.store.get_sample(sample_id).await?;
        let updated = self.state_machine.apply_reject(&sample, reason, Utc::now())?;

        self.store
            .commit(
                WriteBatch::new()
                    .require_status(sample_id, SampleStatus::Review, "Reject")
                    .put_sample(updated.clone()),
            )
            .await?;

        self.notifier
            .audit(&format!("驳回样本 {}: {}", sample_id, reason))
            .await;
        Ok(updated)
    }

    /// 重采：Collected/Ordered -> Ordered，原因必填，清空既有结果
    pub async fn recollect(&self, sample_id: Uuid, reason: &str) -> Result<Sample> {
        let sample = self.store.get_sample(sample_id).await?;
        let updated = self
            .state_machine
            .apply_recollect(&sample, reason, Utc::now())?;

        self.store
            .commit(
                WriteBatch::new()
                    .require_status(sample_id, sample.status, "Recollect")
                    .put_sample(updated.clone()),
            )
            .await?;

        self.notifier
            .audit(&format!("样本 {} 重新采集: {}", sample_id, reason))
            .await;
        Ok(updated)
    }

    /// 确认危急值沟通
    pub async fn acknowledge_critical(
        &self,
        sample_id: Uuid,
        recipient: &str,
        method: CommMethod,
        acknowledged_by: &str,
    ) -> Result<CriticalCommLog> {
        self.critical
            .acknowledge(sample_id, recipient, method, acknowledged_by)
            .await
    }

    /// 某医嘱的就诊汇总（每次读取实时计算）
    pub async fn visit(&self, order_id: Uuid) -> Result<Visit> {
        let samples = self.store.samples_by_order(order_id).await?;
        Ok(Visit::aggregate(order_id, &samples))
    }

    /// 待处理队列：未全部发布的就诊，按队列契约排序
    pub async fn pending_queue(&self) -> Result<Vec<Visit>> {
        let samples = self.store.all_samples().await?;
        let mut by_order: HashMap<Uuid, Vec<Sample>> = HashMap::new();
        for sample in samples {
            by_order.entry(sample.order_id).or_default().push(sample);
        }

        let mut visits: Vec<Visit> = by_order
            .into_iter()
            .map(|(order_id, samples)| Visit::aggregate(order_id, &samples))
            .filter(|v| v.overall_status != VisitStatus::Reported)
            .collect();
        sort_queue(&mut visits);
        Ok(visits)
    }

    /// 危急值追踪器实例
    pub fn critical_tracker(&self) -> &CriticalResultTracker {
        &self.critical
    }

    /// 状态机实例
    pub fn state_machine(&self) -> &SampleStateMachine {
        &self.state_machine
    }
}
