//! 样本状态机
//!
//! 管理单个样本的完整生命周期状态转换，并承载每条边的契约：
//! 采集要求采集人与样本号，结果录入要求必填参数齐全并重算危急标志，
//! 驳回与重采要求非空原因。状态前置条件由调用方放入同一个原子批次，
//! 这里只负责校验与字段变更。

use crate::reference_range::evaluate;
use chrono::{DateTime, Utc};
use lims_core::models::{
    Flag, ParameterKind, ParameterResult, ResultValue, Sample, SampleStatus, Test,
};
use lims_core::validation::require_text;
use lims_core::{LimsError, Result};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// 样本状态转换事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleEvent {
    Collect,
    EnterResults,
    SubmitForReview,
    Approve,
    Reject,
    Recollect,
}

impl std::fmt::Display for SampleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SampleEvent::Collect => "Collect",
            SampleEvent::EnterResults => "EnterResults",
            SampleEvent::SubmitForReview => "SubmitForReview",
            SampleEvent::Approve => "Approve",
            SampleEvent::Reject => "Reject",
            SampleEvent::Recollect => "Recollect",
        };
        write!(f, "{}", s)
    }
}

/// 样本状态机
#[derive(Debug)]
pub struct SampleStateMachine {
    transitions: HashMap<(SampleStatus, SampleEvent), SampleStatus>,
}

impl SampleStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        // 定义状态转换规则
        transitions.insert((SampleStatus::Ordered, SampleEvent::Collect), SampleStatus::Collected);
        transitions.insert((SampleStatus::Collected, SampleEvent::EnterResults), SampleStatus::Analyzing);
        // 录入中允许重复保存，不再视为转换边
        transitions.insert((SampleStatus::Analyzing, SampleEvent::EnterResults), SampleStatus::Analyzing);
        transitions.insert((SampleStatus::Analyzing, SampleEvent::SubmitForReview), SampleStatus::Review);
        transitions.insert((SampleStatus::Review, SampleEvent::Approve), SampleStatus::Reported);
        // 驳回：回到录入，必须给出原因
        transitions.insert((SampleStatus::Review, SampleEvent::Reject), SampleStatus::Analyzing);
        // 重采：重置回待采集，必须给出原因
        transitions.insert((SampleStatus::Ordered, SampleEvent::Recollect), SampleStatus::Ordered);
        transitions.insert((SampleStatus::Collected, SampleEvent::Recollect), SampleStatus::Ordered);

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: SampleStatus, event: SampleEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 解析目标状态
    pub fn transition(&self, from: SampleStatus, event: SampleEvent) -> Result<SampleStatus> {
        match self.transitions.get(&(from, event)) {
            Some(to) => Ok(*to),
            None => Err(LimsError::InvalidTransition {
                from: from.to_string(),
                event: event.to_string(),
            }),
        }
    }

    /// Ordered -> Collected：记录采集人、样本号与时间戳
    pub fn apply_collect(
        &self,
        sample: &Sample,
        collected_by: &str,
        label: String,
        at: DateTime<Utc>,
    ) -> Result<Sample> {
        require_text("采集人", collected_by)?;
        let to = self.transition(sample.status, SampleEvent::Collect)?;

        let mut updated = sample.clone();
        updated.status = to;
        updated.label = Some(label);
        updated.collected_at = Some(at);
        updated.collected_by = Some(collected_by.to_string());
        updated.updated_at = at;
        Ok(updated)
    }

    /// Collected/Analyzing -> Analyzing：校验必填参数，逐参数评估标志，
    /// 重算 is_critical（所有参数标志危急的逻辑或）
    pub fn apply_results(
        &self,
        sample: &Sample,
        test: &Test,
        values: &BTreeMap<String, ResultValue>,
        at: DateTime<Utc>,
    ) -> Result<Sample> {
        let to = self.transition(sample.status, SampleEvent::EnterResults)?;

        let missing: Vec<String> = test
            .parameters
            .iter()
            .filter(|p| p.mandatory)
            .filter(|p| values.get(&p.name).map_or(true, |v| v.is_empty()))
            .map(|p| p.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(LimsError::IncompleteResults { missing });
        }

        let mut results = BTreeMap::new();
        for param in &test.parameters {
            let value = match values.get(&param.name) {
                Some(v) if !v.is_empty() => v.clone(),
                _ => continue, // 可选参数允许留空
            };
            let flag = match (&param.kind, &value) {
                (ParameterKind::Numeric, ResultValue::Numeric(v)) => {
                    let flag = evaluate(*v, sample.age_years, sample.gender, &param.ranges);
                    if flag == Flag::Unevaluated {
                        warn!(
                            "No matching reference range for parameter {} of sample {}",
                            param.name, sample.id
                        );
                    }
                    flag
                }
                (ParameterKind::Numeric, _) => {
                    return Err(LimsError::Validation(format!(
                        "参数 {} 需要数值型结果",
                        param.name
                    )));
                }
                // 非数值参数不参与评估，固定 Normal
                _ => Flag::Normal,
            };
            results.insert(
                param.name.clone(),
                ParameterResult {
                    value,
                    flag,
                    unit: param.unit.clone(),
                },
            );
        }

        let mut updated = sample.clone();
        updated.status = to;
        updated.results = results;
        updated.is_critical = updated.results.values().any(|r| r.flag.is_critical());
        updated.analyzed_at = Some(at);
        updated.updated_at = at;
        Ok(updated)
    }

    /// Analyzing -> Review：纯状态检查，可对整批兄弟样本调用
    pub fn apply_submit_for_review(&self, sample: &Sample, at: DateTime<Utc>) -> Result<Sample> {
        let to = self.transition(sample.status, SampleEvent::SubmitForReview)?;

        let mut updated = sample.clone();
        updated.status = to;
        updated.submitted_at = Some(at);
        updated.updated_at = at;
        Ok(updated)
    }

    /// Review -> Reported：记录审核人与可选结论
    pub fn apply_approve(
        &self,
        sample: &Sample,
        verified_by: &str,
        conclusion: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Sample> {
        require_text("审核人", verified_by)?;
        let to = self.transition(sample.status, SampleEvent::Approve)?;

        let mut updated = sample.clone();
        updated.status = to;
        updated.verified_by = Some(verified_by.to_string());
        updated.conclusion = conclusion;
        updated.reported_at = Some(at);
        updated.updated_at = at;
        Ok(updated)
    }

    /// Review -> Analyzing（驳回）：原因必填，清除审核标记，结果保留
    pub fn apply_reject(&self, sample: &Sample, reason: &str, at: DateTime<Utc>) -> Result<Sample> {
        require_text("驳回原因", reason)?;
        let to = self.transition(sample.status, SampleEvent::Reject)?;

        let mut updated = sample.clone();
        updated.status = to;
        updated.submitted_at = None;
        updated.rejection_reason = Some(reason.to_string());
        updated.updated_at = at;
        Ok(updated)
    }

    /// Collected/Ordered -> Ordered（重采）：原因必填，保留 test_id/order_id，
    /// 清空既有结果与采集标记，避免陈旧值带入新的采集周期
    pub fn apply_recollect(&self, sample: &Sample, reason: &str, at: DateTime<Utc>) -> Result<Sample> {
        require_text("重采原因", reason)?;
        let to = self.transition(sample.status, SampleEvent::Recollect)?;

        let mut updated = sample.clone();
        updated.status = to;
        updated.label = None;
        updated.results.clear();
        updated.is_critical = false;
        updated.collected_at = None;
        updated.collected_by = None;
        updated.analyzed_at = None;
        updated.submitted_at = None;
        updated.critical_reported = false;
        updated.critical_reported_at = None;
        updated.critical_reported_by = None;
        updated.recollection_reason = Some(reason.to_string());
        updated.updated_at = at;
        Ok(updated)
    }
}

impl Default for SampleStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lims_core::models::{Gender, Parameter, RangeScope, ReferenceRange};
    use uuid::Uuid;

    fn glucose_test() -> Test {
        Test {
            id: Uuid::new_v4(),
            code: "GLU".to_string(),
            name: "血糖".to_string(),
            parameters: vec![
                Parameter {
                    name: "Glucose".to_string(),
                    unit: Some("mg/dL".to_string()),
                    kind: ParameterKind::Numeric,
                    mandatory: true,
                    ranges: vec![ReferenceRange {
                        scope: RangeScope::General,
                        min: 70.0,
                        max: 100.0,
                        critical_min: Some(40.0),
                        critical_max: Some(500.0),
                        safe_min: None,
                        safe_max: None,
                    }],
                },
                Parameter {
                    name: "Remark".to_string(),
                    unit: None,
                    kind: ParameterKind::FreeText,
                    mandatory: false,
                    ranges: vec![],
                },
            ],
            consumables: vec![],
            created_at: Utc::now(),
        }
    }

    fn collected_sample() -> Sample {
        let sm = SampleStateMachine::new();
        let sample = Sample::new(Uuid::new_v4(), Uuid::new_v4(), 30, Gender::Male, false);
        sm.apply_collect(&sample, "王护士", "20260823-TEST-01".to_string(), Utc::now())
            .unwrap()
    }

    #[test]
    fn test_valid_transitions() {
        let sm = SampleStateMachine::new();

        assert!(sm.can_transition(SampleStatus::Ordered, SampleEvent::Collect));
        assert!(sm.can_transition(SampleStatus::Collected, SampleEvent::EnterResults));
        assert!(sm.can_transition(SampleStatus::Analyzing, SampleEvent::SubmitForReview));
        assert!(sm.can_transition(SampleStatus::Review, SampleEvent::Approve));
        assert!(sm.can_transition(SampleStatus::Review, SampleEvent::Reject));
        assert!(sm.can_transition(SampleStatus::Collected, SampleEvent::Recollect));
    }

    #[test]
    fn test_invalid_transitions() {
        let sm = SampleStateMachine::new();

        assert!(!sm.can_transition(SampleStatus::Reported, SampleEvent::Collect));
        assert!(!sm.can_transition(SampleStatus::Ordered, SampleEvent::Approve));
        assert!(!sm.can_transition(SampleStatus::Analyzing, SampleEvent::Reject));
        assert!(!sm.can_transition(SampleStatus::Review, SampleEvent::Recollect));

        let sample = collected_sample();
        let result = sm.apply_approve(&sample, "张医师", None, Utc::now());
        assert!(matches!(result, Err(LimsError::InvalidTransition { .. })));
    }

    #[test]
    fn test_collect_requires_collector() {
        let sm = SampleStateMachine::new();
        let sample = Sample::new(Uuid::new_v4(), Uuid::new_v4(), 30, Gender::Male, false);
        let result = sm.apply_collect(&sample, "  ", "L-01".to_string(), Utc::now());
        assert!(matches!(result, Err(LimsError::Validation(_))));
    }

    #[test]
    fn test_results_require_mandatory_parameters() {
        let sm = SampleStateMachine::new();
        let test = glucose_test();
        let sample = collected_sample();

        let result = sm.apply_results(&sample, &test, &BTreeMap::new(), Utc::now());
        match result {
            Err(LimsError::IncompleteResults { missing }) => {
                assert_eq!(missing, vec!["Glucose".to_string()]);
            }
            other => panic!("expected IncompleteResults, got {:?}", other),
        }
    }

    #[test]
    fn test_results_compute_critical_flag() {
        let sm = SampleStateMachine::new();
        let test = glucose_test();
        let sample = collected_sample();

        let mut values = BTreeMap::new();
        values.insert("Glucose".to_string(), ResultValue::Numeric(30.0));
        let updated = sm.apply_results(&sample, &test, &values, Utc::now()).unwrap();

        assert_eq!(updated.status, SampleStatus::Analyzing);
        assert!(updated.is_critical);
        assert_eq!(updated.results["Glucose"].flag, Flag::CriticalLow);
        assert_eq!(updated.results["Glucose"].unit.as_deref(), Some("mg/dL"));
    }

    #[test]
    fn test_reentry_while_analyzing_updates_in_place() {
        let sm = SampleStateMachine::new();
        let test = glucose_test();
        let sample = collected_sample();

        let mut values = BTreeMap::new();
        values.insert("Glucose".to_string(), ResultValue::Numeric(30.0));
        let first = sm.apply_results(&sample, &test, &values, Utc::now()).unwrap();
        assert!(first.is_critical);

        values.insert("Glucose".to_string(), ResultValue::Numeric(85.0));
        let second = sm.apply_results(&first, &test, &values, Utc::now()).unwrap();
        assert_eq!(second.status, SampleStatus::Analyzing);
        assert!(!second.is_critical);
        assert_eq!(second.results["Glucose"].flag, Flag::Normal);
    }

    #[test]
    fn test_numeric_parameter_rejects_text_value() {
        let sm = SampleStateMachine::new();
        let test = glucose_test();
        let sample = collected_sample();

        let mut values = BTreeMap::new();
        values.insert("Glucose".to_string(), ResultValue::Text("高".to_string()));
        let result = sm.apply_results(&sample, &test, &values, Utc::now());
        assert!(matches!(result, Err(LimsError::Validation(_))));
    }

    #[test]
    fn test_reject_requires_reason_and_clears_review_marker() {
        let sm = SampleStateMachine::new();
        let test = glucose_test();
        let sample = collected_sample();

        let mut values = BTreeMap::new();
        values.insert("Glucose".to_string(), ResultValue::Numeric(85.0));
        let analyzing = sm.apply_results(&sample, &test, &values, Utc::now()).unwrap();
        let review = sm.apply_submit_for_review(&analyzing, Utc::now()).unwrap();
        assert!(review.submitted_at.is_some());

        assert!(matches!(
            sm.apply_reject(&review, "", Utc::now()),
            Err(LimsError::Validation(_))
        ));

        let rejected = sm.apply_reject(&review, "体积不足", Utc::now()).unwrap();
        assert_eq!(rejected.status, SampleStatus::Analyzing);
        assert!(rejected.submitted_at.is_none());
        assert_eq!(rejected.rejection_reason.as_deref(), Some("体积不足"));
        // 已录入的结果保留，等待重新提交
        assert!(!rejected.results.is_empty());
    }

    #[test]
    fn test_recollect_purges_results_and_markers() {
        let sm = SampleStateMachine::new();
        let test = glucose_test();
        let sample = collected_sample();

        let mut values = BTreeMap::new();
        values.insert("Glucose".to_string(), ResultValue::Numeric(30.0));
        let analyzing = sm.apply_results(&sample, &test, &values, Utc::now()).unwrap();
        // 重采只允许从 Ordered/Collected 发起
        assert!(sm.apply_recollect(&analyzing, "溶血", Utc::now()).is_err());

        let recollected = sm.apply_recollect(&sample, "溶血", Utc::now()).unwrap();
        assert_eq!(recollected.status, SampleStatus::Ordered);
        assert!(recollected.results.is_empty());
        assert!(recollected.label.is_none());
        assert!(recollected.collected_at.is_none());
        assert!(!recollected.is_critical);
        assert_eq!(recollected.recollection_reason.as_deref(), Some("溶血"));
        assert_eq!(recollected.test_id, sample.test_id);
        assert_eq!(recollected.order_id, sample.order_id);
    }

    #[test]
    fn test_approve_sets_report_fields() {
        let sm = SampleStateMachine::new();
        let test = glucose_test();
        let sample = collected_sample();

        let mut values = BTreeMap::new();
        values.insert("Glucose".to_string(), ResultValue::Numeric(85.0));
        let analyzing = sm.apply_results(&sample, &test, &values, Utc::now()).unwrap();
        let review = sm.apply_submit_for_review(&analyzing, Utc::now()).unwrap();
        let reported = sm
            .apply_approve(&review, "张医师", Some("未见异常".to_string()), Utc::now())
            .unwrap();

        assert_eq!(reported.status, SampleStatus::Reported);
        assert_eq!(reported.verified_by.as_deref(), Some("张医师"));
        assert!(reported.reported_at.is_some());
    }
}
