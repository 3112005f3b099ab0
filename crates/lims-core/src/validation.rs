//! 持久层边界校验
//!
//! 记录存储对核心而言是无模式的，所有规则执行前在此做一次防御性校验，
//! 避免缺失字段的歧义泄漏进评估器或状态机。

use crate::error::{LimsError, Result};
use crate::models::{ParameterKind, Sample, SampleStatus, Test};
use uuid::Uuid;

/// 校验必填文本字段非空
pub fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LimsError::Validation(format!("{} 不能为空", field)));
    }
    Ok(())
}

/// 解析数值型录入值
pub fn parse_numeric(field: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| LimsError::Validation(format!("{} 需要数值，收到 '{}'", field, raw)))
}

/// 样本记录的结构性校验
pub fn validate_sample_record(sample: &Sample) -> Result<()> {
    if sample.order_id == Uuid::nil() {
        return Err(LimsError::Validation("样本缺少 order_id".to_string()));
    }
    if sample.test_id == Uuid::nil() {
        return Err(LimsError::Validation("样本缺少 test_id".to_string()));
    }
    // 状态与标记字段的一致性
    match sample.status {
        SampleStatus::Ordered => {}
        _ => {
            if sample.collected_at.is_none() || sample.label.is_none() {
                return Err(LimsError::Validation(format!(
                    "样本 {} 状态为 {} 但缺少采集标记",
                    sample.id, sample.status
                )));
            }
        }
    }
    if sample.status == SampleStatus::Reported && sample.verified_by.is_none() {
        return Err(LimsError::Validation(format!(
            "样本 {} 已发布但缺少审核人",
            sample.id
        )));
    }
    Ok(())
}

/// 检验项目记录的结构性校验
pub fn validate_test_record(test: &Test) -> Result<()> {
    require_text("检验项目名称", &test.name)?;
    if test.parameters.is_empty() {
        return Err(LimsError::Validation(format!(
            "检验项目 {} 没有任何参数",
            test.code
        )));
    }
    for param in &test.parameters {
        require_text("参数名称", &param.name)?;
        for range in &param.ranges {
            if range.min >= range.max {
                return Err(LimsError::Validation(format!(
                    "参数 {} 的参考范围下限必须小于上限",
                    param.name
                )));
            }
        }
        if param.kind != ParameterKind::Numeric && !param.ranges.is_empty() {
            return Err(LimsError::Validation(format!(
                "非数值参数 {} 不应配置参考范围",
                param.name
            )));
        }
    }
    for req in &test.consumables {
        if req.quantity <= 0.0 {
            return Err(LimsError::Validation(format!(
                "检验项目 {} 的耗材需求数量必须为正",
                test.code
            )));
        }
    }
    Ok(())
}
