//! 参考范围评估器
//!
//! 纯函数：数值 + 年龄 + 性别 + 范围表 -> 严重程度标志。无任何副作用，
//! 输入假定已在调用方完成数值解析。

use lims_core::models::{Flag, Gender, RangeScope, ReferenceRange};

/// 按优先级选择适用的参考范围
///
/// 列表序内首个命中者生效：年龄限定范围（闭区间包含受检者年龄）优先，
/// 其次性别限定范围，最后通用范围。
pub fn select_range<'a>(
    age_years: u32,
    gender: Gender,
    ranges: &'a [ReferenceRange],
) -> Option<&'a ReferenceRange> {
    ranges
        .iter()
        .find(|r| matches!(r.scope, RangeScope::Age { min_years, max_years }
            if min_years <= age_years && age_years <= max_years))
        .or_else(|| {
            ranges
                .iter()
                .find(|r| matches!(r.scope, RangeScope::Gender(g) if g == gender))
        })
        .or_else(|| ranges.iter().find(|r| r.scope == RangeScope::General))
}

/// 评估数值结果
///
/// 危急界限为含端点比较，正常界限为不含端点比较：恰好等于 min/max 的
/// 值判为 Normal。未命中任何范围返回 `Flag::Unevaluated`，区别于确认
/// 正常（缺失的范围配置不得伪装成正常结果）。
pub fn evaluate(value: f64, age_years: u32, gender: Gender, ranges: &[ReferenceRange]) -> Flag {
    let range = match select_range(age_years, gender, ranges) {
        Some(range) => range,
        None => return Flag::Unevaluated,
    };

    if let Some(critical_min) = range.critical_min {
        if value <= critical_min {
            return Flag::CriticalLow;
        }
    }
    if let Some(critical_max) = range.critical_max {
        if value >= critical_max {
            return Flag::CriticalHigh;
        }
    }
    if value < range.min {
        Flag::Low
    } else if value > range.max {
        Flag::High
    } else {
        Flag::Normal
    }
}
