//! 通用工具函数

use chrono::{DateTime, Datelike, Utc};

/// 生成人工可读的样本号
///
/// 格式: 采集日期(yyyyMMdd) + 医嘱号后缀 + 批内序号，如 `20260823-A1B2-03`。
pub fn generate_sample_label(collected_at: DateTime<Utc>, order_no: &str, seq: usize) -> String {
    // 医嘱号可能包含多字节字符，按字符而非字节取后缀
    let chars: Vec<char> = order_no.chars().collect();
    let suffix: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!(
        "{:04}{:02}{:02}-{}-{:02}",
        collected_at.year(),
        collected_at.month(),
        collected_at.day(),
        suffix.to_uppercase(),
        seq + 1
    )
}

/// 解析样本号末尾的批内序号
pub fn label_sequence(label: &str) -> Option<usize> {
    label.rsplit('-').next()?.parse().ok()
}

/// 验证样本号格式
pub fn is_valid_sample_label(label: &str) -> bool {
    let parts: Vec<&str> = label.split('-').collect();
    parts.len() == 3
        && parts[0].len() == 8
        && parts[0].chars().all(|c| c.is_ascii_digit())
        && !parts[1].is_empty()
        && parts[2].chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_sample_label() {
        let at = Utc.with_ymd_and_hms(2026, 8, 23, 9, 30, 0).unwrap();
        let label = generate_sample_label(at, "ORD-7f3a", 2);
        assert_eq!(label, "20260823-7F3A-03");
        assert!(is_valid_sample_label(&label));
    }

    #[test]
    fn test_short_order_no() {
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
        let label = generate_sample_label(at, "X1", 0);
        assert_eq!(label, "20260105-X1-01");
    }

    #[test]
    fn test_multibyte_order_no_does_not_panic() {
        let at = Utc.with_ymd_and_hms(2026, 8, 23, 9, 30, 0).unwrap();
        let label = generate_sample_label(at, "医嘱-01", 0);
        assert_eq!(label, "20260823-嘱-01-01");

        let label = generate_sample_label(at, "血", 0);
        assert_eq!(label, "20260823-血-01");
    }

    #[test]
    fn test_label_sequence() {
        assert_eq!(label_sequence("20260823-7F3A-03"), Some(3));
        assert_eq!(label_sequence("20260823-7F3A-"), None);
        assert_eq!(label_sequence("no sequence"), None);
    }

    #[test]
    fn test_is_valid_sample_label() {
        assert!(is_valid_sample_label("20260823-7F3A-01"));
        assert!(!is_valid_sample_label(""));
        assert!(!is_valid_sample_label("no-dashes-here-4"));
        assert!(!is_valid_sample_label("2026x823-7F3A-01"));
    }
}
