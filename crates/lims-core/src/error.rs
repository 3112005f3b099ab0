//! 错误定义模块

use thiserror::Error;

/// LIMS系统统一错误类型
#[derive(Error, Debug)]
pub enum LimsError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("无效状态转换: 样本当前状态 {from} 不允许 {event}")]
    InvalidTransition { from: String, event: String },

    #[error("结果不完整: 缺少必填参数 [{}]", .missing.join(", "))]
    IncompleteResults { missing: Vec<String> },

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("部分写入已整体回滚: {0}")]
    PartialWrite(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

/// LIMS系统统一结果类型
pub type Result<T> = std::result::Result<T, LimsError>;
