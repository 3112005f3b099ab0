//! # LIMS Core
//!
//! LIMS系统的核心模块，提供基础数据结构、错误定义、边界校验和通用工具。

pub mod error;
pub mod models;
pub mod notify;
pub mod utils;
pub mod validation;

pub use error::{LimsError, Result};
pub use models::*;
pub use notify::{Notifier, StockAlert, StockAlertLevel, TracingNotifier};
