//! 服务配置
//!
//! 支持配置文件与环境变量（前缀 LIMS_）分层加载，环境变量优先。

use config::{Config, Environment, File};
use lims_core::{LimsError, Result};
use serde::{Deserialize, Serialize};

/// LIMS服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 日志级别
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// 加载配置：默认值 <- 配置文件（可选） <- 环境变量
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("host", defaults.host)
            .map_err(|e| LimsError::Config(e.to_string()))?
            .set_default("port", defaults.port as i64)
            .map_err(|e| LimsError::Config(e.to_string()))?
            .set_default("log_level", defaults.log_level)
            .map_err(|e| LimsError::Config(e.to_string()))?;

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }
        builder = builder.add_source(Environment::with_prefix("LIMS"));

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| LimsError::Config(e.to_string()))
    }
}
