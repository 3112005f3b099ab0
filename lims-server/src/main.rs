//! LIMS服务器主程序

mod config;
mod handlers;

use clap::Parser;
use config::ServerConfig;
use handlers::{create_app, AppState};
use lims_core::{Result, TracingNotifier};
use lims_inventory::InventoryLedger;
use lims_store::MemoryStore;
use lims_workflow::WorkflowEngine;
use std::sync::Arc;
use tracing::{error, info};

/// LIMS服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "lims-server")]
#[command(about = "LIMS (实验室信息管理系统) 服务器")]
struct Args {
    /// 监听主机
    #[arg(long)]
    host: Option<String>,

    /// 监听端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut server_config = ServerConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        server_config.host = host;
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }
    if let Some(log_level) = args.log_level {
        server_config.log_level = log_level;
    }

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(server_config.log_level.as_str())
        .init();

    info!("启动LIMS服务器...");
    info!("  监听地址: {}:{}", server_config.host, server_config.port);

    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(TracingNotifier);
    let engine = Arc::new(WorkflowEngine::new(store.clone(), notifier.clone()));
    let ledger = Arc::new(InventoryLedger::new(store, notifier));

    let app = create_app(AppState { engine, ledger });
    let addr = format!("{}:{}", server_config.host, server_config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| lims_core::LimsError::Internal(format!("无法绑定 {}: {}", addr, e)))?;

    if let Err(e) = axum::serve(listener, app).await {
        error!("服务器运行失败: {}", e);
        return Err(lims_core::LimsError::Internal(e.to_string()));
    }

    Ok(())
}
