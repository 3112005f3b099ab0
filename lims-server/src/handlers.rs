//! HTTP处理器
//!
//! UI协作方通过离散意图调用核心：采集、录入、提交、审核、驳回、
//! 重采、危急值确认，以及只读的队列与就诊视图。

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use lims_core::models::{CommMethod, ConsumableRequirement, ResultValue, Sample};
use lims_core::LimsError;
use lims_inventory::{InventoryLedger, TransactionDraft};
use lims_workflow::WorkflowEngine;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

/// 共享应用状态
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub ledger: Arc<InventoryLedger>,
}

/// 错误到HTTP状态码的映射
pub struct ApiError(LimsError);

impl From<LimsError> for ApiError {
    fn from(err: LimsError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LimsError::Validation(_) | LimsError::IncompleteResults { .. } => {
                StatusCode::BAD_REQUEST
            }
            LimsError::InvalidTransition { .. } => StatusCode::CONFLICT,
            LimsError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// 构建路由
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/collect", post(collect))
        .route("/results", post(enter_results))
        .route("/review", post(submit_for_review))
        .route("/approve", post(approve))
        .route("/reject", post(reject))
        .route("/recollect", post(recollect))
        .route("/critical/acknowledge", post(acknowledge_critical))
        .route("/critical/pending", get(pending_critical))
        .route("/visits/pending", get(pending_visits))
        .route("/visits/:order_id", get(visit))
        .route("/inventory/transactions", post(post_transaction))
}

/// 健康检查处理器
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
struct CollectRequest {
    sample_ids: Vec<Uuid>,
    collected_by: String,
    #[serde(default)]
    ad_hoc: Vec<ConsumableRequirement>,
}

async fn collect(
    State(state): State<AppState>,
    Json(req): Json<CollectRequest>,
) -> ApiResult<Json<Vec<Sample>>> {
    let samples = state
        .engine
        .collect(&req.sample_ids, &req.collected_by, req.ad_hoc)
        .await?;
    Ok(Json(samples))
}

#[derive(Debug, Deserialize)]
struct ResultsRequest {
    sample_id: Uuid,
    values: BTreeMap<String, ResultValue>,
}

async fn enter_results(
    State(state): State<AppState>,
    Json(req): Json<ResultsRequest>,
) -> ApiResult<Json<Sample>> {
    let sample = state.engine.enter_results(req.sample_id, req.values).await?;
    Ok(Json(sample))
}

#[derive(Debug, Deserialize)]
struct ReviewRequest {
    sample_ids: Vec<Uuid>,
}

async fn submit_for_review(
    State(state): State<AppState>,
    Json(req): Json<ReviewRequest>,
) -> ApiResult<Json<Vec<Sample>>> {
    Ok(Json(state.engine.submit_for_review(&req.sample_ids).await?))
}

#[derive(Debug, Deserialize)]
struct ApproveRequest {
    sample_ids: Vec<Uuid>,
    verified_by: String,
    conclusion: Option<String>,
}

async fn approve(
    State(state): State<AppState>,
    Json(req): Json<ApproveRequest>,
) -> ApiResult<Json<Vec<Sample>>> {
    let samples = state
        .engine
        .approve(&req.sample_ids, &req.verified_by, req.conclusion)
        .await?;
    Ok(Json(samples))
}

#[derive(Debug, Deserialize)]
struct ReasonRequest {
    sample_id: Uuid,
    reason: String,
}

async fn reject(
    State(state): State<AppState>,
    Json(req): Json<ReasonRequest>,
) -> ApiResult<Json<Sample>> {
    Ok(Json(state.engine.reject(req.sample_id, &req.reason).await?))
}

async fn recollect(
    State(state): State<AppState>,
    Json(req): Json<ReasonRequest>,
) -> ApiResult<Json<Sample>> {
    Ok(Json(state.engine.recollect(req.sample_id, &req.reason).await?))
}

#[derive(Debug, Deserialize)]
struct AcknowledgeRequest {
    sample_id: Uuid,
    recipient: String,
    method: CommMethod,
    acknowledged_by: String,
}

async fn acknowledge_critical(
    State(state): State<AppState>,
    Json(req): Json<AcknowledgeRequest>,
) -> ApiResult<impl IntoResponse> {
    let log = state
        .engine
        .acknowledge_critical(req.sample_id, &req.recipient, req.method, &req.acknowledged_by)
        .await?;
    Ok(Json(log))
}

async fn pending_critical(State(state): State<AppState>) -> ApiResult<Json<Vec<Sample>>> {
    Ok(Json(state.engine.critical_tracker().pending().await?))
}

async fn pending_visits(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.pending_queue().await?))
}

async fn visit(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.visit(order_id).await?))
}

/// 独立库存变动（采购、发放、损耗）统一走台账入口
async fn post_transaction(
    State(state): State<AppState>,
    Json(req): Json<TransactionRequest>,
) -> ApiResult<impl IntoResponse> {
    let tx = state
        .ledger
        .post(TransactionDraft {
            item_id: req.item_id,
            kind: req.kind,
            quantity: req.quantity,
            sample_id: None,
            note: req.note,
        })
        .await?;
    Ok(Json(tx))
}

#[derive(Debug, Deserialize)]
struct TransactionRequest {
    item_id: Uuid,
    kind: lims_core::models::TransactionKind,
    quantity: f64,
    note: Option<String>,
}
