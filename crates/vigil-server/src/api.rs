use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use vigil_alert::{AlertError, Rule, RulePatch};

const DEFAULT_HISTORY_HOURS: u32 = 24;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub hours: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AcknowledgeRequest {
    pub by: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveRequest {
    pub by: Option<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn rule_error(e: AlertError) -> Response {
    let status = match &e {
        AlertError::InvalidRule { .. } => StatusCode::BAD_REQUEST,
        AlertError::DuplicateRule(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

async fn health() -> impl IntoResponse {
    "OK"
}

pub async fn active_alerts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let alerts = state.engine.get_active_alerts().await;
    Json(json!({ "count": alerts.len(), "alerts": alerts }))
}

pub async fn alert_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let hours = query.hours.unwrap_or(DEFAULT_HISTORY_HOURS);
    let alerts = state.engine.get_alert_history(hours).await;
    Json(json!({ "hours": hours, "count": alerts.len(), "alerts": alerts }))
}

pub async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Path(alert_id): Path<String>,
    Json(req): Json<AcknowledgeRequest>,
) -> Response {
    if req.by.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "'by' must not be empty");
    }
    if state.engine.acknowledge(&alert_id, &req.by).await {
        tracing::info!(alert_id = %alert_id, by = %req.by, "Alert acknowledged via API");
        Json(json!({ "acknowledged": alert_id })).into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, format!("No active alert {alert_id}"))
    }
}

pub async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    Path(alert_id): Path<String>,
    body: Option<Json<ResolveRequest>>,
) -> Response {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    if state.engine.resolve(&alert_id, req.by.as_deref()).await {
        tracing::info!(alert_id = %alert_id, "Alert resolved via API");
        Json(json!({ "resolved": alert_id })).into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, format!("No active alert {alert_id}"))
    }
}

pub async fn list_rules(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rules = state.engine.get_rules().await;
    Json(json!({ "count": rules.len(), "rules": rules }))
}

pub async fn create_rule(State(state): State<Arc<AppState>>, Json(rule): Json<Rule>) -> Response {
    let id = rule.id().to_string();
    match state.engine.add_rule(rule).await {
        Ok(()) => {
            tracing::info!(rule_id = %id, "Rule created via API");
            (StatusCode::CREATED, Json(json!({ "created": id }))).into_response()
        }
        Err(e) => {
            tracing::warn!(rule_id = %id, error = %e, "Rejected rule");
            rule_error(e)
        }
    }
}

pub async fn update_rule(
    State(state): State<Arc<AppState>>,
    Path(rule_id): Path<String>,
    Json(patch): Json<RulePatch>,
) -> Response {
    match state.engine.update_rule(&rule_id, patch).await {
        Ok(true) => {
            let updated = state
                .engine
                .get_rules()
                .await
                .into_iter()
                .find(|r| r.id() == rule_id);
            Json(json!({ "rule": updated })).into_response()
        }
        Ok(false) => error_response(StatusCode::NOT_FOUND, format!("No rule {rule_id}")),
        Err(e) => rule_error(e),
    }
}

pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Path(rule_id): Path<String>,
) -> Response {
    if state.engine.remove_rule(&rule_id).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, format!("No rule {rule_id}"))
    }
}

pub async fn analytics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.get_alert_analytics().await)
}

/// 立即执行一轮求值
pub async fn evaluate_now(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.run_cycle().await)
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.engine.metrics().export() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/v1/alerts/active", get(active_alerts))
        .route("/api/v1/alerts/history", get(alert_history))
        .route("/api/v1/alerts/:alert_id/acknowledge", post(acknowledge_alert))
        .route("/api/v1/alerts/:alert_id/resolve", post(resolve_alert))
        .route("/api/v1/rules", get(list_rules).post(create_rule))
        .route("/api/v1/rules/:rule_id", patch(update_rule).delete(delete_rule))
        .route("/api/v1/analytics", get(analytics))
        .route("/api/v1/evaluate", post(evaluate_now))
        .with_state(state)
}

/// 绑定地址并在后台运行 HTTP 服务；绑定失败直接返回错误
pub fn spawn_server<F>(
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: F,
) -> anyhow::Result<JoinHandle<anyhow::Result<()>>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let server = axum::Server::try_bind(&addr)
        .map_err(|e| anyhow::anyhow!("failed to bind http_bind {}: {}", addr, e))?;
    let app = create_router(state);
    tracing::info!(%addr, "HTTP API listening");

    Ok(tokio::spawn(async move {
        server
            .serve(app.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }))
}
