//! 헬스 체크와 메트릭 엔드포인트.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use kloud_core::RecordStore;
use serde::{Deserialize, Serialize};

use crate::state::SharedState;

/// 헬스 체크 응답.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// "healthy" | "stopping"
    pub status: String,
    /// "mining" | "social"
    pub service: String,
    pub version: String,
    pub uptime_secs: i64,
    /// 현재 WebSocket 구독자 수
    pub subscribers: usize,
    /// 현재 시간 (RFC 3339)
    pub timestamp: String,
}

/// GET /health
pub async fn health_check<S: RecordStore>(State(state): State<SharedState<S>>) -> impl IntoResponse {
    let running = state.service.is_running();
    let response = HealthResponse {
        status: if running { "healthy" } else { "stopping" }.to_string(),
        service: state.kind.name().to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        subscribers: state.service.hub().subscriber_count().await,
        timestamp: Utc::now().to_rfc3339(),
    };

    let status = if running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// GET /metrics
///
/// Prometheus 텍스트 형식.
pub async fn metrics_handler<S: RecordStore>(State(state): State<SharedState<S>>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

/// 헬스/메트릭 라우터.
pub fn routes<S: RecordStore>() -> Router<SharedState<S>> {
    Router::new()
        .route("/health", get(health_check::<S>))
        .route("/metrics", get(metrics_handler::<S>))
}
