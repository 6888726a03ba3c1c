//! HTTP 라우터.
//!
//! - [`health`]: `/health`, `/metrics`
//! - [`mining`]: 채굴 장비 REST
//! - [`social`]: 소셜 프로젝트 REST, 토큰 지표

pub mod health;
pub mod mining;
pub mod social;

use axum::{routing::get, Router};
use kloud_core::{ProjectStore, RecordStore, RigStore};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::SharedState;
use crate::websocket::websocket_handler;

/// WebSocket, 헬스 체크, 공통 레이어를 붙입니다.
fn with_common<S: RecordStore>(api: Router<SharedState<S>>, state: SharedState<S>) -> Router {
    let ws_path = state.kind.ws_path();

    api.route(ws_path, get(websocket_handler::<S>))
        .merge(health::routes::<S>())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 채굴 서비스 라우터.
pub fn mining_router(state: SharedState<RigStore>) -> Router {
    with_common(mining::routes(), state)
}

/// 소셜 서비스 라우터.
pub fn social_router(state: SharedState<ProjectStore>) -> Router {
    with_common(social::routes(), state)
}
