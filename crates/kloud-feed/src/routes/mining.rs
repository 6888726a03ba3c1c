//! 채굴 장비 REST 엔드포인트.
//!
//! - `GET /api/rigs`
//! - `GET /api/rigs/{id}`
//! - `POST /api/rigs/{id}/command` `{"command": "restart"}`
//! - `POST /api/mining/allocation` `{"dailyProfit": 120.5, "allocationPercentage": 15}`

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use kloud_core::{AllocationRequest, KloudError, MiningAllocation, Rig, RigStore};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::SharedState;

/// 장비 명령 요청.
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

/// GET /api/rigs
pub async fn list_rigs(State(state): State<SharedState<RigStore>>) -> Json<Vec<Rig>> {
    Json(state.service.rigs().await)
}

/// GET /api/rigs/{id}
pub async fn get_rig(
    State(state): State<SharedState<RigStore>>,
    Path(id): Path<String>,
) -> ApiResult<Rig> {
    let rig = state
        .service
        .rig(&id)
        .await
        .ok_or_else(|| KloudError::NotFound(id.clone()))?;
    Ok(Json(rig))
}

/// POST /api/rigs/{id}/command
pub async fn command_rig(
    State(state): State<SharedState<RigStore>>,
    Path(id): Path<String>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> ApiResult<Rig> {
    let Json(request) = payload?;
    let rig = state.service.command_rig(&id, &request.command).await?;
    Ok(Json(rig))
}

/// POST /api/mining/allocation
pub async fn mining_allocation(
    payload: Result<Json<AllocationRequest>, JsonRejection>,
) -> ApiResult<MiningAllocation> {
    let Json(request) = payload?;
    Ok(Json(MiningAllocation::compute(&request)?))
}

/// 채굴 REST 라우터.
pub fn routes() -> Router<SharedState<RigStore>> {
    Router::new()
        .route("/api/rigs", get(list_rigs))
        .route("/api/rigs/{id}", get(get_rig))
        .route("/api/rigs/{id}/command", post(command_rig))
        .route("/api/mining/allocation", post(mining_allocation))
}
