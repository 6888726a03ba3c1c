//! 소셜 프로젝트 REST 엔드포인트.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use kloud_core::{KloudError, Project, ProjectStore, TokenMetrics};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::SharedState;

/// 펀딩 요청.
#[derive(Debug, Deserialize)]
pub struct FundRequest {
    pub amount: Decimal,
}

/// GET /api/projects
pub async fn list_projects(State(state): State<SharedState<ProjectStore>>) -> Json<Vec<Project>> {
    Json(state.service.projects().await)
}

/// GET /api/projects/{id}
pub async fn get_project(
    State(state): State<SharedState<ProjectStore>>,
    Path(id): Path<String>,
) -> ApiResult<Project> {
    let project = state
        .service
        .project(&id)
        .await
        .ok_or_else(|| KloudError::NotFound(id.clone()))?;
    Ok(Json(project))
}

/// POST /api/projects/{id}/fund
pub async fn fund_project(
    State(state): State<SharedState<ProjectStore>>,
    Path(id): Path<String>,
    payload: Result<Json<FundRequest>, JsonRejection>,
) -> ApiResult<Project> {
    let Json(request) = payload?;
    let project = state.service.fund_project(&id, request.amount).await?;
    Ok(Json(project))
}

/// GET /api/token/metrics
pub async fn token_metrics(State(state): State<SharedState<ProjectStore>>) -> Json<TokenMetrics> {
    Json(state.service.token_metrics().await)
}

/// 소셜 REST 라우터.
pub fn routes() -> Router<SharedState<ProjectStore>> {
    Router::new()
        .route("/api/projects", get(list_projects))
        .route("/api/projects/{id}", get(get_project))
        .route("/api/projects/{id}/fund", post(fund_project))
        .route("/api/token/metrics", get(token_metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::BroadcastHub;
    use crate::service::{FeedService, ServiceKind};
    use crate::source::SimulatedSource;
    use crate::state::AppState;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let service = FeedService::new(
            BroadcastHub::new(ProjectStore::seeded()),
            Box::new(SimulatedSource),
            Duration::from_secs(30),
            Duration::from_secs(10),
        );
        routes().with_state(Arc::new(AppState::new(Arc::new(service), ServiceKind::Social)))
    }

    fn fund(id: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/api/projects/{id}/fund"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_fund_completes_project() {
        let response = app()
            .oneshot(fund("proj-001", r#"{"amount":20000}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["currentFunding"], 52000.0);
        assert_eq!(json["status"], "completed");
    }

    #[tokio::test]
    async fn test_fund_rejects_non_positive_amount() {
        let response = app()
            .oneshot(fund("proj-001", r#"{"amount":-5}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "INVALID_AMOUNT");
    }

    #[tokio::test]
    async fn test_fund_unknown_project() {
        let response = app()
            .oneshot(fund("proj-999", r#"{"amount":10}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_token_metrics_reflect_store() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/token/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["symbol"], "KLOUD");
        assert_eq!(json["totalSocialFunding"], 91650.0);
        assert_eq!(json["activeProjects"], 3);
    }

    #[tokio::test]
    async fn test_get_project() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/projects/proj-004")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "proposed");
    }
}
