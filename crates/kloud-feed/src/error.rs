//! 피드 서비스 에러 타입과 HTTP 에러 응답.
//!
//! 모든 REST 엔드포인트는 실패 시 같은 JSON 형식을 사용합니다.
//!
//! ```json
//! {"error": "Record not found: rig-999", "code": "NOT_FOUND"}
//! ```

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kloud_core::KloudError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 피드 서비스 에러.
#[derive(Debug, Error)]
pub enum FeedError {
    /// 외부 피드 요청 실패
    #[error("Feed fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// 도메인 에러
    #[error(transparent)]
    Domain(#[from] KloudError),

    /// 리스너 바인딩 실패
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTP 서버 실행 실패
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// 피드 작업을 위한 Result 타입.
pub type FeedResult<T> = Result<T, FeedError>;

/// 에러 응답 본문.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// 사람이 읽을 수 있는 에러 메시지
    pub error: String,
    /// 에러 코드
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// HTTP 에러 응답.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: message.into(),
                code: Some(code.to_string()),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl From<KloudError> for ApiError {
    fn from(err: KloudError) -> Self {
        let status = match &err {
            KloudError::NotFound(_) => StatusCode::NOT_FOUND,
            KloudError::InvalidCommand(_)
            | KloudError::InvalidAmount(_)
            | KloudError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            KloudError::Config(_) | KloudError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "Request failed");
        }
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// 핸들러 Result 타입.
pub type ApiResult<T> = Result<Json<T>, ApiError>;
