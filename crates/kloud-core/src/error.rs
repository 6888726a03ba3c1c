//! 대시보드 피드 전반의 에러 타입.
//!
//! 저장소 명령, 설정 로드, 직렬화 과정에서 발생하는 에러를 정의합니다.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KloudError {
    /// 알 수 없는 레코드 ID
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 레코드는 존재하지만 명령어를 해석할 수 없음
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// 0 이하의 펀딩 금액
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// 그 밖의 잘못된 입력
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 설정 에러
    #[error("Config error: {0}")]
    Config(String),

    /// 직렬화 에러
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// 도메인 작업을 위한 Result 타입.
pub type KloudResult<T> = Result<T, KloudError>;

impl KloudError {
    /// 호출자 입력이 원인인 에러인지 확인합니다.
    ///
    /// HTTP 계층에서 400 계열 응답을 고를 때 사용합니다.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            KloudError::NotFound(_)
                | KloudError::InvalidCommand(_)
                | KloudError::InvalidAmount(_)
                | KloudError::InvalidInput(_)
        )
    }

    /// 에러 코드 문자열.
    pub fn code(&self) -> &'static str {
        match self {
            KloudError::NotFound(_) => "NOT_FOUND",
            KloudError::InvalidCommand(_) => "INVALID_COMMAND",
            KloudError::InvalidAmount(_) => "INVALID_AMOUNT",
            KloudError::InvalidInput(_) => "INVALID_INPUT",
            KloudError::Config(_) => "CONFIG_ERROR",
            KloudError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

impl From<serde_json::Error> for KloudError {
    fn from(err: serde_json::Error) -> Self {
        KloudError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for KloudError {
    fn from(err: config::ConfigError) -> Self {
        KloudError::Config(err.to_string())
    }
}
