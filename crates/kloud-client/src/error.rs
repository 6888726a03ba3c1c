//! 클라이언트 에러 타입.

use kloud_core::KloudError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// 연결 관리자 에러.
///
/// 전송 계층 에러는 재연결 정책이 내부에서 처리하며, 호출자에게는 정책이
/// 재시도를 모두 소진했을 때만 [`ClientError::GaveUp`]으로 드러납니다.
#[derive(Debug, Error)]
pub enum ClientError {
    /// origin URL을 WebSocket 엔드포인트로 바꿀 수 없음
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// 알 수 없는 재연결 프로파일
    #[error("Unknown reconnect profile: {0}")]
    InvalidProfile(String),

    /// 연결/송수신 실패
    #[error("Transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// 수신 메시지 파싱 실패
    #[error("Malformed message: {0}")]
    MalformedMessage(#[from] KloudError),

    /// 재연결 시도 소진
    #[error("Gave up after {attempts} failed connection attempts")]
    GaveUp { attempts: u32 },
}

/// 클라이언트 작업을 위한 Result 타입.
pub type ClientResult<T> = Result<T, ClientError>;
