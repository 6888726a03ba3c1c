//! 수신 메시지 분류.

use kloud_core::{Envelope, MessageType};
use tracing::{debug, warn};

use crate::error::ClientError;

/// 수신 텍스트 프레임의 분류 결과.
#[derive(Debug)]
pub enum Inbound {
    /// 호출자에게 전달할 메시지
    Forward(Envelope),
    /// 내부에서 소비되는 하트비트 응답
    KeepAlive,
    /// 파싱 실패 (로그 후 폐기)
    Malformed(ClientError),
}

/// 텍스트 프레임을 봉투로 파싱하고 분류합니다.
pub fn classify(text: &str) -> Inbound {
    match Envelope::from_json(text) {
        Ok(envelope) if envelope.kind == MessageType::Pong => {
            debug!("Heartbeat acknowledged");
            Inbound::KeepAlive
        }
        Ok(envelope) => Inbound::Forward(envelope),
        Err(e) => {
            warn!(error = %e, len = text.len(), "Dropping malformed message");
            Inbound::Malformed(ClientError::MalformedMessage(e))
        }
    }
}
