//! WebSocket 메시지 봉투.
//!
//! 서버와 클라이언트가 주고받는 모든 메시지는 같은 JSON 형식을 사용합니다.
//!
//! ```json
//! {"type": "rigs:update", "data": [...], "timestamp": 1738300800000}
//! {"type": "ping"}
//! {"type": "pong", "timestamp": 1738300800000}
//! ```

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::KloudResult;

/// 메시지 태그.
///
/// 알 수 없는 태그도 버리지 않고 `Other`로 보존하여 그대로 전달합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// 채굴 장비 스냅샷
    RigsUpdate,
    /// 소셜 프로젝트 스냅샷
    ProjectsUpdate,
    /// 토큰 가격 업데이트
    PriceUpdate,
    /// 클라이언트 하트비트
    Ping,
    /// 하트비트 응답
    Pong,
    /// 그 밖의 태그
    Other(String),
}

impl MessageType {
    /// 와이어 상의 태그 문자열.
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::RigsUpdate => "rigs:update",
            MessageType::ProjectsUpdate => "projects:update",
            MessageType::PriceUpdate => "price:update",
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
            MessageType::Other(tag) => tag,
        }
    }

    /// 연결 유지용 태그인지 확인.
    pub fn is_keep_alive(&self) -> bool {
        matches!(self, MessageType::Ping | MessageType::Pong)
    }
}

impl From<String> for MessageType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "rigs:update" => MessageType::RigsUpdate,
            "projects:update" => MessageType::ProjectsUpdate,
            "price:update" => MessageType::PriceUpdate,
            "ping" => MessageType::Ping,
            "pong" => MessageType::Pong,
            _ => MessageType::Other(tag),
        }
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Other(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 태그가 붙은 메시지 봉투.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// 메시지 태그
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// 페이로드 (엔티티 배열 또는 도메인 데이터)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// 서버 타임스탬프 (epoch millis, 서버 → 클라이언트 전용)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Envelope {
    /// 페이로드와 현재 시각을 담은 서버 메시지 생성.
    pub fn new(kind: MessageType, data: Value) -> Self {
        Self {
            kind,
            data: Some(data),
            timestamp: Some(Utc::now().timestamp_millis()),
        }
    }

    /// 직렬화 가능한 값으로 서버 메시지 생성.
    pub fn with_payload<T: Serialize>(kind: MessageType, payload: &T) -> KloudResult<Self> {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }

    /// 클라이언트 하트비트 (페이로드 없음).
    pub fn ping() -> Self {
        Self {
            kind: MessageType::Ping,
            data: None,
            timestamp: None,
        }
    }

    /// 하트비트 응답.
    pub fn pong() -> Self {
        Self {
            kind: MessageType::Pong,
            data: None,
            timestamp: Some(Utc::now().timestamp_millis()),
        }
    }

    /// JSON 문자열에서 파싱.
    pub fn from_json(json: &str) -> KloudResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// JSON 문자열로 직렬화.
    pub fn to_json(&self) -> KloudResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ping_has_no_payload() {
        let json = Envelope::ping().to_json().unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);
    }

    #[test]
    fn test_parse_snapshot_envelope() {
        let raw = r#"{"type":"rigs:update","data":[{"id":"rig-001"}],"timestamp":1700000000000}"#;
        let envelope = Envelope::from_json(raw).unwrap();

        assert_eq!(envelope.kind, MessageType::RigsUpdate);
        assert_eq!(envelope.timestamp, Some(1_700_000_000_000));
        assert_eq!(envelope.data, Some(json!([{"id": "rig-001"}])));
    }

    #[test]
    fn test_unknown_tag_is_preserved() {
        let raw = r#"{"type":"ai:prediction","data":{"confidence":0.8}}"#;
        let envelope = Envelope::from_json(raw).unwrap();

        assert_eq!(envelope.kind, MessageType::Other("ai:prediction".to_string()));
        let back = envelope.to_json().unwrap();
        assert!(back.contains(r#""type":"ai:prediction""#));
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(Envelope::from_json("{not json").is_err());
        assert!(Envelope::from_json(r#"{"data": 1}"#).is_err());
    }

    #[test]
    fn test_keep_alive_tags() {
        assert!(MessageType::Pong.is_keep_alive());
        assert!(MessageType::Ping.is_keep_alive());
        assert!(!MessageType::ProjectsUpdate.is_keep_alive());
    }
}
