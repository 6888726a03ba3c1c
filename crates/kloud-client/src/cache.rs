//! 마지막 스냅샷 캐시.
//!
//! 연결이 끊겨도 마지막으로 받은 스냅샷은 지우지 않고, 대신 [`SnapshotCache::is_stale`]로
//! 오래된 데이터임을 표시합니다.

use kloud_core::MessageType;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::manager::ClientEvent;

/// 한 스냅샷 태그에 대한 캐시.
#[derive(Debug, Clone)]
pub struct SnapshotCache<T> {
    kind: MessageType,
    snapshot: Option<T>,
    last_updated: Option<i64>,
    connected: bool,
    gave_up: bool,
}

impl<T: DeserializeOwned> SnapshotCache<T> {
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            snapshot: None,
            last_updated: None,
            connected: false,
            gave_up: false,
        }
    }

    /// 연결 이벤트 반영. 스냅샷이 바뀌었으면 `true`를 반환합니다.
    pub fn apply(&mut self, event: &ClientEvent) -> bool {
        match event {
            ClientEvent::Connected => {
                self.connected = true;
                self.gave_up = false;
                false
            }
            ClientEvent::Disconnected => {
                self.connected = false;
                false
            }
            ClientEvent::GaveUp => {
                self.connected = false;
                self.gave_up = true;
                false
            }
            ClientEvent::Message(envelope) if envelope.kind == self.kind => {
                let Some(data) = envelope.data.clone() else {
                    warn!(kind = %self.kind, "Snapshot without payload, keeping previous");
                    return false;
                };
                match serde_json::from_value::<T>(data) {
                    Ok(snapshot) => {
                        self.snapshot = Some(snapshot);
                        self.last_updated = envelope.timestamp;
                        true
                    }
                    Err(e) => {
                        warn!(kind = %self.kind, error = %e, "Failed to decode snapshot, keeping previous");
                        false
                    }
                }
            }
            ClientEvent::Message(_) => false,
        }
    }

    pub fn snapshot(&self) -> Option<&T> {
        self.snapshot.as_ref()
    }

    /// 마지막 스냅샷의 서버 타임스탬프 (epoch millis).
    pub fn last_updated(&self) -> Option<i64> {
        self.last_updated
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// 연결이 끊긴 상태에서 표시 중인 데이터인지 확인.
    pub fn is_stale(&self) -> bool {
        !self.connected
    }

    pub fn gave_up(&self) -> bool {
        self.gave_up
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kloud_core::{Envelope, Rig, RigStatus};
    use serde_json::json;

    fn snapshot_event(status: &str) -> ClientEvent {
        ClientEvent::Message(Envelope::new(
            MessageType::RigsUpdate,
            json!([{
                "id": "rig-001",
                "name": "Antminer S19 Pro #1",
                "rigType": "asic",
                "status": status,
                "hashrate": 110.0,
                "powerDraw": 3250.0,
                "temperature": 42.0,
                "efficiency": 29.5,
                "uptimeSecs": 0,
                "lastUpdated": 0
            }]),
        ))
    }

    #[test]
    fn test_keeps_last_snapshot_when_disconnected() {
        let mut cache: SnapshotCache<Vec<Rig>> = SnapshotCache::new(MessageType::RigsUpdate);
        assert!(cache.is_stale());

        cache.apply(&ClientEvent::Connected);
        assert!(cache.apply(&snapshot_event("online")));
        assert!(!cache.is_stale());

        cache.apply(&ClientEvent::Disconnected);
        assert!(cache.is_stale());
        assert_eq!(cache.snapshot().unwrap()[0].status, RigStatus::Online);
        assert!(cache.last_updated().is_some());
    }

    #[test]
    fn test_ignores_other_tags_and_bad_payloads() {
        let mut cache: SnapshotCache<Vec<Rig>> = SnapshotCache::new(MessageType::RigsUpdate);
        cache.apply(&snapshot_event("offline"));

        let other = ClientEvent::Message(Envelope::new(MessageType::PriceUpdate, json!({"price": 1})));
        assert!(!cache.apply(&other));

        let bad = ClientEvent::Message(Envelope::new(MessageType::RigsUpdate, json!({"nope": true})));
        assert!(!cache.apply(&bad));
        assert_eq!(cache.snapshot().unwrap()[0].status, RigStatus::Offline);
    }

    #[test]
    fn test_gave_up_flag() {
        let mut cache: SnapshotCache<Vec<Rig>> = SnapshotCache::new(MessageType::RigsUpdate);
        cache.apply(&ClientEvent::GaveUp);
        assert!(cache.gave_up());
        assert!(cache.is_stale());
    }
}
