//! 브로드캐스트 허브.
//!
//! 허브는 라이브 저장소와 구독자 채널 집합을 함께 소유합니다. 모든 변경은
//! 하나의 락 안에서 "변경 → 직렬화 → 전송" 순서로 처리되므로
//!
//! - 새 구독자는 구독 시점의 스냅샷을 정확히 한 번 받고
//! - 구독자별로 브로드캐스트 순서가 보존되며
//! - 닫힌 채널이나 버퍼가 가득 찬 채널은 전송 시점에 제거되고 나머지 구독자에게는
//!   영향이 없습니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use kloud_core::{Envelope, KloudResult, RecordStore, Update};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::metrics;

/// 구독자별 미전송 메시지 한도. 이를 넘기면 느린 구독자로 보고 제거합니다.
pub const SUBSCRIBER_BUFFER: usize = 32;

/// 구독자 ID.
pub type SubscriberId = u64;

/// 구독 핸들.
///
/// `receiver`는 직렬화된 봉투(JSON 문자열)를 브로드캐스트 순서대로 전달합니다.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<String>,
}

struct HubInner<S> {
    store: S,
    subscribers: HashMap<SubscriberId, mpsc::Sender<String>>,
    rng: StdRng,
}

/// 저장소와 구독자 집합을 소유하는 브로드캐스트 허브.
pub struct BroadcastHub<S: RecordStore> {
    inner: Mutex<HubInner<S>>,
    next_id: AtomicU64,
    topic: String,
}

impl<S: RecordStore> BroadcastHub<S> {
    /// 엔트로피 시드 RNG로 허브 생성.
    pub fn new(store: S) -> Self {
        Self::with_rng(store, StdRng::from_entropy())
    }

    /// 주어진 RNG로 허브 생성.
    pub fn with_rng(store: S, rng: StdRng) -> Self {
        let topic = store.update_type().to_string();
        Self {
            inner: Mutex::new(HubInner {
                store,
                subscribers: HashMap::new(),
                rng,
            }),
            next_id: AtomicU64::new(1),
            topic,
        }
    }

    /// 브로드캐스트 태그 (`rigs:update` 등).
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 새 구독자 등록.
    ///
    /// 등록과 같은 임계 구역에서 현재 스냅샷을 먼저 채널에 넣으므로, 반환된
    /// 수신자의 첫 메시지는 항상 구독 시점의 전체 상태입니다.
    pub async fn subscribe(&self) -> KloudResult<Subscription> {
        let (tx, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.inner.lock().await;
        let snapshot = inner.store.snapshot()?.to_json()?;
        // 비어 있는 새 채널이므로 실패할 수 없음
        let _ = tx.try_send(snapshot);
        inner.subscribers.insert(id, tx);

        let count = inner.subscribers.len();
        metrics::set_subscribers(&self.topic, count);
        info!(topic = %self.topic, subscriber_id = id, subscribers = count, "Subscriber added");

        Ok(Subscription { id, receiver })
    }

    /// 구독자 제거. 이미 제거된 ID는 무시합니다.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut inner = self.inner.lock().await;
        let removed = inner.subscribers.remove(&id).is_some();
        if removed {
            let count = inner.subscribers.len();
            metrics::set_subscribers(&self.topic, count);
            info!(topic = %self.topic, subscriber_id = id, subscribers = count, "Subscriber removed");
        }
        removed
    }

    /// 현재 상태를 모든 구독자에게 전송하고, 전달된 구독자 수를 반환합니다.
    pub async fn broadcast(&self) -> KloudResult<usize> {
        let mut inner = self.inner.lock().await;
        self.broadcast_locked(&mut inner)
    }

    /// 특정 구독자에게만 봉투를 전송합니다.
    pub async fn send_to(&self, id: SubscriberId, envelope: &Envelope) -> KloudResult<bool> {
        let json = envelope.to_json()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .subscribers
            .get(&id)
            .map(|tx| tx.try_send(json).is_ok())
            .unwrap_or(false))
    }

    /// 데이터 소스 갱신을 적용하고 브로드캐스트합니다.
    ///
    /// 반영된 레코드가 없으면 브로드캐스트하지 않습니다.
    pub async fn apply_update(&self, update: Update<S::Record>) -> KloudResult<usize> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let applied = inner.store.apply(update, &mut inner.rng);
        if applied > 0 {
            self.broadcast_locked(inner)?;
        }
        Ok(applied)
    }

    /// 저장소를 변경하고, 성공하면 브로드캐스트합니다.
    pub async fn mutate<T, F>(&self, f: F) -> KloudResult<T>
    where
        F: FnOnce(&mut S) -> KloudResult<T> + Send,
    {
        let mut inner = self.inner.lock().await;
        let value = f(&mut inner.store)?;
        self.broadcast_locked(&mut inner)?;
        Ok(value)
    }

    /// 클로저가 `true`를 반환했을 때만 브로드캐스트합니다.
    pub async fn mutate_if_changed<F>(&self, f: F) -> KloudResult<bool>
    where
        F: FnOnce(&mut S) -> bool + Send,
    {
        let mut inner = self.inner.lock().await;
        let changed = f(&mut inner.store);
        if changed {
            self.broadcast_locked(&mut inner)?;
        }
        Ok(changed)
    }

    /// 저장소 읽기.
    pub async fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let inner = self.inner.lock().await;
        f(&inner.store)
    }

    /// 현재 구독자 수.
    pub async fn subscriber_count(&self) -> usize {
        self.inner.lock().await.subscribers.len()
    }

    /// 모든 구독자 채널을 닫습니다. 닫은 수를 반환합니다.
    pub async fn close_all(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let count = inner.subscribers.len();
        inner.subscribers.clear();
        metrics::set_subscribers(&self.topic, 0);
        if count > 0 {
            info!(topic = %self.topic, closed = count, "All subscribers closed");
        }
        count
    }

    fn broadcast_locked(&self, inner: &mut HubInner<S>) -> KloudResult<usize> {
        let json = inner.store.snapshot()?.to_json()?;

        let before = inner.subscribers.len();
        let topic = &self.topic;
        inner.subscribers.retain(|id, tx| match tx.try_send(json.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(topic = %topic, subscriber_id = *id, "Subscriber buffer full, dropping");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        });
        let delivered = inner.subscribers.len();
        let dropped = before - delivered;

        metrics::record_broadcast(&self.topic);
        if dropped > 0 {
            warn!(topic = %self.topic, dropped, delivered, "Dropped subscribers during broadcast");
            metrics::record_dropped_subscribers(&self.topic, dropped);
            metrics::set_subscribers(&self.topic, delivered);
        }
        debug!(topic = %self.topic, delivered, "Snapshot broadcast");

        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kloud_core::{MessageType, ProjectStore, RigStatus, RigStore};
    use std::time::Duration;

    fn hub() -> BroadcastHub<RigStore> {
        BroadcastHub::with_rng(
            RigStore::seeded(Duration::from_secs(5)),
            StdRng::seed_from_u64(7),
        )
    }

    fn decode(json: &str) -> Envelope {
        Envelope::from_json(json).unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_sends_current_snapshot() {
        let hub = hub();
        hub.mutate(|store| store.apply_command("rig-001", "shutdown"))
            .await
            .unwrap();

        let mut sub = hub.subscribe().await.unwrap();
        let first = decode(&sub.receiver.recv().await.unwrap());
        let expected = hub.read(|store| store.snapshot().unwrap()).await;

        assert_eq!(first.kind, MessageType::RigsUpdate);
        assert_eq!(first.data, expected.data);
        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let hub = hub();
        let a = hub.subscribe().await.unwrap();
        let _b = hub.subscribe().await.unwrap();

        assert!(hub.unsubscribe(a.id).await);
        assert_eq!(hub.subscriber_count().await, 1);
        assert!(!hub.unsubscribe(a.id).await);
        assert_eq!(hub.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn test_broadcast_isolates_closed_subscriber() {
        let hub = hub();
        let mut first = hub.subscribe().await.unwrap();
        let second = hub.subscribe().await.unwrap();
        let mut third = hub.subscribe().await.unwrap();
        drop(second.receiver);

        let delivered = hub.broadcast().await.unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(hub.subscriber_count().await, 2);
        // 초기 스냅샷 + 브로드캐스트
        for sub in [&mut first, &mut third] {
            assert!(sub.receiver.recv().await.is_some());
            assert!(sub.receiver.recv().await.is_some());
        }
        assert!(!hub.unsubscribe(second.id).await);
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_dropped() {
        let hub = hub();
        let mut fast = hub.subscribe().await.unwrap();
        let mut slow = hub.subscribe().await.unwrap();
        fast.receiver.recv().await.unwrap();

        // 초기 스냅샷이 한 칸을 차지하므로 SUBSCRIBER_BUFFER번째 전송에서 가득 찬다
        for _ in 0..SUBSCRIBER_BUFFER {
            hub.broadcast().await.unwrap();
            fast.receiver.recv().await.unwrap();
        }

        assert_eq!(hub.subscriber_count().await, 1);
        assert!(!hub.unsubscribe(slow.id).await);

        // 이미 쌓인 메시지는 받을 수 있고 이후 채널은 닫힌다
        let mut buffered = 0;
        while slow.receiver.recv().await.is_some() {
            buffered += 1;
        }
        assert_eq!(buffered, SUBSCRIBER_BUFFER);
        assert!(hub.unsubscribe(fast.id).await);
    }

    #[tokio::test]
    async fn test_command_broadcast_reflects_new_status() {
        let hub = hub();
        let mut sub = hub.subscribe().await.unwrap();
        sub.receiver.recv().await.unwrap();

        let rig = hub
            .mutate(|store| store.apply_command("rig-001", "shutdown"))
            .await
            .unwrap();
        assert_eq!(rig.status, RigStatus::Offline);

        let update = decode(&sub.receiver.recv().await.unwrap());
        let data = update.data.unwrap();
        assert_eq!(data[0]["id"], "rig-001");
        assert_eq!(data[0]["status"], "offline");
    }

    #[tokio::test]
    async fn test_failed_mutation_does_not_broadcast() {
        let hub = hub();
        let mut sub = hub.subscribe().await.unwrap();
        sub.receiver.recv().await.unwrap();

        let err = hub
            .mutate(|store| store.apply_command("unknown-id", "restart"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "NOT_FOUND");
        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_order_per_subscriber() {
        let hub = BroadcastHub::with_rng(ProjectStore::seeded(), StdRng::seed_from_u64(1));
        let mut sub = hub.subscribe().await.unwrap();
        sub.receiver.recv().await.unwrap();

        for _ in 0..5 {
            hub.apply_update(Update::Perturb).await.unwrap();
        }

        let mut previous = rust_decimal::Decimal::ZERO;
        for _ in 0..5 {
            let envelope = decode(&sub.receiver.recv().await.unwrap());
            let funding: rust_decimal::Decimal =
                serde_json::from_value(envelope.data.unwrap()[0]["currentFunding"].clone())
                    .unwrap();
            assert!(funding > previous);
            previous = funding;
        }
    }

    #[tokio::test]
    async fn test_close_all_ends_receivers() {
        let hub = hub();
        let mut sub = hub.subscribe().await.unwrap();
        sub.receiver.recv().await.unwrap();

        assert_eq!(hub.close_all().await, 1);
        assert!(sub.receiver.recv().await.is_none());
    }
}
