//! 고정 간격 업데이트 루프.

use std::sync::Arc;
use std::time::Duration;

use kloud_core::RecordStore;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::hub::BroadcastHub;
use crate::metrics;
use crate::source::DataSource;

/// 틱마다 데이터 소스에서 갱신을 받아 허브에 적용하는 루프.
pub struct UpdateLoop<S: RecordStore> {
    hub: Arc<BroadcastHub<S>>,
    source: Box<dyn DataSource<S::Record>>,
    interval: Duration,
}

impl<S: RecordStore> UpdateLoop<S> {
    pub fn new(
        hub: Arc<BroadcastHub<S>>,
        source: Box<dyn DataSource<S::Record>>,
        interval: Duration,
    ) -> Self {
        Self {
            hub,
            source,
            interval,
        }
    }

    /// 취소될 때까지 실행합니다. 완료된 틱 수를 반환합니다.
    ///
    /// 첫 틱은 시작 후 한 간격이 지난 뒤에 발생합니다. 소스 실패 시 해당 틱은
    /// 건너뛰고 이전 상태를 유지합니다.
    pub async fn run(self, token: CancellationToken) -> u64 {
        info!(
            topic = %self.hub.topic(),
            source = self.source.name(),
            interval = ?self.interval,
            "Update loop started"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // interval의 첫 tick은 즉시 완료됨
        ticker.tick().await;

        let mut ticks = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let update = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                update = self.source.next_update() => update,
            };

            match update {
                Ok(update) => match self.hub.apply_update(update).await {
                    Ok(applied) => {
                        ticks += 1;
                        debug!(topic = %self.hub.topic(), applied, tick = ticks, "Tick applied");
                    }
                    Err(e) => error!(topic = %self.hub.topic(), error = %e, "Failed to broadcast tick"),
                },
                Err(e) => {
                    metrics::record_source_failure(self.source.name());
                    warn!(
                        topic = %self.hub.topic(),
                        source = self.source.name(),
                        error = %e,
                        "Data source failed, skipping tick"
                    );
                }
            }
        }

        info!(topic = %self.hub.topic(), ticks, "Update loop stopped");
        ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FeedError, FeedResult};
    use crate::source::SimulatedSource;
    use async_trait::async_trait;
    use kloud_core::{KloudError, ProjectStore, Project, Update};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn hub() -> Arc<BroadcastHub<ProjectStore>> {
        Arc::new(BroadcastHub::with_rng(
            ProjectStore::seeded(),
            StdRng::seed_from_u64(3),
        ))
    }

    struct FailingSource;

    #[async_trait]
    impl DataSource<Project> for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn next_update(&self) -> FeedResult<Update<Project>> {
            Err(FeedError::Domain(KloudError::InvalidInput("unavailable".into())))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_ticks_on_interval() {
        let hub = hub();
        let mut sub = hub.subscribe().await.unwrap();
        sub.receiver.recv().await.unwrap();

        let token = CancellationToken::new();
        let update_loop = UpdateLoop::new(hub.clone(), Box::new(SimulatedSource), Duration::from_secs(30));
        let handle = tokio::spawn(update_loop.run(token.clone()));

        tokio::time::sleep(Duration::from_secs(95)).await;
        token.cancel();
        let ticks = handle.await.unwrap();

        assert_eq!(ticks, 3);
        let mut received = 0;
        while sub.receiver.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_failure_keeps_state() {
        let hub = hub();
        let before = hub.read(|store| store.records().to_vec()).await;

        let token = CancellationToken::new();
        let update_loop = UpdateLoop::new(hub.clone(), Box::new(FailingSource), Duration::from_secs(5));
        let handle = tokio::spawn(update_loop.run(token.clone()));

        tokio::time::sleep(Duration::from_secs(21)).await;
        token.cancel();

        assert_eq!(handle.await.unwrap(), 0);
        assert_eq!(hub.read(|store| store.records().to_vec()).await, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_tick() {
        let hub = hub();
        let token = CancellationToken::new();
        token.cancel();

        let update_loop = UpdateLoop::new(hub, Box::new(SimulatedSource), Duration::from_secs(5));
        assert_eq!(update_loop.run(token).await, 0);
    }
}
