//! 피드 서비스 수명 주기.
//!
//! [`FeedService`]는 허브, 업데이트 루프, 지연 작업(재시작 완료 타이머)을
//! 하나의 수명 토큰 아래에 묶습니다. `stop()` 이후에는 어떤 지연 작업도
//! 실행되지 않습니다.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use kloud_core::{
    KloudResult, Project, ProjectStore, RecordStore, Rig, RigStatus, RigStore, ServiceConfig,
    TokenMetrics,
};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::FeedResult;
use crate::hub::BroadcastHub;
use crate::source::{self, DataSource};
use crate::update_loop::UpdateLoop;

/// 서비스 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// 채굴 장비 텔레메트리
    Mining,
    /// 소셜 프로젝트 펀딩
    Social,
}

impl ServiceKind {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::Mining => "mining",
            ServiceKind::Social => "social",
        }
    }

    /// WebSocket 엔드포인트 경로.
    pub fn ws_path(&self) -> &'static str {
        match self {
            ServiceKind::Mining => "/mining-ws",
            ServiceKind::Social => "/social-ws",
        }
    }
}

/// 허브와 업데이트 루프를 소유하는 피드 서비스.
pub struct FeedService<S: RecordStore> {
    hub: Arc<BroadcastHub<S>>,
    source: Mutex<Option<Box<dyn DataSource<S::Record>>>>,
    tick_interval: Duration,
    restart_delay: Duration,
    lifetime: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: RecordStore> FeedService<S> {
    pub fn new(
        hub: BroadcastHub<S>,
        source: Box<dyn DataSource<S::Record>>,
        tick_interval: Duration,
        restart_delay: Duration,
    ) -> Self {
        Self {
            hub: Arc::new(hub),
            source: Mutex::new(Some(source)),
            tick_interval,
            restart_delay,
            lifetime: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// 서비스 설정으로 생성 (데이터 소스 선택 포함).
    pub fn from_config(store: S, config: &ServiceConfig) -> FeedResult<Self> {
        let source = source::from_config::<S::Record>(config)?;
        Ok(Self::new(
            BroadcastHub::new(store),
            source,
            config.tick_interval(),
            config.restart_delay(),
        ))
    }

    pub fn hub(&self) -> &Arc<BroadcastHub<S>> {
        &self.hub
    }

    /// `stop()`이 호출되지 않았는지 확인.
    pub fn is_running(&self) -> bool {
        !self.lifetime.is_cancelled()
    }

    /// 업데이트 루프를 시작합니다. 두 번째 호출은 무시됩니다.
    pub async fn start(&self) {
        if self.lifetime.is_cancelled() {
            warn!(topic = %self.hub.topic(), "Service already stopped, not starting");
            return;
        }
        let Some(source) = self.source.lock().await.take() else {
            debug!(topic = %self.hub.topic(), "Service already started");
            return;
        };

        let update_loop = UpdateLoop::new(self.hub.clone(), source, self.tick_interval);
        let token = self.lifetime.child_token();
        let handle = tokio::spawn(async move {
            update_loop.run(token).await;
        });
        self.tasks.lock().await.push(handle);

        info!(topic = %self.hub.topic(), interval = ?self.tick_interval, "Feed service started");
    }

    /// 수명 토큰을 취소하고 모든 작업이 끝날 때까지 기다린 뒤 구독자 채널을 닫습니다.
    ///
    /// 여러 번 호출해도 안전합니다.
    pub async fn stop(&self) {
        self.lifetime.cancel();

        let handles: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(topic = %self.hub.topic(), error = %e, "Service task ended abnormally");
            }
        }

        self.hub.close_all().await;
        info!(topic = %self.hub.topic(), "Feed service stopped");
    }

    /// `delay` 후에 `task`를 실행합니다.
    ///
    /// 서비스가 먼저 중지되면 실행하지 않습니다. 예약 여부를 반환합니다.
    pub async fn schedule_after<F, Fut>(&self, delay: Duration, task: F) -> bool
    where
        F: FnOnce(Arc<BroadcastHub<S>>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.lifetime.is_cancelled() {
            return false;
        }

        let token = self.lifetime.child_token();
        let hub = self.hub.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if !token.is_cancelled() {
                        task(hub).await;
                    }
                }
            }
        });

        let mut tasks = self.tasks.lock().await;
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
        true
    }
}

impl FeedService<RigStore> {
    /// 장비 명령 적용 후 브로드캐스트.
    ///
    /// `restart`는 재시작 지연 후 `online` 전이를 예약합니다. 그 사이 같은 장비에
    /// 다른 명령이 들어오면 예약된 전이는 무시됩니다.
    pub async fn command_rig(&self, id: &str, command: &str) -> KloudResult<Rig> {
        let (rig, generation) = self
            .hub
            .mutate(|store| {
                let rig = store.apply_command(id, command)?;
                Ok((rig, store.command_generation(id)))
            })
            .await?;
        info!(rig_id = %id, command, status = %rig.status, "Rig command accepted");

        if rig.status == RigStatus::Restarting {
            let rig_id = rig.id.clone();
            self.schedule_after(self.restart_delay, move |hub| async move {
                match hub
                    .mutate_if_changed(|store| store.complete_restart(&rig_id, generation))
                    .await
                {
                    Ok(true) => info!(rig_id = %rig_id, "Rig restart completed"),
                    Ok(false) => debug!(rig_id = %rig_id, generation, "Restart superseded, skip"),
                    Err(e) => warn!(rig_id = %rig_id, error = %e, "Failed to broadcast restart completion"),
                }
            })
            .await;
        }

        Ok(rig)
    }

    pub async fn rigs(&self) -> Vec<Rig> {
        self.hub.read(|store| store.records().to_vec()).await
    }

    pub async fn rig(&self, id: &str) -> Option<Rig> {
        self.hub.read(|store| store.get(id).cloned()).await
    }
}

impl FeedService<ProjectStore> {
    /// 프로젝트 펀딩 후 브로드캐스트.
    pub async fn fund_project(&self, id: &str, amount: Decimal) -> KloudResult<Project> {
        let project = self.hub.mutate(|store| store.fund(id, amount)).await?;
        info!(project_id = %id, amount = %amount, status = %project.status, "Project funded");
        Ok(project)
    }

    pub async fn projects(&self) -> Vec<Project> {
        self.hub.read(|store| store.records().to_vec()).await
    }

    pub async fn project(&self, id: &str) -> Option<Project> {
        self.hub.read(|store| store.get(id).cloned()).await
    }

    pub async fn token_metrics(&self) -> TokenMetrics {
        self.hub.read(|store| store.token_metrics()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SimulatedSource;
    use kloud_core::{Envelope, ProjectStatus};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    fn mining_service() -> FeedService<RigStore> {
        FeedService::new(
            BroadcastHub::with_rng(RigStore::seeded(Duration::from_secs(5)), StdRng::seed_from_u64(11)),
            Box::new(SimulatedSource),
            Duration::from_secs(5),
            Duration::from_secs(10),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_completes_after_delay() {
        let service = mining_service();
        let mut sub = service.hub().subscribe().await.unwrap();
        sub.receiver.recv().await.unwrap();

        let rig = service.command_rig("rig-002", "restart").await.unwrap();
        assert_eq!(rig.status, RigStatus::Restarting);
        sub.receiver.recv().await.unwrap();

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(service.rig("rig-002").await.unwrap().status, RigStatus::Restarting);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(service.rig("rig-002").await.unwrap().status, RigStatus::Online);

        let update = Envelope::from_json(&sub.receiver.recv().await.unwrap()).unwrap();
        assert_eq!(update.data.unwrap()[1]["status"], "online");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_restart() {
        let service = mining_service();
        service.command_rig("rig-002", "restart").await.unwrap();

        service.stop().await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert!(!service.is_running());
        assert_eq!(service.rig("rig-002").await.unwrap().status, RigStatus::Restarting);
        assert!(!service.schedule_after(Duration::ZERO, |_| async {}).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_superseded_by_shutdown() {
        let service = mining_service();
        service.command_rig("rig-001", "restart").await.unwrap();
        service.command_rig("rig-001", "shutdown").await.unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(service.rig("rig-001").await.unwrap().status, RigStatus::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_restart_waits_full_delay() {
        let service = mining_service();
        service.command_rig("rig-001", "restart").await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        service.command_rig("rig-001", "start").await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        service.command_rig("rig-001", "restart").await.unwrap();

        // 첫 번째 재시작 타이머(t=10)는 무시된다
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(service.rig("rig-001").await.unwrap().status, RigStatus::Restarting);

        // 두 번째 재시작은 t=18에 완료
        tokio::time::sleep(Duration::from_secs(8)).await;
        assert_eq!(service.rig("rig-001").await.unwrap().status, RigStatus::Online);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_closes_subscribers() {
        let service = mining_service();
        service.start().await;
        service.start().await;

        let mut sub = service.hub().subscribe().await.unwrap();
        sub.receiver.recv().await.unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(sub.receiver.recv().await.is_some());

        service.stop().await;
        service.stop().await;
        assert!(sub.receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_fund_project_completes() {
        let service = FeedService::new(
            BroadcastHub::new(ProjectStore::seeded()),
            Box::new(SimulatedSource),
            Duration::from_secs(30),
            Duration::from_secs(10),
        );

        let project = service.fund_project("proj-001", dec!(20000)).await.unwrap();
        assert_eq!(project.current_funding, dec!(52000));
        assert_eq!(project.status, ProjectStatus::Completed);

        let err = service.fund_project("proj-001", dec!(0)).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_AMOUNT");
        assert_eq!(service.token_metrics().await.projects_completed, 1);
    }
}
