//! 서비스 조립과 HTTP 서버 실행.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use kloud_core::{ProjectStore, RecordStore, RigStore, ServiceConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::{FeedError, FeedResult};
use crate::routes::{mining_router, social_router};
use crate::service::{FeedService, ServiceKind};
use crate::state::AppState;

/// 조립된 서비스와 라우터.
pub struct FeedApp<S: RecordStore> {
    pub service: Arc<FeedService<S>>,
    pub router: Router,
}

fn app_state<S: RecordStore>(
    service: &Arc<FeedService<S>>,
    kind: ServiceKind,
    metrics: Option<PrometheusHandle>,
) -> Arc<AppState<S>> {
    let state = AppState::new(service.clone(), kind);
    Arc::new(match metrics {
        Some(handle) => state.with_metrics(handle),
        None => state,
    })
}

/// 채굴 서비스 조립.
pub fn build_mining(
    config: &ServiceConfig,
    metrics: Option<PrometheusHandle>,
) -> FeedResult<FeedApp<RigStore>> {
    let store = RigStore::seeded(config.tick_interval());
    let service = Arc::new(FeedService::from_config(store, config)?);
    let router = mining_router(app_state(&service, ServiceKind::Mining, metrics));
    Ok(FeedApp { service, router })
}

/// 소셜 서비스 조립.
pub fn build_social(
    config: &ServiceConfig,
    metrics: Option<PrometheusHandle>,
) -> FeedResult<FeedApp<ProjectStore>> {
    let service = Arc::new(FeedService::from_config(ProjectStore::seeded(), config)?);
    let router = social_router(app_state(&service, ServiceKind::Social, metrics));
    Ok(FeedApp { service, router })
}

/// 주소에 리스너 바인딩.
pub async fn bind(addr: &str) -> FeedResult<TcpListener> {
    TcpListener::bind(addr).await.map_err(|source| FeedError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// 서비스를 시작하고 `shutdown`이 완료될 때까지 요청을 처리합니다.
///
/// 종료 시그널을 받으면 서비스를 먼저 중지하여 열린 WebSocket 연결을 닫은 뒤
/// 진행 중인 HTTP 요청이 끝나기를 기다립니다.
pub async fn serve<S, F>(listener: TcpListener, app: FeedApp<S>, shutdown: F) -> FeedResult<()>
where
    S: RecordStore,
    F: Future<Output = ()> + Send + 'static,
{
    let FeedApp { service, router } = app;

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Feed server listening");
    }
    service.start().await;

    let stopping = service.clone();
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown requested, stopping feed service");
            stopping.stop().await;
        })
        .await;

    service.stop().await;
    result.map_err(FeedError::Serve)?;

    info!("Feed server stopped gracefully");
    Ok(())
}

/// Ctrl+C 또는 SIGTERM 대기.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
