//! 소셜 프로젝트 펀딩 피드 서버.
//!
//! `SOCIAL_PORT` (기본 3002)에서 `/social-ws`와 `/api/projects`, `/api/token/metrics` 엔드포인트를 제공합니다.

use anyhow::Context;
use kloud_core::{init_logging, AppConfig, LogConfig};
use kloud_feed::metrics::setup_metrics_recorder;
use kloud_feed::{bind, build_social, serve, shutdown_signal};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = AppConfig::load_default().context("Failed to load configuration")?;
    init_logging(LogConfig::from_config(&config.logging))
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    let metrics = match setup_metrics_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Prometheus recorder unavailable, /metrics will be empty");
            None
        }
    };

    info!(
        port = config.social.port,
        tick = ?config.social.tick_interval(),
        source = ?config.social.data_source,
        "Starting social feed"
    );

    let app = build_social(&config.social, metrics)?;
    let listener = bind(&config.social.bind_addr()).await?;
    serve(listener, app, shutdown_signal()).await?;

    Ok(())
}
