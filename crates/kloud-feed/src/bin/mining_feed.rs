//! 채굴 장비 텔레메트리 피드 서버.
//!
//! `MINING_PORT` (기본 3001)에서 `/mining-ws`와 `/api/rigs` 엔드포인트를 제공합니다.

use anyhow::Context;
use kloud_core::{init_logging, AppConfig, LogConfig};
use kloud_feed::metrics::setup_metrics_recorder;
use kloud_feed::{bind, build_mining, serve, shutdown_signal};
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
        port = config.mining.port,
        tick = ?config.mining.tick_interval(),
        source = ?config.mining.data_source,
        "Starting mining feed"
    );

    let app = build_mining(&config.mining, metrics)?;
    let listener = bind(&config.mining.bind_addr()).await?;
    serve(listener, app, shutdown_signal()).await?;

    Ok(())
}
