//! 라우터 공유 상태.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kloud_core::RecordStore;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::service::{FeedService, ServiceKind};

/// 핸들러가 공유하는 애플리케이션 상태.
pub struct AppState<S: RecordStore> {
    /// 피드 서비스 (허브 포함)
    pub service: Arc<FeedService<S>>,
    pub kind: ServiceKind,
    pub started_at: DateTime<Utc>,
    pub version: String,
    /// `/metrics` 렌더링 핸들. 없으면 빈 응답.
    pub metrics: Option<PrometheusHandle>,
}

impl<S: RecordStore> AppState<S> {
    pub fn new(service: Arc<FeedService<S>>, kind: ServiceKind) -> Self {
        Self {
            service,
            kind,
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// 시작 후 경과 시간 (초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

/// 공유 상태 타입.
pub type SharedState<S> = Arc<AppState<S>>;
