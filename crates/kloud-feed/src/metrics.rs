//! Prometheus 메트릭 설정 및 헬퍼.
//!
//! 구독자 수, 브로드캐스트 횟수, 끊긴 구독자 수를 수집하고 `/metrics`로 노출합니다.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Prometheus 레코더를 전역으로 설치하고 렌더링 핸들을 반환합니다.
///
/// 프로세스당 한 번만 호출할 수 있습니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// 현재 구독자 수 설정.
pub fn set_subscribers(topic: &str, count: usize) {
    gauge!("kloud_ws_subscribers", "topic" => topic.to_string()).set(count as f64);
}

/// 브로드캐스트 카운터 증가.
pub fn record_broadcast(topic: &str) {
    counter!("kloud_broadcasts_total", "topic" => topic.to_string()).increment(1);
}

/// 전송 실패로 제거된 구독자 카운터 증가.
pub fn record_dropped_subscribers(topic: &str, count: usize) {
    counter!("kloud_dropped_subscribers_total", "topic" => topic.to_string())
        .increment(count as u64);
}

/// 데이터 소스 실패 카운터 증가.
pub fn record_source_failure(source: &str) {
    counter!("kloud_source_failures_total", "source" => source.to_string()).increment(1);
}
