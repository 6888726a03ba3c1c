//! 실시간 스냅샷 구독 명령.
//!
//! 연결 관리자로 스트림에 붙어서 스냅샷이 바뀔 때마다 한 줄 요약을 출력합니다.
//! 연결이 끊기면 마지막 스냅샷을 유지한 채 `[stale]` 표시로 바꿉니다.

use std::fmt::Write as _;

use anyhow::Result;
use kloud_client::{
    ClientError, ClientEvent, ConnectionManager, ConnectionProfile, SnapshotCache, StreamKind,
};
use kloud_core::{Project, Rig};
use tracing::{info, warn};

/// `watch` 실행 옵션.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub origin: String,
    pub stream: StreamKind,
    pub profile: ConnectionProfile,
    /// 지정한 수만큼 스냅샷을 받으면 종료
    pub limit: Option<usize>,
}

enum Cache {
    Mining(SnapshotCache<Vec<Rig>>),
    Social(SnapshotCache<Vec<Project>>),
}

impl Cache {
    fn new(stream: StreamKind) -> Self {
        match stream {
            StreamKind::Mining => Cache::Mining(SnapshotCache::new(stream.update_type())),
            StreamKind::Social => Cache::Social(SnapshotCache::new(stream.update_type())),
        }
    }

    fn apply(&mut self, event: &ClientEvent) -> bool {
        match self {
            Cache::Mining(cache) => cache.apply(event),
            Cache::Social(cache) => cache.apply(event),
        }
    }

    fn render(&self) -> Option<String> {
        match self {
            Cache::Mining(cache) => cache
                .snapshot()
                .map(|rigs| stale_prefix(cache.is_stale()) + &format_rigs(rigs)),
            Cache::Social(cache) => cache
                .snapshot()
                .map(|projects| stale_prefix(cache.is_stale()) + &format_projects(projects)),
        }
    }
}

fn stale_prefix(stale: bool) -> String {
    if stale {
        "[stale] ".to_string()
    } else {
        String::new()
    }
}

/// 장비 스냅샷 요약: `rig-001 online 110.0TH/s 42.0C | rig-003 online 480.0MH/s ...`
pub fn format_rigs(rigs: &[Rig]) -> String {
    let mut line = String::new();
    for (i, rig) in rigs.iter().enumerate() {
        if i > 0 {
            line.push_str(" | ");
        }
        let _ = write!(
            line,
            "{} {} {:.1}{} {:.1}C",
            rig.id,
            rig.status,
            rig.hashrate,
            rig.rig_type.hashrate_unit(),
            rig.temperature
        );
    }
    line
}

/// 프로젝트 스냅샷 요약: `proj-001 active 45000/50000 | ...`
pub fn format_projects(projects: &[Project]) -> String {
    let mut line = String::new();
    for (i, project) in projects.iter().enumerate() {
        if i > 0 {
            line.push_str(" | ");
        }
        let _ = write!(
            line,
            "{} {} {}/{}",
            project.id,
            project.status,
            project.current_funding.round_dp(2),
            project.funding_goal
        );
    }
    line
}

/// 스트림 구독을 실행합니다.
///
/// Ctrl+C, 스냅샷 수 제한, 또는 재연결 포기 시 종료합니다. 포기한 경우
/// [`ClientError::GaveUp`]을 반환합니다.
pub async fn watch(options: WatchOptions) -> Result<()> {
    let policy = options.profile.policy();
    let manager = ConnectionManager::from_origin(&options.origin, options.stream, policy.clone())?;
    info!(
        endpoint = %manager.endpoint(),
        profile = %options.profile,
        "Watching stream"
    );

    let mut handle = manager.start();
    let mut cache = Cache::new(options.stream);
    let mut received = 0usize;

    let outcome = loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break Ok(());
            }
            event = handle.next_event() => event,
        };

        let Some(event) = event else {
            break Ok(());
        };

        let changed = cache.apply(&event);
        match &event {
            ClientEvent::Connected => info!("Connected"),
            ClientEvent::Disconnected => {
                let status = handle.status();
                warn!(
                    failures = status.failures,
                    remaining = ?status.remaining_attempts,
                    "Disconnected, reconnecting"
                );
                if let Some(line) = cache.render() {
                    println!("{line}");
                }
            }
            ClientEvent::GaveUp => {
                let attempts = policy.max_attempts.unwrap_or_default();
                break Err(ClientError::GaveUp { attempts }.into());
            }
            ClientEvent::Message(_) => {}
        }

        if changed {
            if let Some(line) = cache.render() {
                println!("{line}");
            }
            received += 1;
            if options.limit.is_some_and(|limit| received >= limit) {
                break Ok(());
            }
        }
    };

    handle.stop().await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use kloud_core::{seed_projects, seed_rigs};

    #[test]
    fn test_format_rigs() {
        let rigs = seed_rigs();
        let line = format_rigs(&rigs[..2]);
        assert!(line.starts_with("rig-001 online "));
        assert!(line.contains(" | rig-002 "));
        assert!(line.contains("TH/s"));
    }

    #[test]
    fn test_format_rigs_uses_gpu_unit() {
        let rigs = seed_rigs();
        let gpu = rigs.iter().find(|r| r.id == "rig-003").cloned().unwrap();
        let line = format_rigs(&[gpu]);
        assert!(line.starts_with("rig-003 online 480.0MH/s "), "{line}");
        assert!(!line.contains("TH/s"));
    }

    #[test]
    fn test_format_projects() {
        let projects = seed_projects();
        let line = format_projects(&projects);
        assert_eq!(line.matches(" | ").count(), projects.len() - 1);
        assert!(line.contains("proj-004 proposed"));
    }

    #[test]
    fn test_stale_render_keeps_snapshot() {
        let mut cache = Cache::new(StreamKind::Mining);
        assert!(cache.render().is_none());

        let envelope = kloud_core::Envelope::new(
            StreamKind::Mining.update_type(),
            serde_json::to_value(seed_rigs()).unwrap(),
        );
        cache.apply(&ClientEvent::Connected);
        assert!(cache.apply(&ClientEvent::Message(envelope)));
        assert!(cache.render().unwrap().starts_with("rig-001"));

        cache.apply(&ClientEvent::Disconnected);
        assert!(cache.render().unwrap().starts_with("[stale] rig-001"));
    }
}
