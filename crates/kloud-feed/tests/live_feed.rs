//! 실제 서버와 클라이언트를 연결하는 통합 테스트.

use std::net::SocketAddr;
use std::time::Duration;

use kloud_client::{
    ClientEvent, ConnectionHandle, ConnectionManager, ReconnectPolicy, SnapshotCache, StreamKind,
};
use kloud_core::{Project, ProjectStatus, Rig, RigStatus, ServiceConfig};
use kloud_feed::{bind, build_mining, build_social, serve};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(10);

struct RunningServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<kloud_feed::FeedResult<()>>,
}

impl RunningServer {
    fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    async fn shutdown(self) {
        self.shutdown.cancel();
        tokio::time::timeout(WAIT, self.task)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

fn test_config(base: ServiceConfig) -> ServiceConfig {
    ServiceConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tick_interval_secs: 1,
        ..base
    }
}

async fn start_mining() -> RunningServer {
    let config = test_config(ServiceConfig::mining());
    let app = build_mining(&config, None).unwrap();
    spawn_server(app).await
}

async fn start_social() -> RunningServer {
    let config = test_config(ServiceConfig::social());
    let app = build_social(&config, None).unwrap();
    spawn_server(app).await
}

async fn spawn_server<S: kloud_core::RecordStore>(app: kloud_feed::FeedApp<S>) -> RunningServer {
    let listener = bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    let task = tokio::spawn(serve(listener, app, async move { signal.cancelled().await }));

    RunningServer {
        addr,
        shutdown,
        task,
    }
}

async fn next_event(handle: &mut ConnectionHandle) -> ClientEvent {
    tokio::time::timeout(WAIT, handle.next_event())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_command_is_pushed_to_connected_client() {
    let server = start_mining().await;
    let mut handle = ConnectionManager::from_origin(
        &server.origin(),
        StreamKind::Mining,
        ReconnectPolicy::capped(),
    )
    .unwrap()
    .start();
    let mut rigs: SnapshotCache<Vec<Rig>> = SnapshotCache::new(StreamKind::Mining.update_type());

    assert_eq!(next_event(&mut handle).await, ClientEvent::Connected);
    let snapshot = next_event(&mut handle).await;
    assert!(rigs.apply(&snapshot));
    assert_eq!(rigs.snapshot().unwrap().len(), 4);

    let response = reqwest::Client::new()
        .post(format!("{}/api/rigs/rig-001/command", server.origin()))
        .json(&serde_json::json!({ "command": "shutdown" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    loop {
        let event = next_event(&mut handle).await;
        rigs.apply(&event);
        let rig_001 = &rigs.snapshot().unwrap()[0];
        if rig_001.status == RigStatus::Offline {
            assert_eq!(rig_001.hashrate, 0.0);
            break;
        }
    }

    server.shutdown().await;
    assert_eq!(next_event(&mut handle).await, ClientEvent::Disconnected);
    assert!(!rigs.apply(&ClientEvent::Disconnected));
    assert!(rigs.is_stale());
    assert_eq!(rigs.snapshot().unwrap()[0].status, RigStatus::Offline);

    handle.stop().await;
}

#[tokio::test]
async fn test_ticks_and_funding_reach_client() {
    let server = start_social().await;
    let mut handle = ConnectionManager::from_origin(
        &server.origin(),
        StreamKind::Social,
        ReconnectPolicy::stable(),
    )
    .unwrap()
    .start();
    let mut projects: SnapshotCache<Vec<Project>> =
        SnapshotCache::new(StreamKind::Social.update_type());

    assert_eq!(next_event(&mut handle).await, ClientEvent::Connected);
    projects.apply(&next_event(&mut handle).await);
    let initial = projects.snapshot().unwrap()[0].current_funding;

    // 1초 틱 이후 펀딩 증가
    projects.apply(&next_event(&mut handle).await);
    assert!(projects.snapshot().unwrap()[0].current_funding > initial);

    let response = reqwest::Client::new()
        .post(format!("{}/api/projects/proj-001/fund", server.origin()))
        .json(&serde_json::json!({ "amount": 20000 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    loop {
        projects.apply(&next_event(&mut handle).await);
        if projects.snapshot().unwrap()[0].status == ProjectStatus::Completed {
            break;
        }
    }

    handle.stop().await;
    assert!(handle.next_event().await.is_none());
    server.shutdown().await;
}
