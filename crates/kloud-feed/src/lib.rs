//! # Kloud Feed
//!
//! 대시보드용 실시간 피드 서비스.
//!
//! - [`hub`]: 저장소를 소유하고 구독자에게 스냅샷을 팬아웃하는 브로드캐스트 허브
//! - [`update_loop`]: 고정 간격으로 데이터 소스 갱신을 적용하는 루프
//! - [`source`]: 시뮬레이션 / 외부 HTTP 피드 데이터 소스
//! - [`service`]: 허브와 루프, 지연 작업의 수명 주기
//! - [`websocket`], [`routes`]: axum WebSocket 및 REST 엔드포인트
//! - [`server`]: 조립과 graceful shutdown

pub mod error;
pub mod hub;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod service;
pub mod source;
pub mod state;
pub mod update_loop;
pub mod websocket;

pub use error::{ApiError, FeedError, FeedResult};
pub use hub::{BroadcastHub, SubscriberId, Subscription};
pub use server::{bind, build_mining, build_social, serve, shutdown_signal, FeedApp};
pub use service::{FeedService, ServiceKind};
pub use source::{DataSource, ExternalFeedSource, SimulatedSource};
pub use state::{AppState, SharedState};
pub use update_loop::UpdateLoop;
