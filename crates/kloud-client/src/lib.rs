//! # Kloud Client
//!
//! 대시보드 피드 서비스용 자동 재연결 WebSocket 클라이언트.
//!
//! - [`machine`]: 전송 계층과 분리된 재연결 상태 머신
//! - [`policy`]: `stable` / `capped` 재연결 프로파일
//! - [`manager`]: tokio-tungstenite 드라이버와 연결 핸들
//! - [`cache`]: 연결이 끊겨도 유지되는 마지막 스냅샷
//!
//! ```no_run
//! use kloud_client::{ConnectionManager, ReconnectPolicy, SnapshotCache, StreamKind};
//! use kloud_core::Rig;
//!
//! # async fn run() -> Result<(), kloud_client::ClientError> {
//! let manager = ConnectionManager::from_origin(
//!     "https://dashboard.example.com",
//!     StreamKind::Mining,
//!     ReconnectPolicy::stable(),
//! )?;
//! let mut handle = manager.start();
//! let mut rigs: SnapshotCache<Vec<Rig>> = SnapshotCache::new(StreamKind::Mining.update_type());
//!
//! while let Some(event) = handle.next_event().await {
//!     if rigs.apply(&event) {
//!         println!("{} rigs", rigs.snapshot().map_or(0, Vec::len));
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod machine;
pub mod manager;
pub mod policy;

pub use cache::SnapshotCache;
pub use endpoint::{endpoint_for, StreamKind};
pub use error::{ClientError, ClientResult};
pub use machine::{Action, ConnectionMachine, ConnectionState, ConnectionStatus};
pub use manager::{ClientEvent, ConnectionHandle, ConnectionManager};
pub use policy::{Backoff, ConnectionProfile, ReconnectPolicy};
