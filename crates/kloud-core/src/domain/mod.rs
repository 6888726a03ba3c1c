//! 대시보드 도메인 모델.
//!
//! - [`rig`]: 채굴 장비 텔레메트리 레코드
//! - [`project`]: 소셜 프로젝트 펀딩 레코드
//! - [`envelope`]: WebSocket 메시지 봉투
//! - [`token`]: 토큰 지표와 채굴 수익 배분

pub mod envelope;
pub mod project;
pub mod rig;
pub mod token;

pub use envelope::{Envelope, MessageType};
pub use project::{seed_projects, Project, ProjectStatus};
pub use rig::{seed_rigs, Rig, RigCommand, RigStatus, RigType, TEMPERATURE_MAX, TEMPERATURE_MIN};
pub use token::{AllocationRequest, MiningAllocation, TokenMetrics, TOKEN_SYMBOL};
