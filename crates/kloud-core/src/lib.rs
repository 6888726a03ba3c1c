//! # Kloud Core
//!
//! KLOUD BOT PRO 대시보드 피드의 핵심 도메인 모델과 공통 인프라.
//!
//! - 채굴 장비 / 소셜 프로젝트 레코드와 인메모리 저장소
//! - WebSocket 메시지 봉투
//! - 토큰 지표, 채굴 수익 배분 계산
//! - 설정 관리, 로깅 초기화, 에러 타입

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod store;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use store::{ProjectStore, RecordStore, RigStore, Update};
