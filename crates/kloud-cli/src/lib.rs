//! `kloud` CLI 도구 모음.
//!
//! - 실시간 스냅샷 구독 (`watch`)
//! - 피드 서비스 REST 호출 (`rigs`, `command`, `projects`, `fund`, `token`)

pub mod commands;
