//! 재연결 정책.
//!
//! 두 가지 기본 프로파일을 제공합니다.
//!
//! | 프로파일 | 지연 | 최대 시도 | 하트비트 |
//! |----------|------|-----------|----------|
//! | `stable` | 3초 고정 | 무제한 | 60초 |
//! | `capped` | 5초 고정 | 5회 | 없음 |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ClientError;

/// 재시도 간격 증가 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// 항상 같은 지연
    Fixed,
    /// `delay * 2^(n-1)`, `max`에서 멈춤
    Exponential { max: Duration },
}

/// 재연결 정책.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// 기본 재시도 지연
    pub delay: Duration,
    /// 연속 실패 허용 횟수 (`None`이면 무제한)
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
    /// 하트비트 간격 (`None`이면 보내지 않음)
    pub heartbeat: Option<Duration>,
}

impl ReconnectPolicy {
    /// 3초 고정 지연, 무제한 재시도, 60초 하트비트.
    pub fn stable() -> Self {
        Self {
            delay: Duration::from_secs(3),
            max_attempts: None,
            backoff: Backoff::Fixed,
            heartbeat: Some(Duration::from_secs(60)),
        }
    }

    /// 5초 고정 지연, 최대 5회, 하트비트 없음.
    pub fn capped() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: Some(5),
            backoff: Backoff::Fixed,
            heartbeat: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: Option<Duration>) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// `failures`번째 연속 실패 뒤의 재시도 지연.
    pub fn delay_for(&self, failures: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { max } => {
                let exponent = failures.saturating_sub(1);
                let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
                self.delay.checked_mul(factor).unwrap_or(max).min(max)
            }
        }
    }

    /// 연속 실패 `failures`회 뒤에도 재시도할 수 있는지 확인.
    pub fn allows_retry(&self, failures: u32) -> bool {
        self.max_attempts.map_or(true, |max| failures < max)
    }

    /// 남은 시도 횟수 (무제한이면 `None`).
    pub fn remaining_attempts(&self, failures: u32) -> Option<u32> {
        self.max_attempts.map(|max| max.saturating_sub(failures))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::stable()
    }
}

/// 설정 파일에서 고르는 정책 이름.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionProfile {
    #[default]
    Stable,
    Capped,
}

impl ConnectionProfile {
    pub fn policy(&self) -> ReconnectPolicy {
        match self {
            ConnectionProfile::Stable => ReconnectPolicy::stable(),
            ConnectionProfile::Capped => ReconnectPolicy::capped(),
        }
    }
}

impl FromStr for ConnectionProfile {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stable" => Ok(Self::Stable),
            "capped" => Ok(Self::Capped),
            _ => Err(ClientError::InvalidProfile(s.to_string())),
        }
    }
}

impl fmt::Display for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionProfile::Stable => write!(f, "stable"),
            ConnectionProfile::Capped => write!(f, "capped"),
        }
    }
}
