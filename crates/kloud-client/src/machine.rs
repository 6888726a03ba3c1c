//! 연결 상태 머신.
//!
//! 전송 계층과 분리된 순수 상태 머신입니다. 각 전이 메서드는 드라이버가 수행할
//! [`Action`] 목록을 반환하고, 드라이버는 소켓/타이머 이벤트를 다시 전이
//! 메서드로 전달하는 얇은 어댑터 역할만 합니다.
//!
//! ```text
//! Disconnected ──start──▶ Connecting ──open──▶ Connected
//!      ▲                      │                    │
//!      │                 open failed            closed
//!      └──── retry elapsed ◀──┴────────────────────┘
//!                  (정책 소진 시 GaveUp)
//! ```

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::policy::ReconnectPolicy;

/// 연결 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// 연결 없음 (초기 상태 또는 재시도 대기)
    Disconnected,
    Connecting,
    Connected,
    /// 중지 요청으로 채널을 닫는 중
    Closing,
    /// 재시도 소진 (종료 상태)
    GaveUp,
    /// `stop()` 완료 (종료 상태)
    Stopped,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::GaveUp | ConnectionState::Stopped)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
            ConnectionState::GaveUp => "gave_up",
            ConnectionState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// 드라이버가 수행할 동작.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// 채널 열기
    Connect,
    StartHeartbeat(Duration),
    CancelHeartbeat,
    /// 하트비트 `ping` 전송
    SendPing,
    ScheduleReconnect(Duration),
    CancelReconnect,
    CloseChannel,
    NotifyConnected,
    NotifyDisconnected,
    NotifyGaveUp,
}

/// 호출자에게 노출되는 연결 상태 요약.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// 연속 실패 횟수 (연결 성공 시 0)
    pub failures: u32,
    /// 남은 시도 횟수 (무제한 정책이면 `None`)
    pub remaining_attempts: Option<u32>,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// 재연결 상태 머신.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    policy: ReconnectPolicy,
    state: ConnectionState,
    failures: u32,
    retry_pending: bool,
    heartbeat_active: bool,
}

impl ConnectionMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            failures: 0,
            retry_pending: false,
            heartbeat_active: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn remaining_attempts(&self) -> Option<u32> {
        self.policy.remaining_attempts(self.failures)
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    pub fn heartbeat_active(&self) -> bool {
        self.heartbeat_active
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            failures: self.failures,
            remaining_attempts: self.remaining_attempts(),
        }
    }

    /// 최초 연결 시작. 초기 상태에서만 유효합니다.
    pub fn start(&mut self) -> Vec<Action> {
        if self.state != ConnectionState::Disconnected || self.retry_pending {
            return Vec::new();
        }
        self.state = ConnectionState::Connecting;
        vec![Action::Connect]
    }

    /// 채널 열림.
    pub fn on_open(&mut self) -> Vec<Action> {
        if self.state != ConnectionState::Connecting {
            return Vec::new();
        }
        self.state = ConnectionState::Connected;
        self.failures = 0;
        info!("Connection established");

        let mut actions = vec![Action::NotifyConnected];
        if let Some(period) = self.policy.heartbeat {
            self.heartbeat_active = true;
            actions.push(Action::StartHeartbeat(period));
        }
        actions
    }

    /// 채널 열기 실패.
    pub fn on_open_failed(&mut self) -> Vec<Action> {
        if self.state != ConnectionState::Connecting {
            return Vec::new();
        }
        self.fail()
    }

    /// 채널이 닫히거나 에러가 발생함.
    pub fn on_closed(&mut self) -> Vec<Action> {
        match self.state {
            ConnectionState::Connected => {
                let mut actions = Vec::new();
                if self.heartbeat_active {
                    self.heartbeat_active = false;
                    actions.push(Action::CancelHeartbeat);
                }
                actions.push(Action::NotifyDisconnected);
                actions.extend(self.fail());
                actions
            }
            ConnectionState::Connecting => self.fail(),
            ConnectionState::Closing => {
                self.state = ConnectionState::Stopped;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// 재연결 타이머 만료.
    pub fn on_retry_elapsed(&mut self) -> Vec<Action> {
        if self.state != ConnectionState::Disconnected || !self.retry_pending {
            return Vec::new();
        }
        self.retry_pending = false;
        self.state = ConnectionState::Connecting;
        debug!(attempt = self.failures + 1, "Reconnecting");
        vec![Action::Connect]
    }

    /// 하트비트 타이머 만료.
    pub fn on_heartbeat_due(&mut self) -> Vec<Action> {
        if self.state == ConnectionState::Connected && self.heartbeat_active {
            vec![Action::SendPing]
        } else {
            Vec::new()
        }
    }

    /// 중지 요청. 대기 중인 타이머를 모두 취소하고, 열린 채널은 닫습니다.
    pub fn stop(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.retry_pending {
            self.retry_pending = false;
            actions.push(Action::CancelReconnect);
        }
        if self.heartbeat_active {
            self.heartbeat_active = false;
            actions.push(Action::CancelHeartbeat);
        }

        match self.state {
            ConnectionState::Connected => {
                self.state = ConnectionState::Closing;
                actions.push(Action::CloseChannel);
            }
            ConnectionState::Closing | ConnectionState::Stopped => {}
            _ => self.state = ConnectionState::Stopped,
        }
        actions
    }

    fn fail(&mut self) -> Vec<Action> {
        self.failures = self.failures.saturating_add(1);

        if !self.policy.allows_retry(self.failures) {
            self.state = ConnectionState::GaveUp;
            warn!(failures = self.failures, "Reconnect attempts exhausted, giving up");
            return vec![Action::NotifyGaveUp];
        }

        let delay = self.policy.delay_for(self.failures);
        self.state = ConnectionState::Disconnected;
        self.retry_pending = true;
        warn!(
            failures = self.failures,
            remaining = ?self.remaining_attempts(),
            delay = ?delay,
            "Connection lost, scheduling reconnect"
        );
        vec![Action::ScheduleReconnect(delay)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_with_heartbeat() {
        let mut machine = ConnectionMachine::new(ReconnectPolicy::stable());
        assert_eq!(machine.state(), ConnectionState::Disconnected);

        assert_eq!(machine.start(), vec![Action::Connect]);
        assert_eq!(machine.state(), ConnectionState::Connecting);

        assert_eq!(
            machine.on_open(),
            vec![
                Action::NotifyConnected,
                Action::StartHeartbeat(Duration::from_secs(60))
            ]
        );
        assert!(machine.status().is_connected());
        assert_eq!(machine.on_heartbeat_due(), vec![Action::SendPing]);
    }

    #[test]
    fn test_close_schedules_exactly_one_reconnect() {
        let mut machine = ConnectionMachine::new(ReconnectPolicy::stable());
        machine.start();
        machine.on_open();

        assert_eq!(
            machine.on_closed(),
            vec![
                Action::CancelHeartbeat,
                Action::NotifyDisconnected,
                Action::ScheduleReconnect(Duration::from_secs(3)),
            ]
        );
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        // 중복 close 이벤트는 두 번째 재연결을 예약하지 않음
        assert!(machine.on_closed().is_empty());
        assert!(machine.on_heartbeat_due().is_empty());

        assert_eq!(machine.on_retry_elapsed(), vec![Action::Connect]);
        assert!(machine.on_retry_elapsed().is_empty());
    }

    #[test]
    fn test_open_resets_failure_counter() {
        let mut machine = ConnectionMachine::new(ReconnectPolicy::capped());
        machine.start();
        machine.on_open_failed();
        machine.on_retry_elapsed();
        machine.on_open_failed();
        assert_eq!(machine.failures(), 2);
        assert_eq!(machine.remaining_attempts(), Some(3));

        machine.on_retry_elapsed();
        machine.on_open();
        assert_eq!(machine.failures(), 0);
        assert_eq!(machine.remaining_attempts(), Some(5));
    }

    #[test]
    fn test_capped_gives_up_after_five_failures() {
        let mut machine = ConnectionMachine::new(ReconnectPolicy::capped());
        let mut connects = machine.start().len();

        for _ in 0..4 {
            assert_eq!(
                machine.on_open_failed(),
                vec![Action::ScheduleReconnect(Duration::from_secs(5))]
            );
            connects += machine.on_retry_elapsed().len();
        }
        assert_eq!(machine.on_open_failed(), vec![Action::NotifyGaveUp]);

        assert_eq!(connects, 5);
        assert_eq!(machine.state(), ConnectionState::GaveUp);
        assert_eq!(machine.remaining_attempts(), Some(0));
        assert!(!machine.retry_pending());
        assert!(machine.on_retry_elapsed().is_empty());
        assert!(machine.start().is_empty());
    }

    #[test]
    fn test_stop_cancels_pending_timers() {
        let mut machine = ConnectionMachine::new(ReconnectPolicy::stable());
        machine.start();
        machine.on_open();
        machine.on_closed();
        assert!(machine.retry_pending());

        assert_eq!(machine.stop(), vec![Action::CancelReconnect]);
        assert_eq!(machine.state(), ConnectionState::Stopped);
        assert!(machine.on_retry_elapsed().is_empty());
        assert!(machine.on_open().is_empty());
    }

    #[test]
    fn test_stop_while_connected_closes_channel() {
        let mut machine = ConnectionMachine::new(ReconnectPolicy::stable());
        machine.start();
        machine.on_open();

        assert_eq!(
            machine.stop(),
            vec![Action::CancelHeartbeat, Action::CloseChannel]
        );
        assert_eq!(machine.state(), ConnectionState::Closing);
        assert!(machine.on_heartbeat_due().is_empty());

        assert!(machine.on_closed().is_empty());
        assert_eq!(machine.state(), ConnectionState::Stopped);
    }
}
