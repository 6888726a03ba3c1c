//! 자동 재연결 WebSocket 연결 관리자.
//!
//! [`ConnectionManager::start`]는 드라이버 태스크를 띄우고 [`ConnectionHandle`]을
//! 반환합니다. 드라이버는 소켓 프레임, 재연결 타이머, 하트비트 타이머를 기다렸다가
//! 각 이벤트를 [`ConnectionMachine`] 전이로 넘기고, 돌려받은 [`Action`]만 수행합니다.
//!
//! 모든 타이머와 소켓은 드라이버 태스크 안에 있으므로, 수명 토큰을 취소하고 태스크를
//! join하면 이후에 실행되는 지연 작업은 없습니다.

use std::collections::VecDeque;
use std::future::pending;
use std::pin::Pin;

use futures::{SinkExt, StreamExt};
use kloud_core::Envelope;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior, Sleep};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::dispatch::{classify, Inbound};
use crate::endpoint::{endpoint_for, StreamKind};
use crate::error::{ClientError, ClientResult};
use crate::machine::{Action, ConnectionMachine, ConnectionStatus};
use crate::policy::ReconnectPolicy;

/// 이벤트 채널 용량.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 호출자에게 전달되는 연결 이벤트.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected,
    Disconnected,
    /// 하트비트 응답을 제외한 모든 수신 메시지
    Message(Envelope),
    /// 재시도 소진 (종료)
    GaveUp,
}

/// 연결 관리자 설정.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    endpoint: Url,
    policy: ReconnectPolicy,
}

impl ConnectionManager {
    pub fn new(endpoint: Url, policy: ReconnectPolicy) -> Self {
        Self { endpoint, policy }
    }

    /// 대시보드 origin으로부터 생성.
    pub fn from_origin(origin: &str, kind: StreamKind, policy: ReconnectPolicy) -> ClientResult<Self> {
        Ok(Self::new(endpoint_for(origin, kind)?, policy))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// 드라이버 태스크 시작.
    pub fn start(self) -> ConnectionHandle {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let machine = ConnectionMachine::new(self.policy);
        let (status_tx, status_rx) = watch::channel(machine.status());
        let token = CancellationToken::new();

        let driver = Driver {
            endpoint: self.endpoint,
            machine,
            token: token.clone(),
            events: event_tx,
            status: status_tx,
            socket: None,
            retry: None,
            heartbeat: None,
        };
        let task = tokio::spawn(driver.run());

        ConnectionHandle {
            events: event_rx,
            status: status_rx,
            token,
            task: Some(task),
        }
    }
}

/// 실행 중인 연결에 대한 핸들.
///
/// 핸들을 drop하면 연결도 중지되지만, 드라이버 종료를 기다리려면 [`stop`](Self::stop)을
/// 사용해야 합니다.
#[derive(Debug)]
pub struct ConnectionHandle {
    events: mpsc::Receiver<ClientEvent>,
    status: watch::Receiver<ConnectionStatus>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ConnectionHandle {
    /// 다음 이벤트. 드라이버가 끝나면 `None`.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.events.recv().await
    }

    /// 현재 연결 상태.
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// 상태 변경 구독.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// 연결을 중지하고 드라이버가 끝날 때까지 기다립니다.
    ///
    /// 반환 후에는 재연결/하트비트 타이머가 실행되지 않고 새 이벤트도 없습니다.
    pub async fn stop(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Connection driver ended abnormally");
            }
        }
        self.events.close();
        while self.events.try_recv().is_ok() {}
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// 드라이버 태스크 상태.
struct Driver {
    endpoint: Url,
    machine: ConnectionMachine,
    token: CancellationToken,
    events: mpsc::Sender<ClientEvent>,
    status: watch::Sender<ConnectionStatus>,
    socket: Option<WsStream>,
    retry: Option<Pin<Box<Sleep>>>,
    heartbeat: Option<Interval>,
}

impl Driver {
    async fn run(mut self) {
        info!(endpoint = %self.endpoint, "Connection manager started");
        let mut pending_actions: VecDeque<Action> = self.machine.start().into();

        loop {
            while let Some(action) = pending_actions.pop_front() {
                let follow_up = self.perform(action).await;
                pending_actions.extend(follow_up);
                self.publish_status();
            }

            if self.machine.state().is_terminal() {
                break;
            }

            let follow_up = tokio::select! {
                biased;
                _ = self.token.cancelled() => self.machine.stop(),
                _ = wait_retry(&mut self.retry) => {
                    self.retry = None;
                    self.machine.on_retry_elapsed()
                }
                _ = wait_heartbeat(&mut self.heartbeat) => self.machine.on_heartbeat_due(),
                frame = next_frame(&mut self.socket) => self.on_frame(frame).await,
            };
            pending_actions.extend(follow_up);
            self.publish_status();
        }

        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None).await;
        }
        info!(endpoint = %self.endpoint, state = %self.machine.state(), "Connection manager stopped");
    }

    async fn perform(&mut self, action: Action) -> Vec<Action> {
        match action {
            Action::Connect => self.connect().await,
            Action::StartHeartbeat(period) => {
                let mut heartbeat = interval_at(Instant::now() + period, period);
                heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.heartbeat = Some(heartbeat);
                Vec::new()
            }
            Action::CancelHeartbeat => {
                self.heartbeat = None;
                Vec::new()
            }
            Action::SendPing => self.send_ping().await,
            Action::ScheduleReconnect(delay) => {
                self.retry = Some(Box::pin(tokio::time::sleep(delay)));
                Vec::new()
            }
            Action::CancelReconnect => {
                self.retry = None;
                Vec::new()
            }
            Action::CloseChannel => {
                if let Some(mut socket) = self.socket.take() {
                    if let Err(e) = socket.close(None).await {
                        debug!(error = %e, "Close handshake failed");
                    }
                }
                self.machine.on_closed()
            }
            Action::NotifyConnected => {
                emit(&self.token, &self.events, ClientEvent::Connected).await;
                Vec::new()
            }
            Action::NotifyDisconnected => {
                emit(&self.token, &self.events, ClientEvent::Disconnected).await;
                Vec::new()
            }
            Action::NotifyGaveUp => {
                emit(&self.token, &self.events, ClientEvent::GaveUp).await;
                Vec::new()
            }
        }
    }

    async fn connect(&mut self) -> Vec<Action> {
        debug!(endpoint = %self.endpoint, attempt = self.machine.failures() + 1, "Connecting");
        self.publish_status();

        let result = tokio::select! {
            biased;
            _ = self.token.cancelled() => return self.machine.stop(),
            result = connect_async(self.endpoint.as_str()) => result,
        };

        match result {
            Ok((socket, _)) => {
                self.socket = Some(socket);
                self.machine.on_open()
            }
            Err(e) => {
                let err = ClientError::from(e);
                warn!(endpoint = %self.endpoint, error = %err, "Connection attempt failed");
                self.machine.on_open_failed()
            }
        }
    }

    async fn send_ping(&mut self) -> Vec<Action> {
        let Some(socket) = self.socket.as_mut() else {
            return Vec::new();
        };
        let ping = match Envelope::ping().to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to encode heartbeat");
                return Vec::new();
            }
        };

        match socket.send(Message::Text(ping)).await {
            Ok(()) => {
                debug!("Heartbeat sent");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Heartbeat send failed");
                self.socket = None;
                self.machine.on_closed()
            }
        }
    }

    async fn on_frame(
        &mut self,
        frame: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
    ) -> Vec<Action> {
        match frame {
            Some(Ok(Message::Text(text))) => {
                match classify(&text) {
                    Inbound::Forward(envelope) => {
                        emit(&self.token, &self.events, ClientEvent::Message(envelope)).await
                    }
                    Inbound::KeepAlive | Inbound::Malformed(_) => {}
                }
                Vec::new()
            }
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "Server closed connection");
                self.socket = None;
                self.machine.on_closed()
            }
            Some(Ok(_)) => Vec::new(),
            Some(Err(e)) => {
                warn!(error = %e, "WebSocket receive error");
                self.socket = None;
                self.machine.on_closed()
            }
            None => {
                debug!("WebSocket stream ended");
                self.socket = None;
                self.machine.on_closed()
            }
        }
    }

    fn publish_status(&self) {
        let status = self.machine.status();
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

/// 이벤트 전송. 중지된 뒤에는 아무것도 보내지 않습니다.
async fn emit(token: &CancellationToken, events: &mpsc::Sender<ClientEvent>, event: ClientEvent) {
    if token.is_cancelled() {
        return;
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => {}
        result = events.send(event) => {
            if result.is_err() {
                debug!("Event receiver dropped");
            }
        }
    }
}

async fn wait_retry(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

async fn wait_heartbeat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn next_frame(
    socket: &mut Option<WsStream>,
) -> Option<Result<Message, tokio_tungstenite::tungstenite::Error>> {
    match socket {
        Some(socket) => socket.next().await,
        None => pending().await,
    }
}
