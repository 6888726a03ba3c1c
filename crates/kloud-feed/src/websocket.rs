//! WebSocket 연결 핸들러.
//!
//! 연결마다 허브 구독 하나를 만들고, 송신/수신 태스크 중 하나가 끝나면
//! 나머지를 중단한 뒤 구독을 해제합니다.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use kloud_core::{Envelope, MessageType, RecordStore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::hub::{BroadcastHub, SubscriberId, Subscription};
use crate::state::SharedState;

/// WebSocket 업그레이드 핸들러.
///
/// `GET /mining-ws`, `GET /social-ws`
///
/// 서비스가 중지된 뒤에는 업그레이드하지 않고 503을 반환합니다.
pub async fn websocket_handler<S: RecordStore>(
    State(state): State<SharedState<S>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !state.service.is_running() {
        debug!(service = state.kind.name(), "Rejecting WebSocket upgrade, service stopped");
        return ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "Service is stopping",
        )
        .into_response();
    }

    match ws {
        Ok(ws) => {
            let hub = state.service.hub().clone();
            ws.on_upgrade(move |socket| handle_socket(socket, hub))
        }
        Err(rejection) => rejection.into_response(),
    }
}

async fn handle_socket<S: RecordStore>(socket: WebSocket, hub: Arc<BroadcastHub<S>>) {
    let session_id = Uuid::new_v4();

    let Subscription { id, mut receiver } = match hub.subscribe().await {
        Ok(subscription) => subscription,
        Err(e) => {
            error!(%session_id, error = %e, "Failed to subscribe WebSocket session");
            return;
        }
    };
    info!(%session_id, subscriber_id = id, topic = %hub.topic(), "WebSocket connected");

    let (mut sender, mut stream) = socket.split();

    // 허브 → 클라이언트
    let mut send_task = tokio::spawn(async move {
        while let Some(json) = receiver.recv().await {
            if sender.send(Message::Text(json.into())).await.is_err() {
                return;
            }
        }
        // 허브가 채널을 닫음 (서비스 중지)
        let _ = sender.send(Message::Close(None)).await;
    });

    // 클라이언트 → 허브
    let recv_hub = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Text(text)) => handle_client_text(&recv_hub, id, text.as_str()).await,
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(subscriber_id = id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            debug!(%session_id, "Send task ended");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            debug!(%session_id, "Receive task ended");
            send_task.abort();
        }
    }

    hub.unsubscribe(id).await;
    info!(%session_id, subscriber_id = id, "WebSocket disconnected");
}

/// 클라이언트 텍스트 메시지 처리.
///
/// `ping`에는 해당 구독자에게만 `pong`으로 응답하고, 파싱할 수 없는 메시지는
/// 로그만 남기고 버립니다.
async fn handle_client_text<S: RecordStore>(hub: &BroadcastHub<S>, id: SubscriberId, text: &str) {
    match Envelope::from_json(text) {
        Ok(envelope) if envelope.kind == MessageType::Ping => {
            if let Err(e) = hub.send_to(id, &Envelope::pong()).await {
                warn!(subscriber_id = id, error = %e, "Failed to send pong");
            }
        }
        Ok(envelope) => {
            debug!(subscriber_id = id, kind = %envelope.kind, "Ignoring client message");
        }
        Err(e) => {
            warn!(subscriber_id = id, error = %e, "Malformed client message");
        }
    }
}
