//! WebSocket 연결 handler.
//!
//! Axum WebSocket 엔드포인트 및 연결별 루프.
//!
//! 연결마다 독립적인 세션과 틱 루프를 돌립니다. 연결 간 병렬성은 각자
//! 분리된 레지스트리를 소유하므로 안전하고, 공유 자원은 스토어 하나뿐입니다.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{Sink, SinkExt, StreamExt};
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use feed_core::{Envelope, EngineConfig};

use crate::engine::EventEngine;
use crate::session::ConnectionSession;
use crate::store::SharedStore;

/// WebSocket 상태.
#[derive(Clone)]
pub struct WsState {
    /// 공유 시뮬레이션 스토어
    pub store: SharedStore,
    /// 이벤트 엔진 설정 (틱 간격, 시드)
    pub engine: EngineConfig,
}

impl WsState {
    /// 새로운 WebSocket 상태 생성.
    pub fn new(store: SharedStore, engine: EngineConfig) -> Self {
        Self { store, engine }
    }
}

/// WebSocket 업그레이드 핸들러.
///
/// # 엔드포인트
///
/// `GET /ws`
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<WsState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// WebSocket 연결 처리.
///
/// 단일 select 루프에서 인바운드 컨트롤 메시지와 엔진 틱을 처리합니다.
/// 연결이 닫히면 세션과 레지스트리는 함께 버려지고 더 이상 푸시되지
/// 않습니다.
async fn handle_socket(socket: WebSocket, state: WsState) {
    let session_id = uuid::Uuid::new_v4().to_string();
    info!(%session_id, "WebSocket connected");

    let engine = EventEngine::new(state.engine.seed);
    let mut session = ConnectionSession::new(session_id.clone(), state.store.clone(), engine);

    let (mut sender, mut receiver) = socket.split();

    // 첫 틱도 온전히 한 간격 뒤에 발화
    let period = state.engine.tick_interval();
    let mut ticker = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match session.handle_tick().await {
                    Ok(Some(envelope)) => {
                        if !send_envelope(&mut sender, &envelope, &session_id).await {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(%session_id, error = %e, "Tick push failed");
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Binary(bytes))) => {
                        // 디코딩 실패는 해당 메시지만 버리고 연결은 유지
                        let envelope = match Envelope::from_bytes(&bytes) {
                            Ok(envelope) => envelope,
                            Err(e) => {
                                warn!(%session_id, error = %e, "Dropping malformed message");
                                continue;
                            }
                        };

                        match session.handle_envelope(&envelope).await {
                            Ok(Some(push)) => {
                                if !send_envelope(&mut sender, &push, &session_id).await {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                warn!(%session_id, error = %e, "Failed to handle envelope");
                            }
                        }
                    }
                    Some(Ok(Message::Text(_))) => {
                        warn!(%session_id, "Text messages not supported");
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%session_id, "Client closed connection");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(%session_id, error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
        }
    }

    info!(
        %session_id,
        subscriptions = session.registry().len(),
        "WebSocket disconnected, clearing subscriptions"
    );
}

/// 봉투를 인코딩해 전송. 실패하면 false를 반환해 루프를 종료시킵니다.
async fn send_envelope(
    sender: &mut (impl Sink<Message> + Unpin),
    envelope: &Envelope,
    session_id: &str,
) -> bool {
    let bytes = match envelope.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(%session_id, error = %e, "Failed to encode envelope");
            return true;
        }
    };

    if sender.send(Message::Binary(bytes.into())).await.is_err() {
        warn!(%session_id, "Failed to send message, closing");
        return false;
    }
    true
}

/// WebSocket 라우터 생성.
pub fn websocket_router(state: WsState) -> Router {
    Router::new().route("/ws", get(websocket_handler)).with_state(state)
}
