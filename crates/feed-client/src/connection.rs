//! 복원 연결.
//!
//! 원시 소켓을 감싸 재연결 사이에도 유지되는 안정적인 이벤트 리스너
//! 표면을 제공합니다. 실제 소켓은 백그라운드 태스크가 소유하며, 예기치
//! 않게 닫히면 고정 지연 후 같은 엔드포인트로 다시 연결합니다.
//!
//! 구독 재전송은 이 계층의 책임이 아닙니다. 바인딩 계층이 새 `Open`
//! 이벤트에 반응해 스스로 구독을 다시 보냅니다.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};

use feed_core::{ClientConfig, ControlKind, Envelope, Topic};

use crate::error::{ClientError, ClientResult};

/// 연결 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// 연결 시도 중
    Connecting = 0,
    /// 열림 (전송 가능)
    Open = 1,
    /// 끊김 (재연결 대기 중)
    Offline = 2,
    /// 종료됨 (재연결 억제)
    Killed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            2 => ConnectionState::Offline,
            _ => ConnectionState::Killed,
        }
    }
}

/// 연결에서 발생하는 이벤트.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// 소켓이 열림 (최초 연결 및 모든 재연결 포함)
    Open,
    /// 디코딩된 메시지 수신
    Message(Envelope),
    /// 소켓이 닫힘
    Close,
    /// 소켓/연결 에러
    Error(String),
}

impl FeedEvent {
    /// 이벤트가 속한 종류.
    pub fn kind(&self) -> EventKind {
        match self {
            FeedEvent::Open => EventKind::Open,
            FeedEvent::Message(_) => EventKind::Message,
            FeedEvent::Close => EventKind::Close,
            FeedEvent::Error(_) => EventKind::Error,
        }
    }
}

/// 리스너가 구독하는 이벤트 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Open,
    Message,
    Close,
    Error,
}

/// 등록된 리스너 핸들.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&FeedEvent) + Send + Sync + 'static>;

/// 핸들과 백그라운드 태스크가 공유하는 내부 상태.
struct Inner {
    state: AtomicU8,
    killed: AtomicBool,
    next_listener: AtomicU64,
    listeners: Mutex<Vec<(u64, EventKind, Callback)>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    kill_notify: Notify,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            killed: AtomicBool::new(false),
            next_listener: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
            outbound: Mutex::new(None),
            kill_notify: Notify::new(),
        }
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    /// 이벤트를 해당 종류의 리스너 전원에게 전달.
    ///
    /// 콜백 호출 전에 스냅샷을 떠서 락 밖에서 실행합니다. 리스너는
    /// 소켓이 아니라 이 레지스트리에 묶여 있으므로 소켓 교체와 무관하게
    /// 유효합니다.
    fn dispatch(&self, event: &FeedEvent) {
        let kind = event.kind();
        let callbacks: Vec<Callback> = {
            let listeners = self.listeners.lock().unwrap();
            listeners
                .iter()
                .filter(|(_, k, _)| *k == kind)
                .map(|(_, _, callback)| callback.clone())
                .collect()
        };

        for callback in callbacks {
            callback(event);
        }
    }
}

/// 복원 WebSocket 연결.
///
/// `Connecting → Open → Offline → Connecting → …` 상태 기계를 따르며,
/// 명시적 `kill()`만이 `Killed` 종단 상태로 전이시켜 재연결을 영구히
/// 억제합니다.
pub struct ResilientConnection {
    url: String,
    reconnect_delay: Duration,
    inner: Arc<Inner>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ResilientConnection {
    /// 새로운 연결 핸들 생성. 아직 접속하지 않습니다.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            url: config.url.clone(),
            reconnect_delay: config.reconnect_delay(),
            inner: Arc::new(Inner::new()),
            task: Mutex::new(None),
        }
    }

    /// 접속 대상 URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// 백그라운드 연결 루프 시작.
    ///
    /// `kill()` 이후의 호출은 호출자 오류이며 `ClientError::Killed`를
    /// 반환합니다. 이미 실행 중이면 no-op입니다.
    pub fn connect(&self) -> ClientResult<()> {
        if self.inner.is_killed() {
            return Err(ClientError::Killed);
        }

        let mut task = self.task.lock().unwrap();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Ok(());
        }

        self.inner.set_state(ConnectionState::Connecting);
        *task = Some(tokio::spawn(run_loop(
            self.inner.clone(),
            self.url.clone(),
            self.reconnect_delay,
        )));

        Ok(())
    }

    /// 현재 연결 상태.
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// 전송 가능한 상태인지 확인.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// kill 여부.
    pub fn has_been_killed(&self) -> bool {
        self.inner.is_killed()
    }

    /// 이벤트 리스너 등록.
    ///
    /// 반환된 핸들은 소켓 교체 후에도 유효하며, 리스너는 이후의 모든
    /// 연결에서 계속 호출됩니다.
    pub fn add_listener(
        &self,
        kind: EventKind,
        callback: impl Fn(&FeedEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.inner.next_listener.fetch_add(1, Ordering::SeqCst);
        self.inner
            .listeners
            .lock()
            .unwrap()
            .push((id, kind, Arc::new(callback)));
        ListenerId(id)
    }

    /// 이벤트 리스너 제거. 등록돼 있었으면 true.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock().unwrap();
        let before = listeners.len();
        listeners.retain(|(listener_id, _, _)| *listener_id != id.0);
        listeners.len() != before
    }

    /// 등록된 리스너 수.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().unwrap().len()
    }

    /// 컨트롤 메시지 전송.
    ///
    /// 소켓이 Open이 아니면 `ClientError::NotConnected`로 즉시 실패합니다.
    /// 조용한 큐잉은 하지 않습니다 (best-effort 전달은 의도된 설계).
    pub fn send(
        &self,
        kind: ControlKind,
        topic: Topic,
        payload: Option<&str>,
    ) -> ClientResult<()> {
        if !self.is_open() {
            return Err(ClientError::NotConnected);
        }

        let envelope = Envelope::control(kind, topic, payload.unwrap_or(""));
        let bytes = envelope.to_bytes()?;

        let outbound = self.inner.outbound.lock().unwrap();
        match outbound.as_ref() {
            Some(tx) => tx
                .send(Message::Binary(bytes))
                .map_err(|_| ClientError::NotConnected),
            None => Err(ClientError::NotConnected),
        }
    }

    /// 연결을 영구히 종료.
    ///
    /// 멱등합니다. 진행 중인 재연결 대기가 있어도 타이머 발화 시점에
    /// kill 플래그를 다시 읽으므로 재연결은 일어나지 않습니다.
    pub fn kill(&self) {
        if self.inner.killed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.set_state(ConnectionState::Killed);
        self.inner.kill_notify.notify_one();
        info!("Connection killed, reconnection disabled");
    }
}

impl Drop for ResilientConnection {
    fn drop(&mut self) {
        self.kill();
    }
}

/// 연결 루프.
///
/// 접속 → 이벤트 중계 → 닫힘 → (kill이 아니면) 지연 후 재접속을 반복합니다.
async fn run_loop(inner: Arc<Inner>, url: String, reconnect_delay: Duration) {
    loop {
        if inner.is_killed() {
            break;
        }

        inner.set_state(ConnectionState::Connecting);

        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                info!(%url, "WebSocket connected");

                let (mut write, mut read) = stream.split();
                let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
                *inner.outbound.lock().unwrap() = Some(tx);

                inner.set_state(ConnectionState::Open);
                inner.dispatch(&FeedEvent::Open);

                loop {
                    tokio::select! {
                        out = rx.recv() => {
                            match out {
                                Some(message) => {
                                    if write.send(message).await.is_err() {
                                        break;
                                    }
                                }
                                None => break,
                            }
                        }

                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Binary(bytes))) => {
                                    match Envelope::from_bytes(&bytes) {
                                        Ok(envelope) => {
                                            inner.dispatch(&FeedEvent::Message(envelope));
                                        }
                                        Err(e) => {
                                            warn!(error = %e, "Dropping malformed message");
                                        }
                                    }
                                }
                                Some(Ok(Message::Ping(_))) => {
                                    // Pong은 tungstenite에서 자동으로 처리됨
                                }
                                Some(Ok(Message::Close(_))) | None => {
                                    debug!("WebSocket closed by server");
                                    break;
                                }
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    warn!(error = %e, "WebSocket error");
                                    inner.dispatch(&FeedEvent::Error(e.to_string()));
                                    break;
                                }
                            }
                        }

                        _ = inner.kill_notify.notified() => {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }

                *inner.outbound.lock().unwrap() = None;
                inner.dispatch(&FeedEvent::Close);
            }
            Err(e) => {
                warn!(%url, error = %e, "WebSocket connect failed");
                inner.dispatch(&FeedEvent::Error(e.to_string()));
            }
        }

        if inner.is_killed() {
            break;
        }

        inner.set_state(ConnectionState::Offline);
        debug!(delay_ms = reconnect_delay.as_millis() as u64, "Scheduling reconnect");

        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {}
            _ = inner.kill_notify.notified() => {}
        }

        // 타이머 발화 시점에 kill 플래그를 다시 읽는다 (check-then-act 레이스 차단)
        if inner.is_killed() {
            break;
        }
    }

    inner.set_state(ConnectionState::Killed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_core::ClientConfig;

    fn config() -> ClientConfig {
        ClientConfig {
            url: "ws://127.0.0.1:9".to_string(),
            reconnect_delay_ms: 50,
        }
    }

    #[test]
    fn test_listener_registry() {
        let conn = ResilientConnection::new(&config());

        let open_id = conn.add_listener(EventKind::Open, |_| {});
        let message_id = conn.add_listener(EventKind::Message, |_| {});
        assert_eq!(conn.listener_count(), 2);

        assert!(conn.remove_listener(open_id));
        assert_eq!(conn.listener_count(), 1);

        // 제거는 멱등
        assert!(!conn.remove_listener(open_id));
        assert!(conn.remove_listener(message_id));
        assert_eq!(conn.listener_count(), 0);
    }

    #[test]
    fn test_send_fails_when_not_open() {
        let conn = ResilientConnection::new(&config());

        let result = conn.send(ControlKind::Subscribe, Topic::Users, Some("{}"));
        assert!(matches!(result, Err(ClientError::NotConnected)));
    }

    #[tokio::test]
    async fn test_connect_after_kill_is_an_error() {
        let conn = ResilientConnection::new(&config());

        conn.kill();
        assert!(conn.has_been_killed());
        assert_eq!(conn.state(), ConnectionState::Killed);

        assert!(matches!(conn.connect(), Err(ClientError::Killed)));
    }

    #[test]
    fn test_kill_is_idempotent() {
        let conn = ResilientConnection::new(&config());

        conn.kill();
        conn.kill();
        assert_eq!(conn.state(), ConnectionState::Killed);
    }

    #[test]
    fn test_dispatch_filters_by_kind() {
        use std::sync::atomic::AtomicUsize;

        let conn = ResilientConnection::new(&config());
        let open_count = Arc::new(AtomicUsize::new(0));
        let close_count = Arc::new(AtomicUsize::new(0));

        {
            let open_count = open_count.clone();
            conn.add_listener(EventKind::Open, move |_| {
                open_count.fetch_add(1, Ordering::SeqCst);
            });
        }
        {
            let close_count = close_count.clone();
            conn.add_listener(EventKind::Close, move |_| {
                close_count.fetch_add(1, Ordering::SeqCst);
            });
        }

        conn.inner.dispatch(&FeedEvent::Open);
        conn.inner.dispatch(&FeedEvent::Open);
        conn.inner.dispatch(&FeedEvent::Close);

        assert_eq!(open_count.load(Ordering::SeqCst), 2);
        assert_eq!(close_count.load(Ordering::SeqCst), 1);
    }
}
