//! 구독 바인딩.
//!
//! 컴포넌트의 데이터 요구를 토픽 이름, 쿼리 텍스트, prefetch 플래그,
//! 병합 함수의 선언으로 기술합니다. 바인딩은 연결이 열릴 때마다 (재연결
//! 포함) 스스로 구독을 재전송하므로, 연결 계층의 프로토콜 인지 없이
//! 투명한 재구독이 이루어집니다.
//!
//! 성공한 구독은 해제와 정확히 쌍을 이룹니다: 바인딩 해제(또는 drop)
//! 시점에 같은 연결로 unsubscribe 컨트롤 메시지를 한 번 보냅니다.

use std::sync::{Arc, RwLock, Weak};

use serde_json::Value;
use tracing::{debug, info, warn};

use feed_core::{ControlKind, Topic, TAG_DATA, TAG_MAINTENANCE};

use crate::connection::{EventKind, FeedEvent, ListenerId, ResilientConnection};

/// 병합 함수.
///
/// 이전 payload와 새 결과를 받아 다음 payload를 돌려주는 순수 함수입니다.
/// 순수 교체(사용자 목록)일 수도, 누적(메시지 이력)일 수도 있습니다.
pub type MergeFn = Arc<dyn Fn(Option<&Value>, Value) -> Value + Send + Sync>;

/// 데이터 요구 선언.
#[derive(Clone)]
pub struct BindingSpec {
    /// 구독 토픽
    pub topic: Topic,
    /// 쿼리 텍스트
    pub query: String,
    /// 구독 시 현재 상태를 즉시 조회할지 여부
    pub prefetch: bool,
    /// payload 병합 함수
    pub merge: MergeFn,
}

impl BindingSpec {
    /// 새로운 바인딩 선언 생성.
    pub fn new(
        topic: Topic,
        query: impl Into<String>,
        prefetch: bool,
        merge: impl Fn(Option<&Value>, Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            topic,
            query: query.into(),
            prefetch,
            merge: Arc::new(merge),
        }
    }
}

/// 활성 구독 바인딩.
///
/// 리스너 등록과 구독 전송을 묶어 소유하는 가드 객체입니다.
pub struct SubscriptionBinding {
    conn: Arc<ResilientConnection>,
    topic: Topic,
    payload: Arc<RwLock<Option<Value>>>,
    open_listener: Option<ListenerId>,
    message_listener: Option<ListenerId>,
}

impl SubscriptionBinding {
    /// 바인딩 생성 및 리스너 등록.
    ///
    /// 연결이 이미 열려 있으면 즉시 구독을 전송하고, 아니면 다음 `Open`
    /// 이벤트를 기다립니다.
    pub fn bind(conn: &Arc<ResilientConnection>, spec: BindingSpec) -> Self {
        let BindingSpec {
            topic,
            query,
            prefetch,
            merge,
        } = spec;

        let payload = Arc::new(RwLock::new(None));

        // open 리스너: 모든 (재)연결마다 구독을 다시 보낸다
        let open_listener = {
            let conn: Weak<ResilientConnection> = Arc::downgrade(conn);
            let query = query.clone();
            conn_listener(conn, move |conn| {
                send_subscription(conn, topic, prefetch, &query);
            })
        };
        let open_listener = conn.add_listener(EventKind::Open, open_listener);

        // message 리스너: 토픽이 일치하는 데이터 푸시를 병합
        let message_listener = {
            let payload = payload.clone();
            move |event: &FeedEvent| {
                let FeedEvent::Message(envelope) = event else {
                    return;
                };
                if envelope.name != topic.name() {
                    return;
                }

                if envelope.has_tag(TAG_MAINTENANCE) {
                    // 점검 안내는 에러가 아닌 정보성 상태
                    info!(%topic, "Server maintenance notice");
                    return;
                }
                if !envelope.has_tag(TAG_DATA) {
                    return;
                }

                let body = match envelope.query_payload() {
                    Ok(body) => body,
                    Err(e) => {
                        warn!(%topic, error = %e, "Malformed data payload");
                        return;
                    }
                };

                if body.has_errors() {
                    // 쿼리 에러는 병합을 건너뛰고 기존 payload를 유지한다
                    warn!(%topic, errors = ?body.errors, "Query returned errors, skipping merge");
                    return;
                }
                let Some(data) = body.data else {
                    return;
                };

                let mut guard = payload.write().unwrap();
                let next = merge(guard.as_ref(), data);
                *guard = Some(next);
            }
        };
        let message_listener = conn.add_listener(EventKind::Message, message_listener);

        // 이미 열려 있는 연결에는 지금 바로 구독을 보낸다
        if conn.is_open() {
            send_subscription(conn, topic, prefetch, &query);
        }

        Self {
            conn: conn.clone(),
            topic,
            payload,
            open_listener: Some(open_listener),
            message_listener: Some(message_listener),
        }
    }

    /// 바인딩 토픽.
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// 현재 병합된 payload 스냅샷.
    pub fn current(&self) -> Option<Value> {
        self.payload.read().unwrap().clone()
    }

    /// 바인딩 해제.
    ///
    /// 리스너를 떼고 구독 해제를 한 번 전송합니다 (연결이 닫혀 있으면
    /// best-effort로 건너뜀).
    pub fn unbind(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        let Some(open_id) = self.open_listener.take() else {
            return;
        };
        self.conn.remove_listener(open_id);
        if let Some(message_id) = self.message_listener.take() {
            self.conn.remove_listener(message_id);
        }

        if let Err(e) = self
            .conn
            .send(ControlKind::Unsubscribe, self.topic, None)
        {
            debug!(topic = %self.topic, error = %e, "Unsubscribe not delivered");
        }
    }
}

impl Drop for SubscriptionBinding {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// 구독(또는 prefetch+구독) 컨트롤 메시지 전송.
fn send_subscription(conn: &ResilientConnection, topic: Topic, prefetch: bool, query: &str) {
    let kind = if prefetch {
        ControlKind::SubscribeWithFetch
    } else {
        ControlKind::Subscribe
    };

    debug!(%topic, prefetch, "Sending subscription");
    if let Err(e) = conn.send(kind, topic, Some(query)) {
        warn!(%topic, error = %e, "Failed to send subscription");
    }
}

/// 약한 참조로 연결을 붙잡는 리스너 래퍼.
///
/// 바인딩이 강한 참조를 쥐고 있는 동안만 동작하며, 리스너 레지스트리를
/// 통한 참조 순환을 만들지 않습니다.
fn conn_listener(
    conn: Weak<ResilientConnection>,
    action: impl Fn(&ResilientConnection) + Send + Sync + 'static,
) -> impl Fn(&FeedEvent) + Send + Sync + 'static {
    move |_event| {
        if let Some(conn) = conn.upgrade() {
            action(&conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_core::ClientConfig;

    fn offline_conn() -> Arc<ResilientConnection> {
        Arc::new(ResilientConnection::new(&ClientConfig {
            url: "ws://127.0.0.1:9".to_string(),
            reconnect_delay_ms: 50,
        }))
    }

    fn replace_merge() -> impl Fn(Option<&Value>, Value) -> Value + Send + Sync + 'static {
        |_previous, data| data
    }

    #[test]
    fn test_bind_registers_two_listeners() {
        let conn = offline_conn();
        let binding = SubscriptionBinding::bind(
            &conn,
            BindingSpec::new(Topic::Users, "{ getUsers { name } }", true, replace_merge()),
        );

        assert_eq!(conn.listener_count(), 2);
        assert_eq!(binding.topic(), Topic::Users);
        assert!(binding.current().is_none());

        binding.unbind();
        assert_eq!(conn.listener_count(), 0);
    }

    #[test]
    fn test_drop_detaches_listeners() {
        let conn = offline_conn();
        {
            let _binding = SubscriptionBinding::bind(
                &conn,
                BindingSpec::new(
                    Topic::LastMessage,
                    "{ getLastMessage { content } }",
                    false,
                    replace_merge(),
                ),
            );
            assert_eq!(conn.listener_count(), 2);
        }
        // drop이 unbind와 같은 정리를 수행한다
        assert_eq!(conn.listener_count(), 0);
    }

    #[test]
    fn test_rebinding_does_not_accumulate_listeners() {
        let conn = offline_conn();

        for _ in 0..5 {
            let binding = SubscriptionBinding::bind(
                &conn,
                BindingSpec::new(Topic::Posts, "{ getPosts { title } }", false, replace_merge()),
            );
            binding.unbind();
        }

        assert_eq!(conn.listener_count(), 0);
    }
}
