//! 연결 세션 및 구독 레지스트리.
//!
//! 세션은 수락된 연결마다 하나씩 만들어지며, 그 연결의 구독 레지스트리와
//! 이벤트 엔진을 소유합니다. 레지스트리는 프로세스 전역 테이블이 아니라
//! 세션에 귀속된 객체이므로 연결 종료 시 함께 버려집니다.

use std::collections::HashMap;

use tracing::{debug, warn};

use feed_core::{Envelope, FeedResult, OperationSet, Topic};

use crate::engine::EventEngine;
use crate::resolver;
use crate::store::SharedStore;

/// 단일 토픽 구독.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    /// 구독 토픽
    pub topic: Topic,
    /// 구독 시점에 전달된 쿼리 텍스트
    pub query: String,
    /// 구독 시 즉시 조회를 함께 요청했는지 여부
    pub prefetch: bool,
}

/// 연결 하나의 구독 레지스트리.
///
/// 토픽당 구독은 최대 하나이며, 같은 토픽으로 다시 구독하면 나중 쿼리가
/// 이전 것을 대체합니다.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<Topic, Subscription>,
}

impl SubscriptionRegistry {
    /// 빈 레지스트리 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 구독 등록 또는 교체.
    pub fn upsert(&mut self, topic: Topic, query: String, prefetch: bool) {
        self.entries.insert(
            topic,
            Subscription {
                topic,
                query,
                prefetch,
            },
        );
    }

    /// 구독 제거. 구독 중이 아니면 no-op.
    pub fn remove(&mut self, topic: Topic) -> Option<Subscription> {
        self.entries.remove(&topic)
    }

    /// 토픽의 구독 조회.
    pub fn get(&self, topic: Topic) -> Option<&Subscription> {
        self.entries.get(&topic)
    }

    /// 구독 중인 토픽인지 확인.
    pub fn contains(&self, topic: Topic) -> bool {
        self.entries.contains_key(&topic)
    }

    /// 활성 구독 수.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 구독이 없는지 확인.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 연결 세션.
///
/// 인바운드 컨트롤 메시지를 레지스트리에 반영하고, 틱마다 dirty 토픽의
/// 구독 쿼리를 리졸브해 푸시할 데이터 봉투를 만들어 냅니다.
pub struct ConnectionSession {
    id: String,
    registry: SubscriptionRegistry,
    store: SharedStore,
    engine: EventEngine,
}

impl ConnectionSession {
    /// 새로운 세션 생성.
    pub fn new(id: impl Into<String>, store: SharedStore, engine: EventEngine) -> Self {
        Self {
            id: id.into(),
            registry: SubscriptionRegistry::new(),
            store,
            engine,
        }
    }

    /// 세션 ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 구독 레지스트리 접근.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// 디코딩된 봉투 하나 처리.
    ///
    /// 태그 집합을 분해해 와이어상의 태그 순서와 무관하게 고정 순서로
    /// 적용합니다: 구독 등록 → 즉시 조회 → 구독 해제. 결합된
    /// `subscription+fetch`는 항상 등록이 조회보다 먼저 일어나므로 두 단계
    /// 사이에 엔진 틱이 끼어들어도 안전합니다.
    ///
    /// 즉시 조회가 요청된 경우 푸시할 데이터 봉투를 반환합니다.
    pub async fn handle_envelope(&mut self, envelope: &Envelope) -> FeedResult<Option<Envelope>> {
        let ops = OperationSet::parse(&envelope.kind);
        if ops.is_empty() {
            warn!(
                session_id = %self.id,
                kind = %envelope.kind,
                "Ignoring envelope with no recognized operation tags"
            );
            return Ok(None);
        }

        let Some(topic) = Topic::from_name(&envelope.name) else {
            warn!(
                session_id = %self.id,
                name = %envelope.name,
                "Ignoring envelope for unknown topic"
            );
            return Ok(None);
        };

        let mut push = None;

        if ops.subscribe {
            let query = envelope.query_text()?;
            debug!(session_id = %self.id, %topic, "New subscription");
            self.registry.upsert(topic, query, ops.fetch);
        }

        if ops.fetch {
            debug!(session_id = %self.id, %topic, "Prefetching");
            let query = envelope.query_text()?;
            let store = self.store.read().await;
            let payload = resolver::resolve(&store, &query);
            push = Some(Envelope::data(topic, &payload)?);
        }

        if ops.unsubscribe {
            debug!(session_id = %self.id, %topic, "Removing subscription");
            self.registry.remove(topic);
        }

        Ok(push)
    }

    /// 엔진 틱 하나 실행.
    ///
    /// 이번 틱에 dirty가 된 토픽을 이 세션이 구독 중이면 푸시할 데이터
    /// 봉투를 반환합니다. 틱당 dirty 토픽은 최대 하나이므로 세션당 틱당
    /// 푸시도 최대 하나입니다.
    pub async fn handle_tick(&mut self) -> FeedResult<Option<Envelope>> {
        let dirty = {
            let mut store = self.store.write().await;
            self.engine.tick(&mut store)
        };

        match dirty {
            Some(topic) => self.push_for(topic).await,
            None => Ok(None),
        }
    }

    /// 토픽이 구독 중이면 저장된 쿼리를 리졸브해 데이터 봉투 생성.
    async fn push_for(&self, topic: Topic) -> FeedResult<Option<Envelope>> {
        let Some(subscription) = self.registry.get(topic) else {
            return Ok(None);
        };

        let store = self.store.read().await;
        let payload = resolver::resolve(&store, &subscription.query);
        Ok(Some(Envelope::data(topic, &payload)?))
    }
}
