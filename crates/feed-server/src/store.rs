//! 인메모리 시뮬레이션 스토어.
//!
//! 이벤트 엔진만 변이시키고, 쿼리 리졸버는 읽기만 하는 엔티티 저장소입니다.
//! 단일 쓰기(엔진 틱) / 다중 읽기(리졸버) 규율은 `tokio::sync::RwLock`으로
//! 보장되며, 읽기는 항상 일관된 스냅샷을 관찰합니다.

use std::sync::Arc;

use rand::Rng;
use tokio::sync::RwLock;

use feed_core::{Message, Post, User};

use crate::sample::sample_user;

/// 시뮬레이션 스토어.
///
/// 메시지는 append-only로 전체 이력이 유지되지만 조회되는 것은
/// 항상 가장 최근 메시지 하나입니다. 게시글 컬렉션은 채워지지 않습니다.
#[derive(Debug, Default)]
pub struct SimulatedStore {
    users: Vec<User>,
    posts: Vec<Post>,
    messages: Vec<Message>,
}

impl SimulatedStore {
    /// 빈 스토어 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 샘플 사용자 한 명으로 시드된 스토어 생성.
    pub fn seeded(rng: &mut impl Rng) -> Self {
        let mut store = Self::new();
        store.add_user(sample_user(rng));
        store
    }

    /// 전체 사용자 목록.
    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// 전체 게시글 목록.
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// 가장 최근 메시지. 아직 없으면 `None`.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// 현재 접속 중인 사용자 목록.
    pub fn online_users(&self) -> Vec<&User> {
        self.users.iter().filter(|user| user.online).collect()
    }

    /// 누적 메시지 수.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    // 변이는 이벤트 엔진 액션 전용.

    pub(crate) fn add_user(&mut self, user: User) {
        self.users.push(user);
    }

    pub(crate) fn toggle_online(&mut self, index: usize) -> bool {
        match self.users.get_mut(index) {
            Some(user) => {
                user.online = !user.online;
                true
            }
            None => false,
        }
    }

    pub(crate) fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }
}

/// 공유 가능한 스토어 타입.
pub type SharedStore = Arc<RwLock<SimulatedStore>>;

/// 새로운 공유 스토어 생성.
pub fn shared_store(store: SimulatedStore) -> SharedStore {
    Arc::new(RwLock::new(store))
}
