//! 랜덤 이벤트 엔진.
//!
//! 틱마다 `[0, 99]`에서 정수 하나를 뽑아 가중 액션 테이블을 선언 순서대로
//! 스캔하고, 범위가 일치하는 첫 액션을 시도합니다. 액션이 실제로 스토어를
//! 변이시키면 해당 토픽 하나가 dirty로 표시되고 스캔이 끝납니다.
//! 선행 조건이 맞지 않아 no-op이면 이번 틱은 아무 이벤트도 만들지 않습니다.
//!
//! "첫 일치 승리, 틱당 최대 한 번의 변이"는 구현 디테일이 아니라 의도된
//! 타이브레이크 정책입니다. 푸시 볼륨이 틱당 토픽 하나로 바운드되므로
//! 클라이언트 병합 로직이 단순해집니다.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use feed_core::{Message, Topic};

use crate::sample::{sample_sentence, sample_user};
use crate::store::SimulatedStore;

/// 액션의 효과 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    /// 새 사용자 생성
    CreateUser,
    /// 기존 사용자의 online 플래그 토글
    ToggleOnline,
    /// 접속 사용자 2명 이상일 때 메시지 추가
    AppendMessage,
}

/// 가중 액션 테이블 항목.
#[derive(Debug, Clone, Copy)]
struct Action {
    /// 포함 범위 하한
    lo: u8,
    /// 포함 범위 상한
    hi: u8,
    /// 성공 시 dirty 표시되는 토픽
    topic: Topic,
    kind: ActionKind,
}

/// 선언 순서대로 스캔되는 액션 테이블.
///
/// 범위는 서로 겹치지 않으며, 70-99 구간은 의도적으로 비어 있습니다
/// (해당 틱은 아무 일도 하지 않음).
const ACTIONS: [Action; 3] = [
    Action {
        lo: 0,
        hi: 4,
        topic: Topic::Users,
        kind: ActionKind::CreateUser,
    },
    Action {
        lo: 5,
        hi: 14,
        topic: Topic::Users,
        kind: ActionKind::ToggleOnline,
    },
    Action {
        lo: 15,
        hi: 69,
        topic: Topic::LastMessage,
        kind: ActionKind::AppendMessage,
    },
];

/// 랜덤 이벤트 엔진.
///
/// 연결마다 하나씩 소유하며, 시드를 지정하면 추첨 순서가 재현됩니다.
pub struct EventEngine {
    rng: SmallRng,
}

impl EventEngine {
    /// 새로운 이벤트 엔진 생성.
    ///
    /// `seed`가 `None`이면 엔트로피에서 시드합니다.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self { rng }
    }

    /// 한 틱 실행: 추첨 후 액션 적용.
    ///
    /// 변이가 일어났으면 dirty 토픽을 반환합니다.
    pub fn tick(&mut self, store: &mut SimulatedStore) -> Option<Topic> {
        let draw = self.rng.gen_range(0..100u8);
        self.apply(draw, store)
    }

    /// 고정된 추첨 값으로 액션 적용.
    ///
    /// 테스트에서 추첨 순서를 시뮬레이션할 수 있는 결정적 진입점입니다.
    pub fn apply(&mut self, draw: u8, store: &mut SimulatedStore) -> Option<Topic> {
        for action in &ACTIONS {
            if action.lo <= draw && draw <= action.hi {
                // 첫 일치에서 스캔 종료: 효과가 no-op이어도 다음 액션으로
                // 넘어가지 않는다
                return self.run_effect(action.kind, store).then_some(action.topic);
            }
        }
        None
    }

    /// 액션 효과 실행. 스토어가 실제로 변이되었으면 true.
    fn run_effect(&mut self, kind: ActionKind, store: &mut SimulatedStore) -> bool {
        match kind {
            ActionKind::CreateUser => {
                store.add_user(sample_user(&mut self.rng));
                true
            }
            ActionKind::ToggleOnline => {
                if store.users().is_empty() {
                    return false;
                }
                let index = self.rng.gen_range(0..store.users().len());
                store.toggle_online(index)
            }
            ActionKind::AppendMessage => {
                let online: Vec<_> = store.online_users().into_iter().cloned().collect();
                if online.len() < 2 {
                    return false;
                }
                let author = online[self.rng.gen_range(0..online.len())].clone();
                let message = Message {
                    content: sample_sentence(&mut self.rng),
                    user: author,
                };
                store.push_message(message);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_core::User;
    use uuid::Uuid;

    fn engine() -> EventEngine {
        EventEngine::new(Some(99))
    }

    fn user(name: &str, online: bool) -> User {
        User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name),
            avatar: "https://avatars.example.com/u/1.png".to_string(),
            online,
        }
    }

    #[test]
    fn test_draw_creates_user() {
        let mut store = SimulatedStore::new();

        let dirty = engine().apply(2, &mut store);

        assert_eq!(dirty, Some(Topic::Users));
        assert_eq!(store.users().len(), 1);
    }

    #[test]
    fn test_draw_toggles_existing_user() {
        let mut store = SimulatedStore::new();
        store.add_user(user("mina", false));

        let dirty = engine().apply(10, &mut store);

        assert_eq!(dirty, Some(Topic::Users));
        assert!(store.users()[0].online);
    }

    #[test]
    fn test_toggle_with_no_users_is_noop() {
        let mut store = SimulatedStore::new();

        let dirty = engine().apply(10, &mut store);

        assert_eq!(dirty, None);
        assert!(store.users().is_empty());
    }

    #[test]
    fn test_message_requires_two_online_users() {
        let mut store = SimulatedStore::new();
        store.add_user(user("mina", true));
        store.add_user(user("jun", false));

        let dirty = engine().apply(40, &mut store);

        // no-op: 스토어 변이도, dirty 토픽도 없어야 한다
        assert_eq!(dirty, None);
        assert_eq!(store.message_count(), 0);
    }

    #[test]
    fn test_message_appended_when_two_online() {
        let mut store = SimulatedStore::new();
        store.add_user(user("mina", true));
        store.add_user(user("jun", true));

        let dirty = engine().apply(40, &mut store);

        assert_eq!(dirty, Some(Topic::LastMessage));
        assert_eq!(store.message_count(), 1);

        let message = store.last_message().unwrap();
        assert!(message.user.online);
    }

    #[test]
    fn test_draw_outside_table_does_nothing() {
        let mut store = SimulatedStore::new();
        store.add_user(user("mina", true));

        assert_eq!(engine().apply(70, &mut store), None);
        assert_eq!(engine().apply(99, &mut store), None);
        assert_eq!(store.users().len(), 1);
        assert_eq!(store.message_count(), 0);
    }

    #[test]
    fn test_range_boundaries() {
        // 생성/토글 범위 경계
        let mut store = SimulatedStore::new();
        assert_eq!(engine().apply(0, &mut store), Some(Topic::Users));
        assert_eq!(engine().apply(4, &mut store), Some(Topic::Users));
        assert_eq!(store.users().len(), 2);
        assert_eq!(engine().apply(5, &mut store), Some(Topic::Users));
        assert_eq!(engine().apply(14, &mut store), Some(Topic::Users));

        // 메시지 범위 경계 (접속 사용자 2명 보장)
        let mut store = SimulatedStore::new();
        store.add_user(user("mina", true));
        store.add_user(user("jun", true));
        assert_eq!(engine().apply(15, &mut store), Some(Topic::LastMessage));
        assert_eq!(engine().apply(69, &mut store), Some(Topic::LastMessage));
        assert_eq!(store.message_count(), 2);
    }

    #[test]
    fn test_seeded_engine_is_reproducible() {
        let mut store_a = SimulatedStore::new();
        let mut store_b = SimulatedStore::new();

        let mut engine_a = EventEngine::new(Some(7));
        let mut engine_b = EventEngine::new(Some(7));

        let dirty_a: Vec<_> = (0..20).map(|_| engine_a.tick(&mut store_a)).collect();
        let dirty_b: Vec<_> = (0..20).map(|_| engine_b.tick(&mut store_b)).collect();

        assert_eq!(dirty_a, dirty_b);
        assert_eq!(store_a.users().len(), store_b.users().len());
    }
}
