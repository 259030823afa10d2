//! 도메인 엔티티 및 토픽 정의.
//!
//! 시뮬레이션 스토어에 저장되는 엔티티와 구독 가능한 토픽을 정의합니다.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 채팅 사용자.
///
/// 이벤트 엔진만 생성하며, 생성 이후에는 `online` 플래그만 변경됩니다.
/// 삭제되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// 사용자 ID
    pub id: Uuid,
    /// 표시 이름
    pub name: String,
    /// 이메일 주소
    pub email: String,
    /// 아바타 이미지 URL
    pub avatar: String,
    /// 접속 여부
    pub online: bool,
}

/// 채팅 메시지.
///
/// 작성자는 작성 시점의 값 스냅샷으로 보관됩니다 (라이브 참조 아님).
/// append-only이며 수정/삭제되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// 본문
    pub content: String,
    /// 작성자 스냅샷
    pub user: User,
}

/// 게시글.
///
/// 모델에는 선언되어 있지만 이벤트 엔진이 채우지 않습니다.
/// 데이터 소스가 없는 토픽도 유효한 토픽이므로 프로토콜 완결성을 위해 유지합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// 제목
    pub title: String,
    /// 작성자 스냅샷
    pub user: User,
}

/// 구독 가능한 토픽.
///
/// 토픽은 컴파일 타임에 고정되며 생성/삭제되지 않습니다.
/// 와이어 이름은 클라이언트와 서버가 동일한 정적 집합에서 파생하므로
/// 양쪽이 어긋날 수 없습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// 전체 사용자 목록
    Users,
    /// 게시글 목록 (영구적으로 비어 있음)
    Posts,
    /// 가장 최근 메시지
    LastMessage,
}

impl Topic {
    /// 알려진 토픽 전체.
    pub const ALL: [Topic; 3] = [Topic::Users, Topic::Posts, Topic::LastMessage];

    /// 와이어 이름에서 토픽 파싱.
    ///
    /// # 형식
    ///
    /// - `getUsers` - 사용자 목록
    /// - `getPosts` - 게시글 목록
    /// - `getLastMessage` - 최근 메시지
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "getUsers" => Some(Topic::Users),
            "getPosts" => Some(Topic::Posts),
            "getLastMessage" => Some(Topic::LastMessage),
            _ => None,
        }
    }

    /// 토픽의 와이어 이름 반환.
    pub fn name(&self) -> &'static str {
        match self {
            Topic::Users => "getUsers",
            Topic::Posts => "getPosts",
            Topic::LastMessage => "getLastMessage",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_from_name() {
        assert_eq!(Topic::from_name("getUsers"), Some(Topic::Users));
        assert_eq!(Topic::from_name("getPosts"), Some(Topic::Posts));
        assert_eq!(Topic::from_name("getLastMessage"), Some(Topic::LastMessage));
        assert_eq!(Topic::from_name("getUnknown"), None);
        assert_eq!(Topic::from_name(""), None);
    }

    #[test]
    fn test_topic_name_round_trip() {
        for topic in Topic::ALL {
            assert_eq!(Topic::from_name(topic.name()), Some(topic));
        }
    }

    #[test]
    fn test_user_serialization() {
        let user = User {
            id: Uuid::new_v4(),
            name: "mina.park".to_string(),
            email: "mina.park@example.com".to_string(),
            avatar: "https://avatars.example.com/u/1.png".to_string(),
            online: true,
        };

        let json = serde_json::to_string(&user).unwrap();
        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(user, back);
    }
}
