//! 쿼리 리졸버.
//!
//! 클라이언트가 보내는 선택 집합 형태의 쿼리 텍스트를 현재 스토어 상태에
//! 대해 평가합니다. 스토어 상태와 쿼리 텍스트만의 순수 함수이며 부수 효과가
//! 없습니다. 잘못된 쿼리는 구조화된 에러 payload로 보고될 뿐 세션을
//! 중단시키지 않습니다.
//!
//! # 쿼리 형식
//!
//! ```text
//! { getUsers { name email avatar online } }
//! { getLastMessage { content user { name avatar } } }
//! ```

use serde_json::{Map, Value};

use feed_core::{Message, Post, QueryPayload, Topic, User};

use crate::store::SimulatedStore;

/// 파싱된 선택 필드.
#[derive(Debug, Clone, PartialEq)]
struct Field {
    name: String,
    children: Vec<Field>,
}

/// 쿼리 토큰.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    LBrace,
    RBrace,
    Ident(String),
}

/// 토픽 쿼리를 현재 스토어 상태에 대해 평가.
///
/// 성공 시 루트 필드 이름을 키로 하는 `data` 객체를, 실패 시 `errors`
/// 목록을 담은 payload를 반환합니다.
pub fn resolve(store: &SimulatedStore, query: &str) -> QueryPayload {
    let root = match parse_query(query) {
        Ok(root) => root,
        Err(error) => return QueryPayload::from_errors(vec![error]),
    };

    let Some(topic) = Topic::from_name(&root.name) else {
        return QueryPayload::from_errors(vec![format!(
            "Cannot query field \"{}\" on type \"Query\"",
            root.name
        )]);
    };

    if root.children.is_empty() {
        return QueryPayload::from_errors(vec![format!(
            "Field \"{}\" must have a selection of subfields",
            root.name
        )]);
    }

    let projected = match topic {
        Topic::Users => project_users(store.users(), &root.children),
        Topic::Posts => project_posts(store.posts(), &root.children),
        Topic::LastMessage => project_last_message(store.last_message(), &root.children),
    };

    match projected {
        Ok(value) => {
            let mut data = Map::new();
            data.insert(root.name, value);
            QueryPayload::from_data(Value::Object(data))
        }
        Err(error) => QueryPayload::from_errors(vec![error]),
    }
}

// ==================== 파싱 ====================

fn tokenize(query: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = query.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            '{' => {
                chars.next();
                tokens.push(Token::LBrace);
            }
            '}' => {
                chars.next();
                tokens.push(Token::RBrace);
            }
            c if c.is_whitespace() || c == ',' => {
                chars.next();
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(format!("Syntax error: unexpected character \"{}\"", other));
            }
        }
    }

    Ok(tokens)
}

/// 쿼리 텍스트를 루트 필드 하나로 파싱.
fn parse_query(query: &str) -> Result<Field, String> {
    let tokens = tokenize(query)?;
    let mut position = 0;

    expect(&tokens, &mut position, Token::LBrace)?;
    let mut fields = parse_fields(&tokens, &mut position)?;
    expect(&tokens, &mut position, Token::RBrace)?;

    if position != tokens.len() {
        return Err("Syntax error: trailing tokens after query".to_string());
    }

    match (fields.len(), fields.pop()) {
        (1, Some(root)) => Ok(root),
        _ => Err("Query must select exactly one root field".to_string()),
    }
}

/// 중괄호 내부의 필드 나열 파싱. 중첩 선택 집합을 허용합니다.
fn parse_fields(tokens: &[Token], position: &mut usize) -> Result<Vec<Field>, String> {
    let mut fields = Vec::new();

    while let Some(Token::Ident(name)) = tokens.get(*position) {
        *position += 1;
        let mut children = Vec::new();

        if tokens.get(*position) == Some(&Token::LBrace) {
            *position += 1;
            children = parse_fields(tokens, position)?;
            expect(tokens, position, Token::RBrace)?;
        }

        fields.push(Field {
            name: name.clone(),
            children,
        });
    }

    Ok(fields)
}

fn expect(tokens: &[Token], position: &mut usize, expected: Token) -> Result<(), String> {
    if tokens.get(*position) == Some(&expected) {
        *position += 1;
        Ok(())
    } else {
        Err("Syntax error in query".to_string())
    }
}

// ==================== 프로젝션 ====================

fn project_users(users: &[User], selection: &[Field]) -> Result<Value, String> {
    let projected = users
        .iter()
        .map(|user| project_user(user, selection))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(projected))
}

fn project_posts(posts: &[Post], selection: &[Field]) -> Result<Value, String> {
    let projected = posts
        .iter()
        .map(|post| project_post(post, selection))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(projected))
}

fn project_last_message(message: Option<&Message>, selection: &[Field]) -> Result<Value, String> {
    // 메시지가 아직 없으면 null이 정의된 빈 값이다
    match message {
        Some(message) => project_message(message, selection),
        None => {
            // 선택 필드 유효성은 데이터가 없어도 검증한다
            for field in selection {
                if !matches!(field.name.as_str(), "content" | "user") {
                    return Err(unknown_field(&field.name, "Message"));
                }
            }
            Ok(Value::Null)
        }
    }
}

fn project_user(user: &User, selection: &[Field]) -> Result<Value, String> {
    let mut object = Map::new();
    for field in selection {
        if !field.children.is_empty() {
            return Err(format!(
                "Field \"{}\" of type \"User\" must not have a selection",
                field.name
            ));
        }
        let value = match field.name.as_str() {
            "name" => Value::String(user.name.clone()),
            "email" => Value::String(user.email.clone()),
            "avatar" => Value::String(user.avatar.clone()),
            "online" => Value::Bool(user.online),
            other => return Err(unknown_field(other, "User")),
        };
        object.insert(field.name.clone(), value);
    }
    Ok(Value::Object(object))
}

fn project_post(post: &Post, selection: &[Field]) -> Result<Value, String> {
    let mut object = Map::new();
    for field in selection {
        let value = match field.name.as_str() {
            "title" => Value::String(post.title.clone()),
            "user" => nested_user(&post.user, field, "Post")?,
            other => return Err(unknown_field(other, "Post")),
        };
        object.insert(field.name.clone(), value);
    }
    Ok(Value::Object(object))
}

fn project_message(message: &Message, selection: &[Field]) -> Result<Value, String> {
    let mut object = Map::new();
    for field in selection {
        let value = match field.name.as_str() {
            "content" => Value::String(message.content.clone()),
            "user" => nested_user(&message.user, field, "Message")?,
            other => return Err(unknown_field(other, "Message")),
        };
        object.insert(field.name.clone(), value);
    }
    Ok(Value::Object(object))
}

fn nested_user(user: &User, field: &Field, parent: &str) -> Result<Value, String> {
    if field.children.is_empty() {
        return Err(format!(
            "Field \"user\" of type \"{}\" must have a selection of subfields",
            parent
        ));
    }
    project_user(user, &field.children)
}

fn unknown_field(name: &str, parent: &str) -> String {
    format!("Cannot query field \"{}\" on type \"{}\"", name, parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_core::Message;
    use serde_json::json;
    use uuid::Uuid;

    fn user(name: &str, online: bool) -> User {
        User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name),
            avatar: format!("https://avatars.example.com/u/{}.png", name.len()),
            online,
        }
    }

    fn store_with_users() -> SimulatedStore {
        let mut store = SimulatedStore::new();
        store.add_user(user("mina", true));
        store.add_user(user("jun", false));
        store
    }

    #[test]
    fn test_resolve_users_selected_fields_only() {
        let store = store_with_users();

        let payload = resolve(&store, "{ getUsers { name online } }");

        assert!(!payload.has_errors());
        let data = payload.data.unwrap();
        let users = data["getUsers"].as_array().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0]["name"], "mina");
        assert_eq!(users[0]["online"], true);
        // 선택하지 않은 필드는 포함되지 않는다
        assert!(users[0].get("email").is_none());
    }

    #[test]
    fn test_resolve_posts_empty_topic() {
        let store = store_with_users();

        let payload = resolve(&store, "{ getPosts { title } }");

        assert!(!payload.has_errors());
        assert_eq!(payload.data.unwrap()["getPosts"], json!([]));
    }

    #[test]
    fn test_resolve_last_message_with_nested_user() {
        let mut store = store_with_users();
        let author = store.users()[0].clone();
        store.push_message(Message {
            content: "hello".to_string(),
            user: author.clone(),
        });

        let payload = resolve(
            &store,
            "{ getLastMessage { content user { name avatar } } }",
        );

        assert!(!payload.has_errors());
        let data = payload.data.unwrap();
        assert_eq!(data["getLastMessage"]["content"], "hello");
        assert_eq!(data["getLastMessage"]["user"]["name"], author.name);
        assert!(data["getLastMessage"]["user"].get("email").is_none());
    }

    #[test]
    fn test_resolve_last_message_empty_is_null() {
        let store = SimulatedStore::new();

        let payload = resolve(&store, "{ getLastMessage { content user { name } } }");

        assert!(!payload.has_errors());
        assert_eq!(payload.data.unwrap()["getLastMessage"], Value::Null);
    }

    #[test]
    fn test_unknown_root_field_is_error() {
        let payload = resolve(&SimulatedStore::new(), "{ getStuff { id } }");

        assert!(payload.has_errors());
        assert!(payload.data.is_none());
        assert!(payload.errors.unwrap()[0].contains("getStuff"));
    }

    #[test]
    fn test_unknown_entity_field_is_error() {
        let payload = resolve(&store_with_users(), "{ getUsers { name password } }");

        assert!(payload.has_errors());
        assert!(payload.errors.unwrap()[0].contains("password"));
    }

    #[test]
    fn test_malformed_query_is_error_not_panic() {
        for query in ["", "{", "getUsers", "{ getUsers { name }", "{ % }"] {
            let payload = resolve(&SimulatedStore::new(), query);
            assert!(payload.has_errors(), "query {:?} should error", query);
        }
    }

    #[test]
    fn test_root_without_selection_is_error() {
        let payload = resolve(&store_with_users(), "{ getUsers }");
        assert!(payload.has_errors());
    }

    #[test]
    fn test_whitespace_and_commas_tolerated() {
        let payload = resolve(
            &store_with_users(),
            "{\n  getUsers {\n    name,\n    email,\n  }\n}\n",
        );
        assert!(!payload.has_errors());
    }
}
