//! 라이브 피드 데모 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 기본 엔드포인트(ws://127.0.0.1:8080/ws)에 접속해 데모 구독 바인딩
//! feed watch
//!
//! # 다른 서버에 접속
//! feed watch -u ws://10.0.0.5:9000/ws
//!
//! # 유효 설정 확인
//! feed config
//! ```

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use feed_client::{BindingSpec, EventKind, FeedEvent, ResilientConnection, SubscriptionBinding};
use feed_core::{init_logging, AppConfig, LogConfig, Topic};

#[derive(Parser)]
#[command(name = "feed")]
#[command(about = "Live feed demo CLI - WebSocket 구독 프로토콜 데모 클라이언트", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 서버에 접속해 데모 구독을 바인딩하고 푸시를 출력
    Watch {
        /// 서버 WebSocket URL (기본: 설정 파일/환경 변수)
        #[arg(short, long)]
        url: Option<String>,

        /// 재연결 지연 (밀리초)
        #[arg(long)]
        reconnect_delay_ms: Option<u64>,
    },

    /// 유효 설정을 JSON으로 출력
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = AppConfig::load_default()?;
    init_logging(LogConfig::from(&config.logging))?;

    match cli.command {
        Commands::Watch {
            url,
            reconnect_delay_ms,
        } => {
            if let Some(url) = url {
                config.client.url = url;
            }
            if let Some(delay) = reconnect_delay_ms {
                config.client.reconnect_delay_ms = delay;
            }
            watch(&config).await
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// 데모 구독 세트를 바인딩하고 Ctrl+C까지 푸시를 출력.
///
/// 원래 데모 UI가 쓰는 세 가지 바인딩을 그대로 재현합니다:
/// 사용자 목록(교체 병합, prefetch), 메시지 이력(누적 병합, prefetch),
/// 게시글 목록(교체 병합, prefetch 없음).
async fn watch(config: &AppConfig) -> anyhow::Result<()> {
    info!(url = %config.client.url, "Connecting to feed server");

    let conn = Arc::new(ResilientConnection::new(&config.client));

    // 수신 봉투를 사람이 읽을 수 있게 출력하는 리스너
    conn.add_listener(EventKind::Message, |event| {
        if let FeedEvent::Message(envelope) = event {
            match envelope.query_payload() {
                Ok(payload) if payload.has_errors() => {
                    println!("[{}] errors: {:?}", envelope.name, payload.errors);
                }
                Ok(payload) => {
                    let data = payload.data.unwrap_or(serde_json::Value::Null);
                    println!("[{}] {}", envelope.name, data);
                }
                Err(_) => println!("[{}] <malformed payload>", envelope.name),
            }
        }
    });
    conn.add_listener(EventKind::Open, |_| println!("-- connected --"));
    conn.add_listener(EventKind::Close, |_| println!("-- disconnected --"));

    let users = SubscriptionBinding::bind(
        &conn,
        BindingSpec::new(
            Topic::Users,
            "{ getUsers { name email avatar online } }",
            true,
            |_previous, data| data["getUsers"].clone(),
        ),
    );

    let messages = SubscriptionBinding::bind(
        &conn,
        BindingSpec::new(
            Topic::LastMessage,
            "{ getLastMessage { content user { name avatar } } }",
            true,
            |previous, data| {
                let mut list = previous.cloned().unwrap_or_else(|| json!([]));
                let message = &data["getLastMessage"];
                if !message.is_null() {
                    if let Some(list) = list.as_array_mut() {
                        list.push(message.clone());
                    }
                }
                list
            },
        ),
    );

    let posts = SubscriptionBinding::bind(
        &conn,
        BindingSpec::new(Topic::Posts, "{ getPosts { title } }", false, |_previous, data| {
            data["getPosts"].clone()
        }),
    );

    conn.connect()?;

    tokio::signal::ctrl_c().await?;
    println!();
    info!("Shutting down");

    // 구독 해제 → 리스너 해제 → 연결 종료 순서로 정리
    let message_count = messages
        .current()
        .and_then(|v| v.as_array().map(|a| a.len()))
        .unwrap_or(0);
    let user_count = users
        .current()
        .and_then(|v| v.as_array().map(|a| a.len()))
        .unwrap_or(0);

    users.unbind();
    messages.unbind();
    posts.unbind();
    conn.kill();

    println!("seen: {} users, {} messages", user_count, message_count);

    Ok(())
}
