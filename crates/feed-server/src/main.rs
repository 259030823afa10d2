//! 라이브 피드 WebSocket 서버.
//!
//! 시뮬레이션 스토어와 랜덤 이벤트 엔진 위에서 구독 프로토콜을 서비스하는
//! Axum 기반 WebSocket 서버를 시작합니다.

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use feed_core::{init_logging, AppConfig, LogConfig};
use feed_server::store::{shared_store, SimulatedStore};
use feed_server::websocket::{websocket_router, WsState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    // 설정 로드 및 tracing 초기화
    let config = AppConfig::load_default()?;
    init_logging(LogConfig::from(&config.logging))?;

    info!("Starting feed server...");

    // 스토어는 샘플 사용자 한 명으로 시드
    let store = match config.engine.seed {
        Some(seed) => SimulatedStore::seeded(&mut SmallRng::seed_from_u64(seed)),
        None => SimulatedStore::seeded(&mut rand::thread_rng()),
    };
    let state = WsState::new(shared_store(store), config.engine.clone());

    let app = websocket_router(state).layer(TraceLayer::new_for_http());

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, tick_interval_ms = config.engine.tick_interval_ms, "Server listening");
    info!("WebSocket available at ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료합니다.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
