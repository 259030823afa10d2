//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//! 기본값 → TOML 파일(선택) → `FEED_` 접두사 환경 변수 순서로 적용됩니다.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::FeedResult;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 이벤트 엔진 설정
    #[serde(default)]
    pub engine: EngineConfig,
    /// 클라이언트 설정
    #[serde(default)]
    pub client: ClientConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// `host:port` 형식의 바인딩 주소 반환.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 이벤트 엔진 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// 틱 간격 (밀리초)
    pub tick_interval_ms: u64,
    /// 난수 시드 (재현 가능한 실행용, 없으면 엔트로피 시드)
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2000,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// 틱 간격을 Duration으로 반환.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// 클라이언트 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// 접속할 서버 엔드포인트
    pub url: String,
    /// 재연결 지연 (밀리초)
    pub reconnect_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".to_string(),
            reconnect_delay_ms: 5000,
        }
    }
}

impl ClientConfig {
    /// 재연결 지연을 Duration으로 반환.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없어도 실패하지 않습니다. 환경 변수는 `FEED_` 접두사와
    /// `__` 구분자를 사용합니다 (예: `FEED_SERVER__PORT=9000`).
    pub fn load<P: AsRef<Path>>(path: P) -> FeedResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("FEED")
                    .separator("__")
                    .try_parsing(true),
            );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> FeedResult<Self> {
        Self::load("config/default.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.engine.tick_interval(), Duration::from_millis(2000));
        assert_eq!(config.engine.seed, None);
        assert_eq!(
            config.client.reconnect_delay(),
            Duration::from_millis(5000)
        );
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AppConfig::load("config/does-not-exist.toml").unwrap();
        assert_eq!(config.server.port, 8080);
    }
}
