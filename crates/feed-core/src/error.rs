//! 피드 시스템의 에러 타입.
//!
//! 이 모듈은 피드 시스템 전반에서 사용되는 공통 에러 타입을 정의합니다.
//! 클라이언트 전용 에러는 클라이언트 크레이트에서 별도로 정의됩니다.

use thiserror::Error;

use crate::wire::CodecError;

/// 핵심 피드 에러.
#[derive(Debug, Error)]
pub enum FeedError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 와이어 코덱 에러
    #[error("와이어 코덱 에러: {0}")]
    Codec(#[from] CodecError),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 피드 작업을 위한 Result 타입.
pub type FeedResult<T> = Result<T, FeedError>;

impl FeedError {
    /// 연결을 유지한 채 복구 가능한 에러인지 확인합니다.
    ///
    /// 코덱 에러는 해당 메시지만 버리면 되므로 복구 가능합니다.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FeedError::Codec(_))
    }
}

impl From<config::ConfigError> for FeedError {
    fn from(err: config::ConfigError) -> Self {
        FeedError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_recoverable() {
        let codec_err = FeedError::Codec(CodecError::Decode("truncated".to_string()));
        assert!(codec_err.is_recoverable());

        let config_err = FeedError::Config("missing file".to_string());
        assert!(!config_err.is_recoverable());
    }

    #[test]
    fn test_codec_error_conversion() {
        let err: FeedError = CodecError::Decode("bad marker".to_string()).into();
        assert!(matches!(err, FeedError::Codec(_)));
    }
}
