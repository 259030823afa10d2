//! 클라이언트 에러 타입.

use thiserror::Error;

use feed_core::CodecError;

/// 클라이언트 관련 에러.
#[derive(Debug, Error)]
pub enum ClientError {
    /// 소켓이 Open 상태가 아닌데 전송을 시도함
    #[error("Not connected")]
    NotConnected,

    /// kill() 이후의 연결 시도
    #[error("Connection has been killed")]
    Killed,

    /// 와이어 코덱 에러
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// 클라이언트 작업을 위한 Result 타입.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_conversion() {
        let err: ClientError = CodecError::Decode("truncated".to_string()).into();
        assert!(matches!(err, ClientError::Codec(_)));
    }
}
