//! 바이너리 와이어 프로토콜.
//!
//! 소켓으로 교환되는 메시지 봉투와 그 코덱을 정의합니다.
//! 봉투는 MessagePack으로 인코딩되며, 내부 payload(쿼리 문자열 또는
//! 쿼리 결과)는 외부 바이너리 프레이밍과 무관하게 base64 텍스트로
//! 전송됩니다.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Topic;

/// 와이어 코덱 에러.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// 봉투 디코딩 실패 (잘못된 바이트)
    #[error("봉투 디코딩 실패: {0}")]
    Decode(String),
    /// 봉투 인코딩 실패
    #[error("봉투 인코딩 실패: {0}")]
    Encode(String),
    /// payload 인코딩이 유효하지 않음
    #[error("payload가 유효하지 않습니다: {0}")]
    InvalidPayload(String),
}

// ==================== 오퍼레이션 태그 ====================

/// 구독 등록 태그.
pub const TAG_SUBSCRIBE: &str = "subscription";
/// 즉시 조회 태그.
pub const TAG_FETCH: &str = "fetch";
/// 구독 해제 태그.
pub const TAG_UNSUBSCRIBE: &str = "unsubscription";
/// 서버 데이터 푸시 태그.
pub const TAG_DATA: &str = "data";
/// 점검 안내 태그 (정보성, 에러 아님).
pub const TAG_MAINTENANCE: &str = "maintenance";

/// 복합 태그 구분자 (`subscription+fetch`).
pub const TAG_DELIMITER: char = '+';

/// 클라이언트가 전송하는 컨트롤 오퍼레이션.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// 구독만 등록
    Subscribe,
    /// 구독 등록 + 현재 상태 즉시 조회
    SubscribeWithFetch,
    /// 구독 해제
    Unsubscribe,
}

impl ControlKind {
    /// 와이어 태그 문자열 반환.
    pub fn wire_kind(&self) -> &'static str {
        match self {
            ControlKind::Subscribe => "subscription",
            ControlKind::SubscribeWithFetch => "subscription+fetch",
            ControlKind::Unsubscribe => "unsubscription",
        }
    }
}

/// 수신한 봉투의 태그 집합을 분해한 결과.
///
/// 코덱은 태그 문자열을 해석하지 않으며, 분해는 세션 계층의 몫입니다.
/// 알 수 없는 태그는 무시됩니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationSet {
    /// `subscription` 태그 포함 여부
    pub subscribe: bool,
    /// `fetch` 태그 포함 여부
    pub fetch: bool,
    /// `unsubscription` 태그 포함 여부
    pub unsubscribe: bool,
}

impl OperationSet {
    /// 태그 문자열 분해.
    pub fn parse(kind: &str) -> Self {
        let mut set = OperationSet::default();
        for tag in kind.split(TAG_DELIMITER) {
            match tag {
                TAG_SUBSCRIBE => set.subscribe = true,
                TAG_FETCH => set.fetch = true,
                TAG_UNSUBSCRIBE => set.unsubscribe = true,
                _ => {}
            }
        }
        set
    }

    /// 인식된 태그가 하나도 없는지 확인.
    pub fn is_empty(&self) -> bool {
        !(self.subscribe || self.fetch || self.unsubscribe)
    }
}

// ==================== 메시지 봉투 ====================

/// 와이어 메시지 봉투.
///
/// `kind`는 `+`로 결합된 태그 집합이며 코덱에는 불투명합니다.
/// `payload`는 base64 텍스트 (쿼리 문자열 또는 JSON 직렬화된 쿼리 결과)입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// 오퍼레이션 태그 집합
    #[serde(rename = "type")]
    pub kind: String,
    /// 토픽 이름
    pub name: String,
    /// base64 인코딩된 payload
    pub payload: String,
}

impl Envelope {
    /// 컨트롤 봉투 생성 (쿼리 텍스트는 base64로 인코딩).
    pub fn control(kind: ControlKind, topic: Topic, query: &str) -> Self {
        Self {
            kind: kind.wire_kind().to_string(),
            name: topic.name().to_string(),
            payload: encode_payload(query),
        }
    }

    /// 데이터 봉투 생성 (쿼리 결과를 JSON 직렬화 후 base64 인코딩).
    pub fn data(topic: Topic, payload: &QueryPayload) -> Result<Self, CodecError> {
        Ok(Self {
            kind: TAG_DATA.to_string(),
            name: topic.name().to_string(),
            payload: encode_payload(&payload.to_payload_text()?),
        })
    }

    /// MessagePack 바이트로 인코딩.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        rmp_serde::to_vec_named(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// MessagePack 바이트에서 디코딩.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        rmp_serde::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }

    /// 태그 포함 여부 확인.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.kind.split(TAG_DELIMITER).any(|t| t == tag)
    }

    /// payload를 쿼리 텍스트로 디코딩.
    pub fn query_text(&self) -> Result<String, CodecError> {
        decode_payload(&self.payload)
    }

    /// payload를 쿼리 결과로 디코딩.
    pub fn query_payload(&self) -> Result<QueryPayload, CodecError> {
        QueryPayload::from_payload_text(&decode_payload(&self.payload)?)
    }
}

// ==================== payload 인코딩 ====================

/// 텍스트를 base64 payload로 인코딩.
pub fn encode_payload(text: &str) -> String {
    BASE64.encode(text.as_bytes())
}

/// base64 payload를 텍스트로 디코딩.
pub fn decode_payload(payload: &str) -> Result<String, CodecError> {
    let bytes = BASE64
        .decode(payload.as_bytes())
        .map_err(|e| CodecError::InvalidPayload(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| CodecError::InvalidPayload(e.to_string()))
}

// ==================== 쿼리 결과 payload ====================

/// 쿼리 결과 본문.
///
/// 리졸버 성공 시 `data`, 실패 시 `errors`가 채워집니다.
/// 에러는 구조화된 payload로 전달되며 세션을 중단시키지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryPayload {
    /// 토픽 이름을 키로 하는 결과 객체
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// 쿼리 에러 목록
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl QueryPayload {
    /// 성공 결과 생성.
    pub fn from_data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: None,
        }
    }

    /// 에러 결과 생성.
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            data: None,
            errors: Some(errors),
        }
    }

    /// 에러 포함 여부.
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// JSON 텍스트로 직렬화.
    pub fn to_payload_text(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// JSON 텍스트에서 역직렬화.
    pub fn from_payload_text(text: &str) -> Result<Self, CodecError> {
        serde_json::from_str(text).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
