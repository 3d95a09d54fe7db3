//! 로그 전달 파이프라인 에러 타입
//!
//! [`DeliveryError`]는 파이프라인 내부에서 호출자에게 드러나는 에러를 표현합니다.
//! 환경 실패(디스크, 권한, 외부 알림)는 대부분 폴백 경로에서 흡수되므로
//! 호출자가 실제로 받는 것은 잘못된 인자와 최후의 폴백 실패뿐입니다.
//! `From<DeliveryError> for LogrouteError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logroute_core::error::LogrouteError;

/// 로그 전달 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// 잘못된 요청 (빈 플래그, 제어 문자 등)
    #[error("invalid request: {field}: {reason}")]
    InvalidRequest {
        /// 문제가 된 필드
        field: String,
        /// 거부 사유
        reason: String,
    },

    /// 잘못된 페이로드 (빈 문자열, 빈 배치 등)
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// 루트 밖으로 벗어나는 경로
    #[error("path traversal rejected: {0}")]
    PathTraversal(String),

    /// 형식이 잘못된 경로
    #[error("invalid path: {path}: {reason}")]
    InvalidPath {
        /// 입력 경로
        path: String,
        /// 거부 사유
        reason: String,
    },

    /// 암호화 키/연산 에러
    #[error("encryption error: {0}")]
    Encryption(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 라우팅 테이블 로딩 에러
    #[error("routing table error: {path}: {reason}")]
    RoutingTable {
        /// 테이블 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 폴백 저장소 쓰기까지 실패 (최후의 신호)
    #[error("fallback write failed for '{attempted}': {source}")]
    FallbackFailed {
        /// 원래 시도한 상대 경로
        attempted: String,
        /// 폴백 쓰기 에러
        #[source]
        source: std::io::Error,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 직렬화 에러
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl DeliveryError {
    /// 호출자 잘못으로 인한 에러인지 여부
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest { .. }
                | Self::InvalidPayload(_)
                | Self::PathTraversal(_)
                | Self::InvalidPath { .. }
        )
    }
}

/// 배치 안의 개별 이벤트 실패
///
/// 같은 파일로 묶인 이벤트들이 하나의 쓰기 실패를 공유하므로 복제 가능한 형태로 보관합니다.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct EventError {
    /// 호출자 잘못으로 인한 실패인지 여부
    pub caller_error: bool,
    /// 에러 메시지
    pub message: String,
}

impl From<&DeliveryError> for EventError {
    fn from(err: &DeliveryError) -> Self {
        Self {
            caller_error: err.is_caller_error(),
            message: err.to_string(),
        }
    }
}

impl From<DeliveryError> for LogrouteError {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::Config { field, reason } => {
                LogrouteError::Config(logroute_core::error::ConfigError::InvalidValue {
                    field,
                    reason,
                })
            }
            other @ DeliveryError::RoutingTable { .. } => {
                LogrouteError::RoutingTable(other.to_string())
            }
            other => LogrouteError::Delivery(other.to_string()),
        }
    }
}
