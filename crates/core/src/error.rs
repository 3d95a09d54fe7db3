//! 에러 타입 — 도메인별 에러 정의

/// logroute 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogrouteError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 로그 전달 파이프라인 에러
    #[error("delivery error: {0}")]
    Delivery(String),

    /// 라우팅 테이블 에러
    #[error("routing table error: {0}")]
    RoutingTable(String),

    /// JSON 직렬화/역직렬화 에러
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}
