//! 이벤트 — 호출자 요청과 직렬화되는 로그 레코드
//!
//! [`LogRequest`]는 호출자가 제출하는 입력이고, [`LogEvent`]는 라우트 메타데이터가
//! 합쳐진 뒤 디스크에 기록되는 레코드입니다. `LogEvent`는 호출마다 새로 만들어지며
//! 암호화가 적용된 이후에는 변경되지 않습니다.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{LogLevel, LogRoute};

/// 직렬화 레코드 스키마 버전
pub const SCHEMA_VERSION: u32 = 1;

/// 파일명에 쓰이는 타임스탬프 형식 (콜론 없음)
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%3fZ";

/// 필드 암호화 선택
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EncryptSelection {
    /// 라우트에 설정된 필드만 암호화
    #[default]
    RouteOnly,
    /// 라우트 설정 + 지정한 필드
    Fields(Vec<String>),
    /// `data`의 모든 필드
    All,
}

/// 호출자가 제출하는 로그 요청
#[derive(Debug, Clone)]
pub struct LogRequest {
    /// 라우트 조회에 쓰이는 플래그
    pub flag: String,
    /// 수행한 동작
    pub action: String,
    /// 사람이 읽는 메시지
    pub message: String,
    /// 레벨
    pub level: LogLevel,
    /// 구조화 데이터 (경로 템플릿 치환에도 사용)
    pub data: Map<String, Value>,
    /// 라우트와 무관하게 크리티컬로 취급할지 여부
    pub critical: bool,
    /// 암호화 대상 선택
    pub encrypt: EncryptSelection,
}

impl LogRequest {
    /// 필수 필드만으로 요청을 만듭니다.
    pub fn new(
        flag: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            flag: flag.into(),
            action: action.into(),
            message: message.into(),
            level: LogLevel::Info,
            data: Map::new(),
            critical: false,
            encrypt: EncryptSelection::RouteOnly,
        }
    }

    /// 레벨을 지정합니다.
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// 데이터 필드 하나를 추가합니다.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// 데이터 맵 전체를 지정합니다.
    pub fn data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// 크리티컬로 표시합니다.
    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// 추가로 암호화할 필드를 지정합니다.
    pub fn encrypt_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.encrypt = EncryptSelection::Fields(fields.into_iter().map(Into::into).collect());
        self
    }

    /// 모든 데이터 필드를 암호화합니다.
    pub fn encrypt_all(mut self) -> Self {
        self.encrypt = EncryptSelection::All;
        self
    }
}

/// 디스크에 기록되는 로그 레코드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    /// 스키마 버전
    pub schema_version: u32,
    /// RFC 3339 타임스탬프 (밀리초, UTC)
    pub timestamp: String,
    /// 파일명용 타임스탬프
    pub file_timestamp: String,
    /// 레벨
    pub level: LogLevel,
    /// 플래그
    pub flag: String,
    /// 동작
    pub action: String,
    /// 메시지
    pub message: String,
    /// 크리티컬 여부
    pub critical: bool,
    /// 구조화 데이터 (암호화 이후 일부 값은 암호화 세그먼트)
    pub data: Map<String, Value>,
    /// 보존 정책
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention: Option<String>,
    /// 카테고리
    pub category: String,
    /// PCI 관련 여부
    pub is_pci_relevant: bool,
    /// 라우트 설명
    pub description: String,
    /// 배포 환경
    pub env: String,
}

impl LogEvent {
    /// 요청과 해석된 라우트로 레코드를 만듭니다.
    pub fn build(request: &LogRequest, route: &LogRoute, at: DateTime<Utc>, env: &str) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            file_timestamp: at.format(FILE_TIMESTAMP_FORMAT).to_string(),
            level: request.level,
            flag: request.flag.clone(),
            action: request.action.clone(),
            message: request.message.clone(),
            critical: route.critical || request.critical,
            data: request.data.clone(),
            retention: route.retention.clone(),
            category: route.category.clone(),
            is_pci_relevant: route.is_pci_relevant,
            description: route.description.clone(),
            env: env.to_owned(),
        }
    }

    /// 한 줄짜리 JSON으로 직렬화합니다.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn route(critical: bool) -> LogRoute {
        LogRoute {
            flag: "USER_LOGIN".to_owned(),
            path_template: "auth/{date:yyyy-MM-dd}.log".to_owned(),
            retention: Some("30d".to_owned()),
            category: "auth".to_owned(),
            description: "user login".to_owned(),
            is_pci_relevant: false,
            critical,
            encrypt_fields: Vec::new(),
        }
    }

    #[test]
    fn build_copies_route_metadata() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let request = LogRequest::new("USER_LOGIN", "login", "ok").field("user", "alice");
        let event = LogEvent::build(&request, &route(false), at, "production");

        assert_eq!(event.schema_version, SCHEMA_VERSION);
        assert_eq!(event.timestamp, "2024-03-09T14:05:07.000Z");
        assert_eq!(event.file_timestamp, "2024-03-09T14-05-07-000Z");
        assert_eq!(event.category, "auth");
        assert_eq!(event.retention.as_deref(), Some("30d"));
        assert_eq!(event.env, "production");
        assert_eq!(event.data["user"], "alice");
        assert!(!event.critical);
    }

    #[test]
    fn request_critical_overrides_route() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let request = LogRequest::new("USER_LOGIN", "login", "locked").critical();
        let event = LogEvent::build(&request, &route(false), at, "test");
        assert!(event.critical);
    }

    #[test]
    fn json_line_uses_camel_case() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let request = LogRequest::new("USER_LOGIN", "login", "ok");
        let line = LogEvent::build(&request, &route(true), at, "test")
            .to_json_line()
            .unwrap();
        assert!(line.contains("\"schemaVersion\":1"));
        assert!(line.contains("\"isPciRelevant\":false"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn encrypt_selection_builders() {
        let request = LogRequest::new("A", "b", "c").encrypt_fields(["ssn", "dob"]);
        assert_eq!(
            request.encrypt,
            EncryptSelection::Fields(vec!["ssn".to_owned(), "dob".to_owned()])
        );
        let request = request.encrypt_all();
        assert_eq!(request.encrypt, EncryptSelection::All);
    }
}
