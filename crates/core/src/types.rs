//! 도메인 타입 — 라우트와 로그 레벨
//!
//! 라우팅 테이블에서 해석된 [`LogRoute`]와 이벤트 심각도 [`LogLevel`]을 정의합니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 로그 레벨
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Critical,
}

impl LogLevel {
    /// 소문자 레벨명을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "critical" | "fatal" => Ok(Self::Critical),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// 플래그 하나에 대해 해석된 라우트
///
/// 라우팅 테이블의 엔트리 또는 미등록 플래그에 대해 합성된 폴백 라우트입니다.
/// 생성된 이후에는 변경되지 않으며, 캐시에서는 소문자 플래그로 조회됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRoute {
    /// 라우트 플래그 (라우팅 테이블에 적힌 원래 표기)
    pub flag: String,
    /// 경로 템플릿 (`logs/{tenant}/{date:yyyy-MM-dd}.log`)
    pub path_template: String,
    /// 보존 정책 표기 (예: "90d")
    pub retention: Option<String>,
    /// 카테고리명
    pub category: String,
    /// 설명
    pub description: String,
    /// PCI 관련 여부
    #[serde(default)]
    pub is_pci_relevant: bool,
    /// 크리티컬 여부 (복제 + 외부 알림)
    #[serde(default)]
    pub critical: bool,
    /// 항상 암호화할 필드 목록
    #[serde(default)]
    pub encrypt_fields: Vec<String>,
}

/// 미등록 플래그에 붙는 카테고리/설명
pub const UNKNOWN_CATEGORY: &str = "unknown";

impl LogRoute {
    /// 라우팅 테이블에 없는 플래그용 폴백 라우트를 만듭니다.
    pub fn fallback(flag: impl Into<String>, path_template: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            path_template: path_template.into(),
            retention: None,
            category: UNKNOWN_CATEGORY.to_owned(),
            description: UNKNOWN_CATEGORY.to_owned(),
            is_pci_relevant: false,
            critical: false,
            encrypt_fields: Vec::new(),
        }
    }

    /// 라우팅 테이블에 없는 플래그용 폴백 라우트인지 확인합니다.
    pub fn is_fallback(&self) -> bool {
        self.category == UNKNOWN_CATEGORY && self.path_template.starts_with("missingLogRoutes/")
    }
}
