//! 설정 관리 — logroute.toml 파싱 및 런타임 설정
//!
//! [`LogrouteConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. 환경변수 (`LOG_ROOT=/var/log/app` 형식)
//! 2. 설정 파일 (`logroute.toml`)
//! 3. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logroute_core::error::LogrouteError> {
//! use logroute_core::config::LogrouteConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogrouteConfig::load("logroute.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogrouteConfig::parse("[logging]\nroot = \"/tmp/logs\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogrouteError};

/// 로테이션 기준 파일 크기 기본값 (5 MiB)
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;

/// logroute 통합 설정
///
/// `logroute.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogrouteConfig {
    /// 일반 설정 (자체 진단 로그)
    #[serde(default)]
    pub general: GeneralConfig,
    /// 로그 전달 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 필드 암호화 설정
    #[serde(default)]
    pub encryption: EncryptionConfig,
    /// Slack 알림 설정
    #[serde(default)]
    pub slack: SlackConfig,
}

impl LogrouteConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogrouteError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일 없이 기본값 + 환경변수만으로 설정을 만듭니다.
    pub fn from_env() -> Result<Self, LogrouteError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogrouteError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogrouteError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogrouteError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogrouteError> {
        toml::from_str(toml_str).map_err(|e| {
            LogrouteError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 애플리케이션이 이미 사용하는 `LOGGING_ENABLED`, `LOG_*` 변수명을 그대로 따릅니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOG_FORMAT");

        // Logging
        override_bool(&mut self.logging.enabled, "LOGGING_ENABLED");
        override_string(&mut self.logging.env, "LOG_ENV");
        override_string(&mut self.logging.root, "LOG_ROOT");
        override_string(&mut self.logging.critical_root, "LOG_CRITICAL_ROOT");
        override_string(&mut self.logging.write_errors_root, "LOG_WRITE_ERRORS_ROOT");
        override_string(&mut self.logging.missing_path_root, "LOG_MISSING_PATH_ROOT");
        override_string(
            &mut self.logging.slack_fallback_root,
            "LOG_SLACK_FALLBACK_ROOT",
        );
        override_opt_string(&mut self.logging.routes_file, "LOG_ROUTES_FILE");

        // Encryption
        override_opt_string(&mut self.encryption.key_b64, "LOG_ENCRYPTION_KEY");

        // Slack
        override_opt_string(&mut self.slack.webhook_url, "LOG_SLACK_WEBHOOK_URL");
        override_u64(&mut self.slack.timeout_ms, "LOG_SLACK_TIMEOUT_MS");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogrouteError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        let roots = [
            ("logging.root", &self.logging.root),
            ("logging.critical_root", &self.logging.critical_root),
            ("logging.write_errors_root", &self.logging.write_errors_root),
            ("logging.missing_path_root", &self.logging.missing_path_root),
            ("logging.slack_fallback_root", &self.logging.slack_fallback_root),
        ];
        for (field, value) in roots {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "root directory must not be empty".to_owned(),
                }
                .into());
            }
        }

        if self.logging.max_file_size_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "logging.max_file_size_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.logging.write_attempts == 0 || self.logging.write_attempts > 10 {
            return Err(ConfigError::InvalidValue {
                field: "logging.write_attempts".to_owned(),
                reason: "must be 1-10".to_owned(),
            }
            .into());
        }

        if self.logging.cache_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "logging.cache_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.slack.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "slack.timeout_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.slack.failure_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "slack.failure_threshold".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if let Some(url) = &self.slack.webhook_url
            && !(url.starts_with("https://") || url.starts_with("http://"))
        {
            return Err(ConfigError::InvalidValue {
                field: "slack.webhook_url".to_owned(),
                reason: "must be an http(s) URL".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 진단 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 진단 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 로그 전달 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 활성화 여부 (false면 공개 진입점이 아무 것도 하지 않음)
    pub enabled: bool,
    /// 배포 환경명 (이벤트의 `env` 필드)
    pub env: String,
    /// 기본 로그 루트
    pub root: String,
    /// 크리티컬 복제본 루트
    pub critical_root: String,
    /// 쓰기 실패 폴백 루트
    pub write_errors_root: String,
    /// 경로 플레이스홀더 누락 폴백 루트
    pub missing_path_root: String,
    /// Slack 전송 실패 폴백 루트
    pub slack_fallback_root: String,
    /// 라우팅 테이블 JSON 파일 경로
    pub routes_file: Option<String>,
    /// 로테이션 기준 파일 크기 (바이트)
    pub max_file_size_bytes: u64,
    /// 쓰기 시도 횟수
    pub write_attempts: u32,
    /// 재시도 백오프 기본 간격 (밀리초)
    pub backoff_base_ms: u64,
    /// 캐시 최대 엔트리 수
    pub cache_capacity: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            env: "development".to_owned(),
            root: "logs".to_owned(),
            critical_root: "logs/critical".to_owned(),
            write_errors_root: "logs/write_errors".to_owned(),
            missing_path_root: "logs/missingLogPaths".to_owned(),
            slack_fallback_root: "logs/slack_fallback".to_owned(),
            routes_file: None,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            write_attempts: 2,
            backoff_base_ms: 50,
            cache_capacity: 1000,
        }
    }
}

/// 필드 암호화 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// base64로 인코딩된 32바이트 키
    pub key_b64: Option<String>,
}

/// Slack 알림 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// 웹훅 URL (없으면 알림 비활성화)
    pub webhook_url: Option<String>,
    /// 전송 타임아웃 (밀리초)
    pub timeout_ms: u64,
    /// 서킷 오픈까지의 연속 실패 횟수
    pub failure_threshold: u32,
    /// 서킷 오픈 유지 시간 (초)
    pub cooldown_secs: u64,
    /// 폴백 쓰기 억제 시간 (초)
    pub fallback_cooldown_secs: u64,
    /// 지연 재시도 최대 횟수
    pub max_retry_attempts: u32,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_ms: 3000,
            failure_threshold: 3,
            cooldown_secs: 60,
            fallback_cooldown_secs: 60,
            max_retry_attempts: 2,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_opt_string(target: &mut Option<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = if val.trim().is_empty() { None } else { Some(val) };
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => *target = true,
            "false" | "0" | "no" => *target = false,
            _ => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
