//! 라우터 설정
//!
//! [`RouterConfig`]는 core의 [`LogrouteConfig`](logroute_core::config::LogrouteConfig)에서
//! 파생되며, 파이프라인 구성 요소가 쓰는 정책([`WritePolicy`], [`BreakerPolicy`])으로
//! 변환됩니다.
//!
//! # 사용 예시
//! ```ignore
//! use logroute_core::config::LogrouteConfig;
//! use logroute_pipeline::config::RouterConfig;
//!
//! let core_config = LogrouteConfig::default();
//! let config = RouterConfig::from_core(&core_config);
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use logroute_core::config::{DEFAULT_MAX_FILE_SIZE_BYTES, LogrouteConfig};

use crate::breaker::BreakerPolicy;
use crate::error::DeliveryError;
use crate::writer::WritePolicy;

/// 출력에 노출되지 않는 비밀 문자열
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// 원문
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// 라우터 설정
#[derive(Debug, Clone, Serialize)]
pub struct RouterConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 배포 환경명
    pub env: String,
    /// 기본 로그 루트
    pub root: PathBuf,
    /// 크리티컬 복제본 루트
    pub critical_root: PathBuf,
    /// 쓰기 실패 폴백 루트
    pub write_errors_root: PathBuf,
    /// 플레이스홀더 누락 폴백 루트
    pub missing_path_root: PathBuf,
    /// 알림 실패 폴백 루트
    pub slack_fallback_root: PathBuf,
    /// 라우팅 테이블 파일
    pub routes_file: Option<PathBuf>,
    /// 로테이션 기준 크기 (바이트)
    pub max_file_size_bytes: u64,
    /// 쓰기 시도 횟수
    pub write_attempts: u32,
    /// 백오프 기본 간격 (밀리초)
    pub backoff_base_ms: u64,
    /// 캐시 용량
    pub cache_capacity: usize,
    /// base64 암호화 키
    #[serde(skip)]
    pub encryption_key: Option<Secret>,
    /// 알림 웹훅 URL
    pub webhook_url: Option<String>,
    /// 알림 타임아웃 (밀리초)
    pub notify_timeout_ms: u64,
    /// 서킷 오픈 임계 실패 횟수
    pub failure_threshold: u32,
    /// 서킷 오픈 유지 시간 (초)
    pub cooldown_secs: u64,
    /// 폴백 억제 시간 (초)
    pub fallback_cooldown_secs: u64,
    /// 지연 재시도 최대 횟수
    pub max_retry_attempts: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            env: "development".to_owned(),
            root: PathBuf::from("logs"),
            critical_root: PathBuf::from("logs/critical"),
            write_errors_root: PathBuf::from("logs/write_errors"),
            missing_path_root: PathBuf::from("logs/missingLogPaths"),
            slack_fallback_root: PathBuf::from("logs/slack_fallback"),
            routes_file: None,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            write_attempts: 2,
            backoff_base_ms: 50,
            cache_capacity: 1000,
            encryption_key: None,
            webhook_url: None,
            notify_timeout_ms: 3000,
            failure_threshold: 3,
            cooldown_secs: 60,
            fallback_cooldown_secs: 60,
            max_retry_attempts: 2,
        }
    }
}

impl RouterConfig {
    /// core 설정에서 라우터 설정을 생성합니다.
    pub fn from_core(core: &LogrouteConfig) -> Self {
        let logging = &core.logging;
        Self {
            enabled: logging.enabled,
            env: logging.env.clone(),
            root: PathBuf::from(&logging.root),
            critical_root: PathBuf::from(&logging.critical_root),
            write_errors_root: PathBuf::from(&logging.write_errors_root),
            missing_path_root: PathBuf::from(&logging.missing_path_root),
            slack_fallback_root: PathBuf::from(&logging.slack_fallback_root),
            routes_file: logging.routes_file.as_ref().map(PathBuf::from),
            max_file_size_bytes: logging.max_file_size_bytes,
            write_attempts: logging.write_attempts,
            backoff_base_ms: logging.backoff_base_ms,
            cache_capacity: logging.cache_capacity,
            encryption_key: core.encryption.key_b64.clone().map(Secret),
            webhook_url: core.slack.webhook_url.clone(),
            notify_timeout_ms: core.slack.timeout_ms,
            failure_threshold: core.slack.failure_threshold,
            cooldown_secs: core.slack.cooldown_secs,
            fallback_cooldown_secs: core.slack.fallback_cooldown_secs,
            max_retry_attempts: core.slack.max_retry_attempts,
        }
    }

    /// 내구성 쓰기 정책
    pub fn write_policy(&self) -> WritePolicy {
        WritePolicy {
            max_file_size: self.max_file_size_bytes,
            attempts: self.write_attempts,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
        }
    }

    /// 알림 브레이커 정책
    pub fn breaker_policy(&self) -> BreakerPolicy {
        BreakerPolicy {
            threshold: self.failure_threshold,
            cooldown: Duration::from_secs(self.cooldown_secs),
            fallback_cooldown: Duration::from_secs(self.fallback_cooldown_secs),
            timeout: Duration::from_millis(self.notify_timeout_ms),
            max_retry_attempts: self.max_retry_attempts,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DeliveryError> {
        const MAX_WRITE_ATTEMPTS: u32 = 10;
        const MAX_CACHE_CAPACITY: usize = 1_000_000;

        let invalid = |field: &str, reason: &str| DeliveryError::Config {
            field: field.to_owned(),
            reason: reason.to_owned(),
        };

        for (field, root) in [
            ("root", &self.root),
            ("critical_root", &self.critical_root),
            ("write_errors_root", &self.write_errors_root),
            ("missing_path_root", &self.missing_path_root),
            ("slack_fallback_root", &self.slack_fallback_root),
        ] {
            if root.as_os_str().is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
        }

        if self.max_file_size_bytes == 0 {
            return Err(invalid("max_file_size_bytes", "must be greater than 0"));
        }
        if self.write_attempts == 0 || self.write_attempts > MAX_WRITE_ATTEMPTS {
            return Err(invalid(
                "write_attempts",
                &format!("must be 1-{MAX_WRITE_ATTEMPTS}"),
            ));
        }
        if self.cache_capacity == 0 || self.cache_capacity > MAX_CACHE_CAPACITY {
            return Err(invalid(
                "cache_capacity",
                &format!("must be 1-{MAX_CACHE_CAPACITY}"),
            ));
        }
        if self.notify_timeout_ms == 0 {
            return Err(invalid("notify_timeout_ms", "must be greater than 0"));
        }
        if self.failure_threshold == 0 {
            return Err(invalid("failure_threshold", "must be greater than 0"));
        }
        if let Some(path) = &self.routes_file {
            validate_routes_file(path)?;
        }

        Ok(())
    }
}

fn validate_routes_file(path: &Path) -> Result<(), DeliveryError> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !is_json {
        return Err(DeliveryError::Config {
            field: "routes_file".to_owned(),
            reason: format!("'{}' must be a .json file", path.display()),
        });
    }
    Ok(())
}

/// 라우터 설정 빌더
#[derive(Default)]
pub struct RouterConfigBuilder {
    config: RouterConfig,
}

impl RouterConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 활성화 여부를 설정합니다.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// 배포 환경명을 설정합니다.
    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.config.env = env.into();
        self
    }

    /// 모든 저장소 루트를 `base` 아래 기본 배치로 설정합니다.
    pub fn base_dir(mut self, base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        self.config.root = base.join("logs");
        self.config.critical_root = base.join("logs/critical");
        self.config.write_errors_root = base.join("logs/write_errors");
        self.config.missing_path_root = base.join("logs/missingLogPaths");
        self.config.slack_fallback_root = base.join("logs/slack_fallback");
        self
    }

    /// 기본 루트를 설정합니다.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.root = root.into();
        self
    }

    /// 크리티컬 루트를 설정합니다.
    pub fn critical_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.critical_root = root.into();
        self
    }

    /// 라우팅 테이블 파일을 설정합니다.
    pub fn routes_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.routes_file = Some(path.into());
        self
    }

    /// 로테이션 기준 크기를 설정합니다.
    pub fn max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_size_bytes = bytes;
        self
    }

    /// 쓰기 시도 횟수를 설정합니다.
    pub fn write_attempts(mut self, attempts: u32) -> Self {
        self.config.write_attempts = attempts;
        self
    }

    /// 백오프 기본 간격을 설정합니다.
    pub fn backoff_base_ms(mut self, ms: u64) -> Self {
        self.config.backoff_base_ms = ms;
        self
    }

    /// 캐시 용량을 설정합니다.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// base64 암호화 키를 설정합니다.
    pub fn encryption_key(mut self, key_b64: impl Into<String>) -> Self {
        self.config.encryption_key = Some(Secret(key_b64.into()));
        self
    }

    /// 웹훅 URL을 설정합니다.
    pub fn webhook_url(mut self, url: impl Into<String>) -> Self {
        self.config.webhook_url = Some(url.into());
        self
    }

    /// 알림 타임아웃을 설정합니다.
    pub fn notify_timeout_ms(mut self, ms: u64) -> Self {
        self.config.notify_timeout_ms = ms;
        self
    }

    /// 서킷 오픈 임계치를 설정합니다.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// 지연 재시도 최대 횟수를 설정합니다.
    pub fn max_retry_attempts(mut self, attempts: u32) -> Self {
        self.config.max_retry_attempts = attempts;
        self
    }

    /// 설정을 검증하고 `RouterConfig`를 생성합니다.
    pub fn build(self) -> Result<RouterConfig, DeliveryError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
