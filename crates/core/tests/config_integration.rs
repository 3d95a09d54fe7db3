//! logroute.toml 통합 설정 테스트
//!
//! - logroute.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use logroute_core::config::{DEFAULT_MAX_FILE_SIZE_BYTES, LogrouteConfig};
use logroute_core::error::{ConfigError, LogrouteError};

// =============================================================================
// logroute.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../logroute.toml.example");
    let config = LogrouteConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert!(config.logging.enabled);
    assert_eq!(config.logging.root, "logs");
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../logroute.toml.example");
    let config = LogrouteConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let content = include_str!("../../../logroute.toml.example");
    let parsed = LogrouteConfig::parse(content).expect("should parse");
    let defaults = LogrouteConfig::default();

    assert_eq!(parsed.logging.critical_root, defaults.logging.critical_root);
    assert_eq!(
        parsed.logging.write_errors_root,
        defaults.logging.write_errors_root
    );
    assert_eq!(
        parsed.logging.missing_path_root,
        defaults.logging.missing_path_root
    );
    assert_eq!(
        parsed.logging.slack_fallback_root,
        defaults.logging.slack_fallback_root
    );
    assert_eq!(parsed.logging.max_file_size_bytes, DEFAULT_MAX_FILE_SIZE_BYTES);
    assert_eq!(parsed.logging.write_attempts, defaults.logging.write_attempts);
    assert_eq!(parsed.logging.backoff_base_ms, defaults.logging.backoff_base_ms);
    assert_eq!(parsed.logging.cache_capacity, defaults.logging.cache_capacity);
    assert_eq!(parsed.slack.timeout_ms, defaults.slack.timeout_ms);
    assert_eq!(
        parsed.slack.failure_threshold,
        defaults.slack.failure_threshold
    );
    assert_eq!(parsed.slack.cooldown_secs, defaults.slack.cooldown_secs);
    assert_eq!(
        parsed.slack.fallback_cooldown_secs,
        defaults.slack.fallback_cooldown_secs
    );
    assert_eq!(
        parsed.slack.max_retry_attempts,
        defaults.slack.max_retry_attempts
    );
    assert!(parsed.slack.webhook_url.is_none());
    assert!(parsed.encryption.key_b64.is_none());
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_logging_only() {
    let toml = r#"
[logging]
root = "/var/log/app"
env = "production"
"#;
    let config = LogrouteConfig::parse(toml).expect("should parse");

    assert_eq!(config.logging.root, "/var/log/app");
    assert_eq!(config.logging.env, "production");
    // 나머지는 기본값
    assert_eq!(config.logging.critical_root, "logs/critical");
    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.slack.timeout_ms, 3000);
}

#[test]
fn partial_config_slack_only() {
    let toml = r#"
[slack]
webhook_url = "https://hooks.example.com/T000/B000"
failure_threshold = 5
"#;
    let config = LogrouteConfig::parse(toml).expect("should parse");

    assert_eq!(
        config.slack.webhook_url.as_deref(),
        Some("https://hooks.example.com/T000/B000")
    );
    assert_eq!(config.slack.failure_threshold, 5);
    assert_eq!(config.slack.cooldown_secs, 60);
    config.validate().expect("should validate");
}

#[test]
fn empty_file_yields_defaults() {
    let config = LogrouteConfig::parse("").expect("empty config should parse");
    assert!(config.logging.enabled);
    assert_eq!(config.logging.cache_capacity, 1000);
    config.validate().expect("defaults should validate");
}

// =============================================================================
// 에러 테스트
// =============================================================================

#[test]
fn malformed_toml_is_parse_error() {
    let err = LogrouteConfig::parse("[logging\nroot = ").unwrap_err();
    assert!(matches!(
        err,
        LogrouteError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn wrong_type_is_parse_error() {
    let err = LogrouteConfig::parse("[logging]\nwrite_attempts = \"two\"").unwrap_err();
    assert!(matches!(
        err,
        LogrouteError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn non_http_webhook_fails_validation() {
    let toml = r#"
[slack]
webhook_url = "ftp://example.com/hook"
"#;
    let config = LogrouteConfig::parse(toml).expect("should parse");
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("slack.webhook_url"));
}

#[tokio::test]
async fn load_missing_file_is_file_not_found() {
    let err = LogrouteConfig::load("/nonexistent/logroute.toml")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LogrouteError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[tokio::test]
async fn from_file_reads_toml() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logroute.toml");
    std::fs::write(&path, "[logging]\nroot = \"/srv/logs\"\n").expect("write");

    let config = LogrouteConfig::from_file(&path).await.expect("should load");
    assert_eq!(config.logging.root, "/srv/logs");
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

/// 환경변수를 설정한 상태로 클로저를 실행하고 원래 값을 복원합니다.
fn with_env<T>(key: &str, value: &str, f: impl FnOnce() -> T) -> T {
    let original = std::env::var(key).ok();
    // SAFETY: 테스트는 serial로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var(key, value);
    }

    let result = f();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var(key, val),
            None => std::env::remove_var(key),
        }
    }
    result
}

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[logging]
root = "/from/toml"
"#;
    let root = with_env("LOG_ROOT", "/from/env", || {
        let mut config = LogrouteConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.logging.root
    });
    assert_eq!(root, "/from/env");
}

#[test]
#[serial_test::serial]
fn env_override_disables_logging() {
    let enabled = with_env("LOGGING_ENABLED", "false", || {
        let mut config = LogrouteConfig::default();
        config.apply_env_overrides();
        config.logging.enabled
    });
    assert!(!enabled);
}

#[test]
#[serial_test::serial]
fn env_override_numeric_field() {
    let timeout = with_env("LOG_SLACK_TIMEOUT_MS", "1500", || {
        let mut config = LogrouteConfig::default();
        config.apply_env_overrides();
        config.slack.timeout_ms
    });
    assert_eq!(timeout, 1500);
}

#[test]
#[serial_test::serial]
fn env_override_invalid_numeric_is_ignored() {
    let timeout = with_env("LOG_SLACK_TIMEOUT_MS", "soon", || {
        let mut config = LogrouteConfig::default();
        config.apply_env_overrides();
        config.slack.timeout_ms
    });
    assert_eq!(timeout, 3000);
}

#[test]
#[serial_test::serial]
fn env_override_empty_key_clears_optional() {
    let key = with_env("LOG_ENCRYPTION_KEY", "", || {
        let mut config = LogrouteConfig::default();
        config.encryption.key_b64 = Some("abc".to_owned());
        config.apply_env_overrides();
        config.encryption.key_b64
    });
    assert!(key.is_none());
}
