//! `logroute config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use logroute_core::config::LogrouteConfig;
use logroute_pipeline::RouterConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::commands::load_config;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const REDACTED: &str = "***REDACTED***";

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load the configuration file and validate it, including the derived router settings.
///
/// # Errors
///
/// Returns `CliError::Config` if the file is missing, malformed or invalid.
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = validate(config_path).await;
    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

/// Validate a configuration file.
pub async fn validate(config_path: &Path) -> ConfigValidationReport {
    let errors = match LogrouteConfig::load(config_path).await {
        Ok(config) => match RouterConfig::from_core(&config).validate() {
            Ok(()) => Vec::new(),
            Err(e) => vec![e.to_string()],
        },
        Err(e) => vec![e.to_string()],
    };
    ConfigValidationReport {
        source: config_path.display().to_string(),
        valid: errors.is_empty(),
        errors,
    }
}

/// Show the effective configuration (file + env overrides + defaults).
///
/// # Errors
///
/// Returns `CliError::Input` if the section name is unknown.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = load_config(config_path).await?;
    let report = show(&config, &config_path.display().to_string(), section.as_deref())?;
    writer.render(&report)?;
    Ok(())
}

/// Render the configuration (or one section of it) as TOML with secrets redacted.
pub fn show(
    config: &LogrouteConfig,
    source: &str,
    section: Option<&str>,
) -> Result<ConfigReport, CliError> {
    let mut config = config.clone();
    redact_secrets(&mut config);

    let rendered = match section {
        None => toml::to_string_pretty(&config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("logging") => toml::to_string_pretty(&config.logging),
        Some("encryption") => toml::to_string_pretty(&config.encryption),
        Some("slack") => toml::to_string_pretty(&config.slack),
        Some(other) => {
            return Err(CliError::Input(format!(
                "unknown section: {} (expected: general, logging, encryption, slack)",
                other
            )));
        }
    };

    Ok(ConfigReport {
        source: source.to_owned(),
        section: section.map(str::to_owned),
        config_toml: rendered.unwrap_or_else(|e| format!("(serialization error: {})", e)),
    })
}

/// Replace the encryption key and webhook URL with a marker.
fn redact_secrets(config: &mut LogrouteConfig) {
    if config.encryption.key_b64.is_some() {
        config.encryption.key_b64 = Some(REDACTED.to_owned());
    }
    if config.slack.webhook_url.is_some() {
        config.slack.webhook_url = Some(REDACTED.to_owned());
    }
}

/// Configuration display report.
///
/// `config_toml` is only used for text rendering.
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration file path
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Serialized TOML configuration (secrets redacted)
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;
        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;
        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_secrets() -> LogrouteConfig {
        let mut config = LogrouteConfig::default();
        config.encryption.key_b64 = Some("c2VjcmV0LWtleQ==".to_owned());
        config.slack.webhook_url = Some("https://hooks.slack.com/services/T/B/secret".to_owned());
        config
    }

    #[test]
    fn test_show_redacts_secrets() {
        let report = show(&config_with_secrets(), "logroute.toml", None).expect("show");
        assert!(report.config_toml.contains(REDACTED));
        assert!(!report.config_toml.contains("c2VjcmV0LWtleQ=="));
        assert!(!report.config_toml.contains("hooks.slack.com"));
    }

    #[test]
    fn test_show_single_section() {
        let report = show(&LogrouteConfig::default(), "x", Some("logging")).expect("show");
        assert_eq!(report.section.as_deref(), Some("logging"));
        assert!(report.config_toml.contains("root = \"logs\""));
        assert!(!report.config_toml.contains("log_format"));
    }

    #[test]
    fn test_show_unknown_section() {
        let result = show(&LogrouteConfig::default(), "x", Some("ebpf"));
        assert!(matches!(result, Err(CliError::Input(_))));
    }

    #[test]
    fn test_show_does_not_mutate_source() {
        let config = config_with_secrets();
        let _ = show(&config, "x", None).expect("show");
        assert_eq!(config.encryption.key_b64.as_deref(), Some("c2VjcmV0LWtleQ=="));
    }

    #[test]
    fn test_validation_report_render() {
        colored::control::set_override(false);
        let report = ConfigValidationReport {
            source: "logroute.toml".to_owned(),
            valid: false,
            errors: vec!["bad value".to_owned()],
        };
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf-8");
        assert!(output.contains("INVALID"));
        assert!(output.contains("Error: bad value"));
    }
}
