//! Command handlers -- one module per subcommand

pub mod config;
pub mod decrypt;
pub mod emit;
pub mod route;

use std::path::Path;

use logroute_core::config::LogrouteConfig;

use crate::error::CliError;

/// Load the configuration file, falling back to defaults + env when it does not exist.
pub async fn load_config(path: &Path) -> Result<LogrouteConfig, CliError> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        Ok(LogrouteConfig::load(path).await?)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults and environment");
        Ok(LogrouteConfig::from_env()?)
    }
}

/// Parse a `--data` argument into a JSON object.
pub fn parse_data(raw: Option<&str>) -> Result<serde_json::Map<String, serde_json::Value>, CliError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(serde_json::Map::new());
    };
    match serde_json::from_str(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(CliError::Input("--data must be a JSON object".to_owned())),
        Err(e) => Err(CliError::Input(format!("--data is not valid JSON: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_accepts_objects_only() {
        assert!(parse_data(None).unwrap().is_empty());
        assert!(parse_data(Some("  ")).unwrap().is_empty());
        assert_eq!(parse_data(Some(r#"{"a":1}"#)).unwrap()["a"], 1);
        assert!(matches!(parse_data(Some("[1,2]")), Err(CliError::Input(_))));
        assert!(matches!(parse_data(Some("{oops")), Err(CliError::Input(_))));
    }
}
