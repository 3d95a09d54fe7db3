//! `logroute route` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use logroute_core::config::LogrouteConfig;
use logroute_core::event::LogRequest;
use logroute_pipeline::{LogRouter, RouterConfig};

use crate::cli::RouteArgs;
use crate::commands::{load_config, parse_data};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `route` command.
pub async fn execute(
    args: RouteArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = load_config(config_path).await?;
    let report = resolve(args, &config).await?;
    writer.render(&report)?;
    Ok(())
}

/// Resolve the route and expanded path for a flag without writing anything.
pub async fn resolve(args: RouteArgs, config: &LogrouteConfig) -> Result<RouteReport, CliError> {
    let data = parse_data(args.data.as_deref())?;
    let router = LogRouter::from_config(RouterConfig::from_core(config)).await?;

    let request = LogRequest::new(args.flag, "preview", "").data(data);
    let (route, expansion) = router.preview(&request);
    let path = expansion
        .path
        .as_ref()
        .map(|relative| router.config().root.join(relative).display().to_string());

    Ok(RouteReport {
        flag: request.flag,
        configured: !route.is_fallback(),
        category: route.category.clone(),
        template: route.path_template.clone(),
        critical: route.critical,
        pci_relevant: route.is_pci_relevant,
        retention: route.retention.clone(),
        encrypt_fields: route.encrypt_fields.clone(),
        path,
        missing: expansion.missing,
    })
}

/// Route resolution report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteReport {
    pub flag: String,
    /// `false` when the flag has no entry and the fallback route is used
    pub configured: bool,
    pub category: String,
    pub template: String,
    pub critical: bool,
    pub pci_relevant: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention: Option<String>,
    pub encrypt_fields: Vec<String>,
    /// Full file path, when every placeholder resolved
    pub path: Option<String>,
    /// Placeholders that could not be resolved
    pub missing: Vec<String>,
}

impl Render for RouteReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let kind = if self.configured {
            "configured".green()
        } else {
            "fallback".yellow()
        };
        writeln!(w, "Route {} ({})", self.flag.bold(), kind)?;
        writeln!(w, "  Category: {}", self.category)?;
        writeln!(w, "  Template: {}", self.template)?;
        if let Some(retention) = &self.retention {
            writeln!(w, "  Retention: {}", retention)?;
        }
        writeln!(w, "  Critical: {}", self.critical)?;
        if !self.encrypt_fields.is_empty() {
            writeln!(w, "  Encrypted fields: {}", self.encrypt_fields.join(", "))?;
        }
        match &self.path {
            Some(path) => writeln!(w, "  Path: {}", path)?,
            None => writeln!(
                w,
                "  Path: {} (missing: {})",
                "unresolved".red(),
                self.missing.join(", ")
            )?,
        }
        Ok(())
    }
}
