//! `logroute emit` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use logroute_core::config::LogrouteConfig;
use logroute_core::event::LogRequest;
use logroute_pipeline::{Delivery, LogRouter, RouterConfig, StatsSnapshot, WriteReport};

use crate::cli::EmitArgs;
use crate::commands::{load_config, parse_data};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `emit` command.
pub async fn execute(
    args: EmitArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = load_config(config_path).await?;
    let report = emit(args, &config).await?;
    writer.render(&report)?;
    Ok(())
}

/// Write one event through a router built from `config`, waiting for notifications.
pub async fn emit(args: EmitArgs, config: &LogrouteConfig) -> Result<EmitReport, CliError> {
    let request = build_request(args)?;
    let router = LogRouter::from_config(RouterConfig::from_core(config)).await?;

    info!(flag = %request.flag, "emitting log event");
    let report = router.write_log(request).await?;
    router.drain().await;

    Ok(EmitReport {
        report,
        stats: router.stats(),
    })
}

/// Build a [`LogRequest`] from command-line arguments.
pub fn build_request(args: EmitArgs) -> Result<LogRequest, CliError> {
    let data = parse_data(args.data.as_deref())?;
    let mut request = LogRequest::new(args.flag, args.action, args.message)
        .level(args.level)
        .data(data);
    if args.critical {
        request = request.critical();
    }
    if args.encrypt_all {
        request = request.encrypt_all();
    } else if !args.encrypt_fields.is_empty() {
        request = request.encrypt_fields(args.encrypt_fields);
    }
    Ok(request)
}

/// Result of a single emit.
#[derive(Serialize)]
pub struct EmitReport {
    /// Where the event landed
    #[serde(flatten)]
    pub report: WriteReport,
    /// Router counters after the write (and any notification) finished
    pub stats: StatsSnapshot,
}

impl Render for EmitReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Event {}", self.report.flag.bold())?;
        write_delivery(w, "Primary", &self.report.delivery)?;
        if let Some(replica) = &self.report.replica {
            write_delivery(w, "Replica", replica)?;
        }
        if self.report.notified {
            let outcome = if self.stats.notifications_sent > 0 {
                "sent".green()
            } else if self.stats.notifications_skipped > 0 {
                "skipped (circuit open)".yellow()
            } else {
                "failed".red()
            };
            writeln!(w, "  Notification: {}", outcome)?;
        }
        Ok(())
    }
}

fn write_delivery(w: &mut dyn Write, label: &str, delivery: &Delivery) -> std::io::Result<()> {
    use colored::Colorize;

    match delivery {
        Delivery::Written { path } => {
            writeln!(w, "  {label}: {} {}", "written".green(), path.display())
        }
        Delivery::Fallback { path } => {
            writeln!(w, "  {label}: {} {}", "fallback".yellow(), path.display())
        }
        Delivery::MissingPath { path, missing } => writeln!(
            w,
            "  {label}: {} {} (missing: {})",
            "missing-path".yellow(),
            path.display(),
            missing.join(", ")
        ),
        Delivery::Dropped => writeln!(w, "  {label}: {}", "dropped (permission denied)".red()),
        Delivery::Disabled => writeln!(w, "  {label}: {}", "disabled".dimmed()),
    }
}
