//! `logroute decrypt` command handler
//!
//! Reads an NDJSON log file and decrypts the encrypted fields of each entry with the
//! configured key. Entries wrapped in missing-path or write-error envelopes are
//! unwrapped first. Lines that are not JSON are counted and skipped.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use logroute_core::config::LogrouteConfig;
use logroute_pipeline::{FieldEncryptor, PipelineContext, log_entries};

use crate::cli::DecryptArgs;
use crate::commands::load_config;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `decrypt` command.
pub async fn execute(
    args: DecryptArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = load_config(config_path).await?;
    let report = decrypt_file(&args.file, &config).await?;
    writer.render(&report)?;
    Ok(())
}

/// Decrypt every entry of `file` with the key from `config`.
pub async fn decrypt_file(file: &Path, config: &LogrouteConfig) -> Result<DecryptReport, CliError> {
    let encryptor = FieldEncryptor::new(
        config.encryption.key_b64.as_deref(),
        Arc::new(PipelineContext::default()),
    );
    if !encryptor.has_key() {
        return Err(CliError::Config(
            "no usable encryption key (set [encryption].key_b64 or LOG_ENCRYPTION_KEY)".to_owned(),
        ));
    }

    info!(file = %file.display(), "decrypting log file");
    let content = tokio::fs::read_to_string(file).await?;

    let mut report = DecryptReport {
        file: file.display().to_string(),
        entries: Vec::new(),
        plain: 0,
        skipped: 0,
    };

    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping line that is not JSON");
                report.skipped += 1;
                continue;
            }
        };
        for entry in log_entries(&value) {
            match encryptor.decrypt(&entry)? {
                Some(fields) => report.entries.push(DecryptedEntry {
                    line: line_no,
                    flag: entry.get("flag").and_then(Value::as_str).map(str::to_owned),
                    timestamp: entry
                        .get("timestamp")
                        .and_then(Value::as_str)
                        .map(str::to_owned),
                    fields,
                }),
                None => report.plain += 1,
            }
        }
    }

    Ok(report)
}

/// Decryption results for a whole file.
#[derive(Debug, Serialize)]
pub struct DecryptReport {
    pub file: String,
    /// Entries with at least one decrypted field
    pub entries: Vec<DecryptedEntry>,
    /// Entries (envelopes unwrapped) without encrypted fields
    pub plain: usize,
    /// Lines that were not JSON
    pub skipped: usize,
}

/// Decrypted fields of one entry.
#[derive(Debug, Serialize)]
pub struct DecryptedEntry {
    /// 1-based line number
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl Render for DecryptReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Decrypted {} ({} entries)", self.file.bold(), self.entries.len())?;
        for entry in &self.entries {
            writeln!(
                w,
                "  line {} {} {}",
                entry.line,
                entry.flag.as_deref().unwrap_or("-").bold(),
                entry.timestamp.as_deref().unwrap_or("")
            )?;
            for (name, value) in &entry.fields {
                writeln!(w, "    {}: {}", name.cyan(), value)?;
            }
        }
        if self.plain > 0 {
            writeln!(w, "  {} entries without encrypted fields", self.plain)?;
        }
        if self.skipped > 0 {
            writeln!(w, "  {} {}", self.skipped, "non-JSON lines skipped".yellow())?;
        }
        Ok(())
    }
}
