//! Health checks for the vault and the language-model configuration.
//!
//! Backs the `health` command. The report serializes to JSON for scripts and
//! can be printed as a short colored summary for humans.

use std::io::{self, Write};

use serde::Serialize;

use crate::llm::Assistant;
use crate::models::ListOptions;
use crate::utils::now_timestamp;
use crate::vault::VaultStore;

// ANSI color codes for terminal output
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Health of one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    /// Usable, with reduced functionality.
    Warning(String),
    /// Not usable.
    Error(String),
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, HealthStatus::Ok)
    }
}

/// Result of [`check`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// `healthy` when the vault is usable, `unhealthy` otherwise.
    pub status: &'static str,
    pub timestamp: String,
    pub vault_accessible: bool,
    pub vault_path: String,
    pub vault: HealthStatus,
    /// Notes that could be read and parsed, when the vault could be scanned.
    /// Files with broken frontmatter are not counted.
    pub note_count: Option<usize>,
    pub llm_configured: bool,
    pub llm: HealthStatus,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.vault_accessible
    }
}

/// Checks that the vault root is readable and whether a model is configured.
///
/// A missing model is a warning, not an error: notes can still be read and
/// written without one.
pub fn check(store: &VaultStore, assistant: &dyn Assistant) -> HealthReport {
    let root = store.root();
    let (vault, note_count) = if !root.is_dir() {
        (
            HealthStatus::Error(format!("{} is not a directory", root.display())),
            None,
        )
    } else {
        match store.list_notes(&ListOptions::default()) {
            Ok(notes) if notes.is_empty() => (
                HealthStatus::Warning("Vault contains no notes".to_string()),
                Some(0),
            ),
            Ok(notes) => (HealthStatus::Ok, Some(notes.len())),
            Err(e) => (HealthStatus::Error(format!("Scan failed: {e}")), None),
        }
    };

    let llm_configured = assistant.is_configured();
    let llm = if llm_configured {
        HealthStatus::Ok
    } else {
        HealthStatus::Warning(
            "No API key configured; captures use the fallback classification".to_string(),
        )
    };

    let vault_accessible = !matches!(vault, HealthStatus::Error(_));
    HealthReport {
        status: if vault_accessible { "healthy" } else { "unhealthy" },
        timestamp: now_timestamp(),
        vault_accessible,
        vault_path: root.display().to_string(),
        vault,
        note_count,
        llm_configured,
        llm,
    }
}

/// Prints a human-readable report to `out`.
pub fn print_report(report: &HealthReport, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{BOLD}kvault health{RESET}  {}", report.timestamp)?;
    writeln!(out)?;

    let vault_detail = match report.note_count {
        Some(count) => format!("{} ({count} notes)", report.vault_path),
        None => report.vault_path.clone(),
    };
    write_component(out, "Vault", &report.vault, &vault_detail)?;
    write_component(out, "LLM", &report.llm, "")?;

    writeln!(out)?;
    let (color, label) = if report.is_healthy() {
        (GREEN, "healthy")
    } else {
        (RED, "unhealthy")
    };
    writeln!(out, "Overall: {color}{label}{RESET}")
}

fn write_component(
    out: &mut impl Write,
    name: &str,
    status: &HealthStatus,
    detail: &str,
) -> io::Result<()> {
    match status {
        HealthStatus::Ok => writeln!(out, "  {GREEN}✓{RESET} {name:<6} {detail}"),
        HealthStatus::Warning(msg) => {
            writeln!(out, "  {YELLOW}!{RESET} {name:<6} {detail}")?;
            writeln!(out, "           {YELLOW}{msg}{RESET}")
        }
        HealthStatus::Error(msg) => {
            writeln!(out, "  {RED}✗{RESET} {name:<6} {detail}")?;
            writeln!(out, "           {RED}{msg}{RESET}")
        }
    }
}
