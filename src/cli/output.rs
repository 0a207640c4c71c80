//! Shared output formatting utilities for CLI commands
//!
//! Supports JSON, YAML, and table output for the `list` verb.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::CertificateIdentity;

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
    #[default]
    Table,
}

/// Print data as JSON
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    println!("{}", render_json(data)?);
    Ok(())
}

/// Print data as YAML
pub fn print_yaml<T: Serialize>(data: &T) -> Result<()> {
    println!("{}", render_yaml(data)?);
    Ok(())
}

pub fn render_json<T: Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data).context("Failed to serialize to JSON")
}

pub fn render_yaml<T: Serialize>(data: &T) -> Result<String> {
    serde_yaml::to_string(data).context("Failed to serialize to YAML")
}

/// Truncate string to maximum length with ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

const TABLE_COLUMNS: [(&str, usize); 5] =
    [("Name", 30), ("Secret", 45), ("Thumbprint", 40), ("State", 10), ("Expires", 20)];

/// Render identities as a fixed-width table.
pub fn render_table(identities: &[CertificateIdentity]) -> String {
    let mut out = String::new();
    let mut header = String::new();
    for (name, width) in TABLE_COLUMNS {
        header.push_str(&format!("{:<width$} ", name, width = width));
    }
    out.push_str(header.trim_end());
    out.push('\n');

    let total_width: usize = TABLE_COLUMNS.iter().map(|(_, w)| w + 1).sum();
    out.push_str(&"-".repeat(total_width.saturating_sub(1)));
    out.push('\n');

    for identity in identities {
        let expires = identity
            .expires_on
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let row = format!(
            "{:<30} {:<45} {:<40} {:<10} {}",
            truncate(identity.display_name(), 30),
            truncate(&identity.secret_name, 45),
            identity.thumbprint.as_deref().unwrap_or("-"),
            identity.certificate_state.as_deref().unwrap_or("-"),
            expires
        );
        out.push_str(row.trim_end());
        out.push('\n');
    }
    out
}

pub fn print_identities(identities: &[CertificateIdentity], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&identities),
        OutputFormat::Yaml => print_yaml(&identities),
        OutputFormat::Table => {
            print!("{}", render_table(identities));
            Ok(())
        }
    }
}
