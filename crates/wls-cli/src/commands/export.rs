//! Export Clockify entries as a BambooHR-ready JSON document.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use clap::Args;
use wls_core::{ExportDocument, ExportResult, build_export};

use super::util::{clockify_client, fetch_source, open_database, parse_date};
use crate::Config;

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// First day to export (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub from: NaiveDate,

    /// Last day to export, inclusive (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub to: NaiveDate,

    /// Write the JSON document here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Runs the export. JSON goes to `out` (or the output file), everything
/// meant for humans goes to `err`.
pub fn run<W: Write, E: Write>(
    out: &mut W,
    err: &mut E,
    args: &ExportArgs,
    config: &Config,
) -> Result<()> {
    if args.to < args.from {
        bail!("--to ({}) is before --from ({})", args.to, args.from);
    }

    let db = open_database(config)?;
    let mapping = db.load_mappings().context("failed to load mappings")?;
    if mapping.is_empty() {
        bail!("no mappings configured; add one with `wls mapping add`");
    }

    let client = clockify_client(config)?;
    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    let source = runtime.block_on(fetch_source(&client, config, args.from, args.to))?;

    if source.entries.is_empty() {
        writeln!(err, "No time entries found for the given date range.")?;
        return Ok(());
    }

    let result = build_export(&source.entries, &source.names, &mapping, &source.tz);
    write_report(err, &result)?;

    let document = ExportDocument::new(&result, args.from, args.to, Utc::now());
    let json = serde_json::to_string_pretty(&document)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            writeln!(
                err,
                "Exported {} entries to {}",
                result.entries.len(),
                path.display()
            )?;
        }
        None => {
            writeln!(out, "{json}")?;
            writeln!(err, "Exported {} entries.", result.entries.len())?;
        }
    }
    Ok(())
}

/// Writes overlap warnings, the distinct unmapped list and skip counts.
fn write_report<E: Write>(err: &mut E, result: &ExportResult) -> Result<()> {
    for warning in &result.warnings {
        writeln!(err, "Warning: {warning}")?;
    }

    let unmapped = result.distinct_unmapped();
    if !unmapped.is_empty() {
        writeln!(err, "Unmapped entries (skipped):")?;
        for item in &unmapped {
            writeln!(err, "  - {item}")?;
        }
    }

    if !result.skipped.is_empty() {
        writeln!(err, "Skipped by mapping: {} entries", result.skipped.len())?;
    }
    Ok(())
}
