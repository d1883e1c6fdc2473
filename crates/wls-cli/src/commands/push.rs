//! Push Clockify entries into BambooHR timesheets.

use std::collections::BTreeSet;
use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use clap::Args;
use tokio::runtime::Runtime;
use wls_core::{
    EntryWriter, PushEntry, SkipUnmapped, SyncMode, SyncPlanner, SyncResult, fill_unmapped,
};
use wls_db::SyncRun;
use wls_http::{BambooClient, HttpError};

use super::util::{bamboo_client, clockify_client, fetch_source, open_database, parse_date};
use crate::Config;

/// Look-back window when no previous sync is recorded.
const DEFAULT_LOOKBACK_DAYS: i64 = 30;

#[derive(Debug, Args)]
pub struct PushArgs {
    /// First day to push (defaults to the last sync date, or 30 days ago).
    #[arg(long, value_parser = parse_date)]
    pub from: Option<NaiveDate>,

    /// Last day to push, inclusive (defaults to today).
    #[arg(long, value_parser = parse_date)]
    pub to: Option<NaiveDate>,

    /// Report what would be created without writing to BambooHR.
    #[arg(long)]
    pub dry_run: bool,

    /// Store a skip mapping for every unmapped project/task before pushing.
    #[arg(long)]
    pub skip_unmapped: bool,
}

/// Creates BambooHR entries for the planner, one blocking request at a time.
struct BambooWriter<'a> {
    runtime: &'a Runtime,
    client: &'a BambooClient,
    employee_id: u64,
}

impl EntryWriter for BambooWriter<'_> {
    type Error = HttpError;

    fn create(&mut self, entry: &PushEntry) -> Result<(), Self::Error> {
        let id = self
            .runtime
            .block_on(self.client.create_timesheet_entry(self.employee_id, entry))?;
        tracing::debug!(entry = %entry.source_id, ?id, "created timesheet entry");
        Ok(())
    }
}

/// Resolves the push window from flags, the last recorded sync and `now`.
///
/// Both the last sync date and today are calendar dates in `now`'s zone.
pub fn resolve_range<Z: TimeZone>(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    last_sync: Option<&SyncRun>,
    now: &DateTime<Z>,
) -> (NaiveDate, NaiveDate) {
    let today = now.date_naive();
    let from = from.unwrap_or_else(|| {
        last_sync.map_or_else(
            || today - Duration::days(DEFAULT_LOOKBACK_DAYS),
            |run| run.finished_at.with_timezone(&now.timezone()).date_naive(),
        )
    });
    (from, to.unwrap_or(today))
}

fn skip_notice(count: usize, dry_run: bool) -> String {
    let verb = if dry_run { "Would mark" } else { "Marked" };
    format!("{verb} {count} unmapped project(s) as skipped.")
}

pub fn run<W: Write>(writer: &mut W, args: &PushArgs, config: &Config) -> Result<()> {
    let mut db = open_database(config)?;
    let last_sync = db.last_sync_run().context("failed to read sync history")?;
    let (from, to) = resolve_range(args.from, args.to, last_sync.as_ref(), &Local::now());
    if to < from {
        bail!("--to ({to}) is before --from ({from})");
    }
    tracing::info!(%from, %to, dry_run = args.dry_run, "starting push");

    let clockify = clockify_client(config)?;
    let bamboo = bamboo_client(config)?;
    let mut mapping = db.load_mappings().context("failed to load mappings")?;

    let runtime = Runtime::new().context("failed to initialize tokio runtime")?;
    let source = runtime.block_on(fetch_source(&clockify, config, from, to))?;

    if args.skip_unmapped {
        let added = fill_unmapped(&source.entries, &source.names, &mut mapping, &mut SkipUnmapped);
        if !added.is_empty() {
            if !args.dry_run {
                db.upsert_mappings(&added).context("failed to save skip mappings")?;
            }
            writeln!(writer, "{}", skip_notice(added.len(), args.dry_run))?;
        }
    }

    let employee = runtime
        .block_on(bamboo.current_employee())
        .context("could not retrieve BambooHR employee information")?;
    let existing = runtime
        .block_on(bamboo.timesheet_entries(employee.id, from, to))
        .context("failed to fetch existing BambooHR timesheet entries")?;
    tracing::debug!(
        employee = employee.id,
        name = %employee.display_name(),
        existing = existing.len(),
        "loaded destination state"
    );

    let mode = if args.dry_run {
        SyncMode::DryRun
    } else {
        SyncMode::Apply
    };
    let mut entry_writer = BambooWriter {
        runtime: &runtime,
        client: &bamboo,
        employee_id: employee.id,
    };
    let result = SyncPlanner::new(&source.names, &mapping, source.tz, mode, &existing)
        .run(&source.entries, &mut entry_writer);

    write_summary(writer, &result, mode)?;

    let run = SyncRun::from_result(&result, from, to, args.dry_run, Utc::now());
    db.record_sync_run(&run).context("failed to record sync run")?;
    Ok(())
}

fn write_summary<W: Write>(writer: &mut W, result: &SyncResult, mode: SyncMode) -> Result<()> {
    if mode.is_dry_run() {
        writeln!(writer, "Dry run: nothing was written to BambooHR.")?;
    }
    writeln!(writer, "{result}")?;

    let unmapped: BTreeSet<String> = result.unmapped.iter().map(ToString::to_string).collect();
    if !unmapped.is_empty() {
        writeln!(writer, "Unmapped:")?;
        for item in &unmapped {
            writeln!(writer, "  - {item}")?;
        }
    }
    if !result.errors.is_empty() {
        writeln!(writer, "Errors:")?;
        for error in &result.errors {
            writeln!(writer, "  - {error}")?;
        }
    }
    Ok(())
}
