//! Status command: mapping count and the last recorded push.

use std::io::Write;

use anyhow::{Context, Result};

use super::util::open_database;
use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let db = open_database(config)?;
    let mappings = db.mapping_count().context("failed to count mappings")?;
    let last = db.last_sync_run().context("failed to read sync history")?;

    writeln!(writer, "Work log sync status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "Mappings: {mappings}")?;

    match last {
        Some(run) => writeln!(
            writer,
            "Last sync: {} ({} to {}): synced {}, skipped {}, failed {}, unmapped {}",
            run.finished_at.format("%Y-%m-%d %H:%M UTC"),
            run.from,
            run.to,
            run.synced,
            run.skipped,
            run.failed,
            run.unmapped,
        )?,
        None => writeln!(writer, "Last sync: never")?,
    }

    Ok(())
}
