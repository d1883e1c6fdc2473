//! Push mode: send converted entries to the destination, skipping duplicates.
//!
//! The planner owns a set of [`DedupKey`]s seeded from entries that already
//! exist at the destination. Every successful create (or dry-run "would
//! create") adds its key, so identical entries later in the same batch are
//! skipped as duplicates too. A failed create does not add its key.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::convert::{Conversion, ConvertedEntry, NameLookup, UnmappedEntry, convert_entry};
use crate::entry::RawTimeEntry;
use crate::mapping::{MappingKey, MappingTable};
use crate::types::{DestProjectId, DestTaskId, EntryId};

/// An hour-entry already recorded at the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingEntry {
    pub date: NaiveDate,
    pub project_id: DestProjectId,
    pub task_id: Option<DestTaskId>,
    pub hours: f64,
}

/// Identity of an hour-entry for duplicate suppression.
///
/// Hours are compared at 1/100 hour resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub date: NaiveDate,
    pub project_id: DestProjectId,
    pub task_id: Option<DestTaskId>,
    pub centi_hours: i64,
}

impl DedupKey {
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(
        date: NaiveDate,
        project_id: DestProjectId,
        task_id: Option<DestTaskId>,
        hours: f64,
    ) -> Self {
        Self {
            date,
            project_id,
            task_id,
            centi_hours: (hours * 100.0).round() as i64,
        }
    }
}

impl From<&ExistingEntry> for DedupKey {
    fn from(entry: &ExistingEntry) -> Self {
        Self::new(entry.date, entry.project_id, entry.task_id, entry.hours)
    }
}

/// An hour-entry to create at the destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushEntry {
    pub source_id: EntryId,
    pub date: NaiveDate,
    pub hours: f64,
    pub project_id: DestProjectId,
    pub task_id: Option<DestTaskId>,
    pub note: String,
}

impl From<&ConvertedEntry> for PushEntry {
    fn from(converted: &ConvertedEntry) -> Self {
        Self {
            source_id: converted.entry_id.clone(),
            date: converted.entry.date,
            hours: converted.hours,
            project_id: converted.entry.project_id,
            task_id: converted.entry.task_id,
            note: converted.entry.note.clone(),
        }
    }
}

/// Destination that can record hour-entries.
pub trait EntryWriter {
    type Error: fmt::Display;

    fn create(&mut self, entry: &PushEntry) -> Result<(), Self::Error>;
}

/// Whether creates are performed or only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    #[default]
    Apply,
    DryRun,
}

impl SyncMode {
    pub const fn is_dry_run(self) -> bool {
        matches!(self, Self::DryRun)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The mapping says to skip this source pair.
    Mapping,
    /// An identical entry exists at the destination or earlier in the batch.
    Duplicate,
}

/// What happened to a single source entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum SyncOutcome {
    Synced,
    Skipped(SkipReason),
    Failed(String),
    Unmapped(UnmappedEntry),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryReport {
    pub entry_id: EntryId,
    pub key: Option<MappingKey>,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

/// Aggregated result of a push run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
    pub unmapped: Vec<UnmappedEntry>,
    pub errors: Vec<String>,
    pub reports: Vec<EntryReport>,
}

impl SyncResult {
    fn record(&mut self, report: EntryReport) {
        match &report.outcome {
            SyncOutcome::Synced => self.synced += 1,
            SyncOutcome::Skipped(_) => self.skipped += 1,
            SyncOutcome::Failed(message) => {
                self.failed += 1;
                self.errors.push(format!("{}: {message}", report.entry_id));
            }
            SyncOutcome::Unmapped(unmapped) => self.unmapped.push(unmapped.clone()),
        }
        self.reports.push(report);
    }

    /// Number of source entries that reached a terminal outcome.
    pub fn processed(&self) -> usize {
        self.reports.len()
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Synced: {}, Skipped: {}, Failed: {}, Unmapped: {}",
            self.synced,
            self.skipped,
            self.failed,
            self.unmapped.len()
        )
    }
}

/// Plans and executes a push run over one batch of source entries.
pub struct SyncPlanner<'a> {
    names: &'a NameLookup,
    mapping: &'a MappingTable,
    tz: Tz,
    mode: SyncMode,
    seen: HashSet<DedupKey>,
}

impl<'a> SyncPlanner<'a> {
    pub fn new(
        names: &'a NameLookup,
        mapping: &'a MappingTable,
        tz: Tz,
        mode: SyncMode,
        existing: &[ExistingEntry],
    ) -> Self {
        Self {
            names,
            mapping,
            tz,
            mode,
            seen: existing.iter().map(DedupKey::from).collect(),
        }
    }

    /// Processes every entry in order. Individual failures never abort the run.
    pub fn run<W: EntryWriter>(mut self, entries: &[RawTimeEntry], writer: &mut W) -> SyncResult {
        let mut result = SyncResult::default();
        for raw in entries {
            let (key, outcome) = match convert_entry(raw, self.names, self.mapping, &self.tz) {
                Conversion::Running => continue,
                Conversion::Unmapped(unmapped) => {
                    tracing::debug!(entry = %raw.id, %unmapped, "unmapped");
                    (unmapped.key().cloned(), SyncOutcome::Unmapped(unmapped))
                }
                Conversion::Skipped(key) => {
                    tracing::debug!(entry = %raw.id, %key, "skipped by mapping");
                    (Some(key), SyncOutcome::Skipped(SkipReason::Mapping))
                }
                Conversion::Converted(converted) => {
                    let outcome = self.push(&converted, writer);
                    (Some(converted.key), outcome)
                }
            };
            result.record(EntryReport {
                entry_id: raw.id.clone(),
                key,
                outcome,
            });
        }
        tracing::info!(dry_run = self.mode.is_dry_run(), "{result}");
        result
    }

    fn push<W: EntryWriter>(&mut self, converted: &ConvertedEntry, writer: &mut W) -> SyncOutcome {
        let entry = PushEntry::from(converted);
        let dedup = DedupKey::new(entry.date, entry.project_id, entry.task_id, entry.hours);
        if self.seen.contains(&dedup) {
            tracing::info!(
                entry = %entry.source_id,
                date = %entry.date,
                hours = entry.hours,
                "already exists at destination"
            );
            return SyncOutcome::Skipped(SkipReason::Duplicate);
        }

        if self.mode.is_dry_run() {
            tracing::info!(
                entry = %entry.source_id,
                date = %entry.date,
                hours = entry.hours,
                project = %entry.project_id,
                "[dry run] would create"
            );
            self.seen.insert(dedup);
            return SyncOutcome::Synced;
        }

        match writer.create(&entry) {
            Ok(()) => {
                tracing::info!(
                    entry = %entry.source_id,
                    date = %entry.date,
                    hours = entry.hours,
                    "created"
                );
                self.seen.insert(dedup);
                SyncOutcome::Synced
            }
            Err(err) => {
                tracing::warn!(entry = %entry.source_id, error = %err, "create failed");
                SyncOutcome::Failed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::convert::fixtures::{mapping, names, raw};

    #[derive(Default)]
    struct RecordingWriter {
        created: Vec<PushEntry>,
        fail_on: Vec<&'static str>,
    }

    impl EntryWriter for RecordingWriter {
        type Error = String;

        fn create(&mut self, entry: &PushEntry) -> Result<(), Self::Error> {
            if self.fail_on.contains(&entry.source_id.as_str()) {
                return Err("HTTP 500: Internal Server Error".to_string());
            }
            self.created.push(entry.clone());
            Ok(())
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    fn two_hour_alpha(id: &str) -> RawTimeEntry {
        raw(id, Some("p1"), Some("t1"), "2026-02-25T08:00:00Z", Some("2026-02-25T10:00:00Z"), "Work")
    }

    fn run(mode: SyncMode, existing: &[ExistingEntry], entries: &[RawTimeEntry], writer: &mut RecordingWriter) -> SyncResult {
        let names = names();
        let mapping = mapping();
        SyncPlanner::new(&names, &mapping, Tz::UTC, mode, existing).run(entries, writer)
    }

    #[test]
    fn creates_mapped_entries() {
        let mut writer = RecordingWriter::default();
        let result = run(SyncMode::Apply, &[], &[two_hour_alpha("e1")], &mut writer);

        assert_eq!(result.synced, 1);
        assert_eq!(
            writer.created,
            vec![PushEntry {
                source_id: EntryId::new("e1").unwrap(),
                date: date(25),
                hours: 2.0,
                project_id: DestProjectId::new(10),
                task_id: Some(DestTaskId::new(24)),
                note: "Work".to_string(),
            }]
        );
    }

    #[test]
    fn skips_entry_already_at_destination() {
        let existing = [ExistingEntry {
            date: date(25),
            project_id: DestProjectId::new(10),
            task_id: Some(DestTaskId::new(24)),
            hours: 2.0,
        }];
        let mut writer = RecordingWriter::default();

        let result = run(SyncMode::Apply, &existing, &[two_hour_alpha("e1")], &mut writer);

        assert_eq!((result.synced, result.skipped), (0, 1));
        assert!(writer.created.is_empty());
        assert_eq!(
            result.reports[0].outcome,
            SyncOutcome::Skipped(SkipReason::Duplicate)
        );
    }

    #[test]
    fn different_hours_are_not_duplicates() {
        let existing = [ExistingEntry {
            date: date(25),
            project_id: DestProjectId::new(10),
            task_id: Some(DestTaskId::new(24)),
            hours: 1.5,
        }];
        let mut writer = RecordingWriter::default();

        let result = run(SyncMode::Apply, &existing, &[two_hour_alpha("e1")], &mut writer);
        assert_eq!(result.synced, 1);
    }

    #[test]
    fn identical_entries_in_one_batch_sync_once() {
        let mut writer = RecordingWriter::default();
        let result = run(
            SyncMode::Apply,
            &[],
            &[two_hour_alpha("e1"), two_hour_alpha("e2")],
            &mut writer,
        );

        assert_eq!((result.synced, result.skipped), (1, 1));
        assert_eq!(writer.created.len(), 1);
    }

    #[test]
    fn failure_is_recorded_and_does_not_abort() {
        let mut writer = RecordingWriter {
            fail_on: vec!["e1"],
            ..RecordingWriter::default()
        };
        let entries = [
            two_hour_alpha("e1"),
            raw("e2", Some("p_int"), None, "2026-02-25T13:00:00Z", Some("2026-02-25T14:00:00Z"), ""),
        ];

        let result = run(SyncMode::Apply, &[], &entries, &mut writer);

        assert_eq!((result.synced, result.failed), (1, 1));
        assert_eq!(result.errors, ["e1: HTTP 500: Internal Server Error"]);
    }

    #[test]
    fn failed_create_does_not_mark_key_as_seen() {
        let mut writer = RecordingWriter {
            fail_on: vec!["e1"],
            ..RecordingWriter::default()
        };
        let result = run(
            SyncMode::Apply,
            &[],
            &[two_hour_alpha("e1"), two_hour_alpha("e2")],
            &mut writer,
        );

        assert_eq!((result.synced, result.failed, result.skipped), (1, 1, 0));
    }

    #[test]
    fn dry_run_never_writes_but_counts_as_synced() {
        let mut writer = RecordingWriter::default();
        let result = run(
            SyncMode::DryRun,
            &[],
            &[two_hour_alpha("e1"), two_hour_alpha("e2")],
            &mut writer,
        );

        assert!(writer.created.is_empty());
        assert_eq!((result.synced, result.skipped), (1, 1));
    }

    #[test]
    fn classifies_unmapped_skipped_and_running() {
        let entries = [
            raw("e1", Some("p_unknown"), None, "2026-02-25T08:00:00Z", Some("2026-02-25T09:00:00Z"), ""),
            raw("e2", Some("p_lunch"), None, "2026-02-25T11:00:00Z", Some("2026-02-25T12:00:00Z"), ""),
            raw("e3", None, None, "2026-02-25T12:00:00Z", Some("2026-02-25T13:00:00Z"), "Mail"),
            raw("e4", Some("p1"), Some("t1"), "2026-02-25T13:00:00Z", None, ""),
        ];
        let mut writer = RecordingWriter::default();

        let result = run(SyncMode::Apply, &[], &entries, &mut writer);

        assert_eq!(result.processed(), 3);
        assert_eq!(result.skipped, 1);
        let unmapped: Vec<String> = result.unmapped.iter().map(ToString::to_string).collect();
        assert_eq!(unmapped, ["Unknown Project", "(no project) - Mail"]);
        assert_eq!(result.reports[1].key, Some(MappingKey::project("Lunch")));
        assert_eq!(result.reports[2].key, None);
    }

    #[test]
    fn summary_line() {
        let result = SyncResult {
            synced: 3,
            skipped: 1,
            failed: 0,
            unmapped: vec![UnmappedEntry::NoMapping(MappingKey::project("X"))],
            ..SyncResult::default()
        };
        assert_snapshot!(result.to_string(), @"Synced: 3, Skipped: 1, Failed: 0, Unmapped: 1");
    }

    #[test]
    fn dedup_key_rounds_to_hundredths() {
        let a = DedupKey::new(date(25), DestProjectId::new(1), None, 1.333_333);
        let b = DedupKey::new(date(25), DestProjectId::new(1), None, 1.33);
        assert_eq!(a, b);
    }
}
