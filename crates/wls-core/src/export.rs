//! Export mode: merge adjacent entries, flag overlaps, build the document.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::convert::{Conversion, NameLookup, UnmappedEntry, convert_entry};
use crate::entry::{NormalizedEntry, RawTimeEntry};
use crate::mapping::{MappingKey, MappingTable};
use crate::normalize::format_hhmm;

/// Value of `metadata.source` in export documents.
pub const EXPORT_SOURCE: &str = "clockify";

const NOTE_SEPARATOR: &str = "; ";

/// Two entries on the same date whose intervals intersect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    pub date: NaiveDate,
    pub first: (NaiveTime, NaiveTime),
    pub second: (NaiveTime, NaiveTime),
}

impl fmt::Display for Overlap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Overlap on {}: {}-{} and {}-{}",
            self.date,
            format_hhmm(self.first.0),
            format_hhmm(self.first.1),
            format_hhmm(self.second.0),
            format_hhmm(self.second.1),
        )
    }
}

/// Sorts by `(date, start)`, keeping input order for ties.
pub fn sort_entries(entries: &mut [NormalizedEntry]) {
    entries.sort_by_key(|entry| (entry.date, entry.start));
}

/// Whether `next` picks up exactly where `prev` ends on the same target.
fn continues(prev: &NormalizedEntry, next: &NormalizedEntry) -> bool {
    prev.date == next.date
        && prev.end == next.start
        && prev.project_id == next.project_id
        && prev.task_id == next.task_id
}

fn join_notes(first: &str, second: &str) -> String {
    [first, second]
        .into_iter()
        .filter(|note| !note.is_empty())
        .collect::<Vec<_>>()
        .join(NOTE_SEPARATOR)
}

/// Merges chains of back-to-back entries with the same destination.
///
/// Input must already be sorted. Notes are joined with `"; "`, skipping
/// empty ones.
pub fn merge_adjacent(entries: Vec<NormalizedEntry>) -> Vec<NormalizedEntry> {
    let mut merged: Vec<NormalizedEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(last) = merged.last_mut() {
            if continues(last, &entry) {
                last.end = entry.end;
                last.note = join_notes(&last.note, &entry.note);
                continue;
            }
        }
        merged.push(entry);
    }
    merged
}

/// Finds every overlapping pair of entries on the same date.
///
/// Intervals touching at an endpoint do not overlap. Pairs are reported in
/// input order.
pub fn detect_overlaps(entries: &[NormalizedEntry]) -> Vec<Overlap> {
    let mut overlaps = Vec::new();
    for (i, a) in entries.iter().enumerate() {
        for b in &entries[i + 1..] {
            if a.date == b.date && a.start < b.end && b.start < a.end {
                overlaps.push(Overlap {
                    date: a.date,
                    first: (a.start, a.end),
                    second: (b.start, b.end),
                });
            }
        }
    }
    overlaps
}

/// Outcome of an export run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportResult {
    /// Sorted, merged entries ready to be written.
    pub entries: Vec<NormalizedEntry>,
    /// Human-readable overlap warnings.
    pub warnings: Vec<String>,
    /// One item per excluded entry, in input order.
    pub unmapped: Vec<UnmappedEntry>,
    /// Keys of entries excluded by a skip mapping, in input order.
    pub skipped: Vec<MappingKey>,
}

impl ExportResult {
    /// Distinct unmapped labels, sorted.
    pub fn distinct_unmapped(&self) -> BTreeSet<String> {
        self.unmapped.iter().map(ToString::to_string).collect()
    }
}

/// Runs export mode over a batch of raw entries.
pub fn build_export(
    raw: &[RawTimeEntry],
    names: &NameLookup,
    mapping: &MappingTable,
    tz: &Tz,
) -> ExportResult {
    let mut result = ExportResult::default();
    let mut converted = Vec::with_capacity(raw.len());

    for entry in raw {
        match convert_entry(entry, names, mapping, tz) {
            Conversion::Running => {}
            Conversion::Unmapped(unmapped) => result.unmapped.push(unmapped),
            Conversion::Skipped(key) => result.skipped.push(key),
            Conversion::Converted(c) => converted.push(c.entry),
        }
    }

    sort_entries(&mut converted);
    let merged = merge_adjacent(converted);
    result.warnings = detect_overlaps(&merged)
        .iter()
        .map(ToString::to_string)
        .collect();
    for warning in &result.warnings {
        tracing::warn!("{warning}");
    }

    tracing::info!(
        input = raw.len(),
        output = merged.len(),
        unmapped = result.unmapped.len(),
        skipped = result.skipped.len(),
        "export built"
    );
    result.entries = merged;
    result
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportMetadata {
    pub exported_at: DateTime<Utc>,
    pub source: &'static str,
    pub date_range: DateRange,
}

/// The JSON document written by `export`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportDocument {
    pub metadata: ExportMetadata,
    pub entries: Vec<NormalizedEntry>,
}

impl ExportDocument {
    pub fn new(
        result: &ExportResult,
        from: NaiveDate,
        to: NaiveDate,
        exported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            metadata: ExportMetadata {
                exported_at,
                source: EXPORT_SOURCE,
                date_range: DateRange { from, to },
            },
            entries: result.entries.clone(),
        }
    }
}
