//! Raw source entry to normalized entry conversion.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono_tz::Tz;
use serde::Serialize;

use crate::entry::{NormalizedEntry, RawTimeEntry};
use crate::mapping::{MappingEntry, MappingKey, MappingOutcome, MappingTable, UnmappedResolver};
use crate::normalize::LocalInterval;
use crate::types::{EntryId, SourceProjectId, SourceTaskId};

/// Source project/task names keyed by source id.
///
/// Built ahead of time by listing the source workspace's projects and tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameLookup {
    projects: HashMap<SourceProjectId, String>,
    tasks: HashMap<SourceTaskId, String>,
}

impl NameLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_project(&mut self, id: SourceProjectId, name: impl Into<String>) {
        self.projects.insert(id, name.into());
    }

    pub fn insert_task(&mut self, id: SourceTaskId, name: impl Into<String>) {
        self.tasks.insert(id, name.into());
    }

    /// Project name for `id`; blank names count as unknown.
    pub fn project_name(&self, id: Option<&SourceProjectId>) -> Option<&str> {
        id.and_then(|id| self.projects.get(id))
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Task name for `id`; unknown task ids read as "no task".
    pub fn task_name(&self, id: Option<&SourceTaskId>) -> Option<&str> {
        id.and_then(|id| self.tasks.get(id))
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

/// Why an entry could not be mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedReason {
    /// The entry has no project, or its project is unknown.
    NoProject,
    /// The project (and task) have no mapping entry.
    NoMapping,
}

/// A source entry that was reported but left out of the output.
///
/// `Display` renders `(no project) - <note-or-id>` for entries without a
/// project and `<project>` / `<project>:<task>` for missing mappings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnmappedEntry {
    NoProject { label: String },
    NoMapping(MappingKey),
}

impl UnmappedEntry {
    pub const fn reason(&self) -> UnmappedReason {
        match self {
            Self::NoProject { .. } => UnmappedReason::NoProject,
            Self::NoMapping(_) => UnmappedReason::NoMapping,
        }
    }

    /// The mapping key, when the project was known.
    pub const fn key(&self) -> Option<&MappingKey> {
        match self {
            Self::NoProject { .. } => None,
            Self::NoMapping(key) => Some(key),
        }
    }
}

impl fmt::Display for UnmappedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoProject { label } => write!(f, "(no project) - {label}"),
            Self::NoMapping(key) => write!(f, "{key}"),
        }
    }
}

/// A successfully mapped entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedEntry {
    pub entry_id: EntryId,
    pub key: MappingKey,
    pub entry: NormalizedEntry,
    /// Decimal hours reported by the source.
    pub hours: f64,
}

/// Result of converting one raw entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
    /// Timer still running; dropped without a trace in any result list.
    Running,
    Unmapped(UnmappedEntry),
    /// Mapped to [`MappingOutcome::Skip`].
    Skipped(MappingKey),
    Converted(ConvertedEntry),
}

/// Mapping key for a finished entry with a known project.
fn source_key(raw: &RawTimeEntry, names: &NameLookup) -> Result<MappingKey, UnmappedEntry> {
    let Some(project) = names.project_name(raw.project_id.as_ref()) else {
        return Err(UnmappedEntry::NoProject {
            label: raw.label().to_string(),
        });
    };
    let task = names.task_name(raw.task_id.as_ref());
    Ok(MappingKey::new(project, task))
}

/// Converts one raw entry into its normalized form or an exclusion outcome.
pub fn convert_entry(
    raw: &RawTimeEntry,
    names: &NameLookup,
    mapping: &MappingTable,
    tz: &Tz,
) -> Conversion {
    let Some(end) = raw.time_interval.end else {
        tracing::debug!(entry = %raw.id, "skipping running timer");
        return Conversion::Running;
    };

    let key = match source_key(raw, names) {
        Ok(key) => key,
        Err(unmapped) => return Conversion::Unmapped(unmapped),
    };

    let (project_id, task_id) = match mapping.resolve(&key.project, key.task.as_deref()) {
        None => return Conversion::Unmapped(UnmappedEntry::NoMapping(key)),
        Some(MappingOutcome::Skip) => return Conversion::Skipped(key),
        Some(&MappingOutcome::Mapped {
            project_id,
            task_id,
        }) => (project_id, task_id),
    };

    let interval = LocalInterval::from_utc(raw.time_interval.start, end, tz);
    Conversion::Converted(ConvertedEntry {
        entry_id: raw.id.clone(),
        hours: raw.hours().unwrap_or_default(),
        key,
        entry: NormalizedEntry {
            date: interval.date,
            start: interval.start,
            end: interval.end,
            note: raw.description.clone().unwrap_or_default(),
            project_id,
            task_id,
        },
    })
}

/// Distinct keys of finished entries that have no mapping, in first-seen order.
///
/// Entries without a known project are not included: there is nothing to map.
pub fn unmapped_keys(
    entries: &[RawTimeEntry],
    names: &NameLookup,
    mapping: &MappingTable,
) -> Vec<MappingKey> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|raw| !raw.is_running())
        .filter_map(|raw| source_key(raw, names).ok())
        .filter(|key| mapping.resolve(&key.project, key.task.as_deref()).is_none())
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

/// Asks `resolver` about every unmapped key and stores its answers in `mapping`.
///
/// Returns the entries that were added, so the caller can persist them.
pub fn fill_unmapped<R: UnmappedResolver + ?Sized>(
    entries: &[RawTimeEntry],
    names: &NameLookup,
    mapping: &mut MappingTable,
    resolver: &mut R,
) -> Vec<MappingEntry> {
    let mut added = Vec::new();
    for key in unmapped_keys(entries, names, mapping) {
        let Some(outcome) = resolver.resolve_unmapped(&key) else {
            continue;
        };
        tracing::debug!(%key, %outcome, "resolved unmapped key");
        let entry = MappingEntry::new(key, outcome);
        mapping.upsert(entry.clone());
        added.push(entry);
    }
    added
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::entry::TimeInterval;
    use crate::types::{DestProjectId, DestTaskId};

    pub fn raw(
        id: &str,
        project: Option<&str>,
        task: Option<&str>,
        start: &str,
        end: Option<&str>,
        description: &str,
    ) -> RawTimeEntry {
        let parse = |s: &str| s.parse::<DateTime<Utc>>().unwrap();
        RawTimeEntry {
            id: EntryId::new(id).unwrap(),
            description: Some(description.to_string()),
            project_id: project.map(|p| SourceProjectId::new(p).unwrap()),
            task_id: task.map(|t| SourceTaskId::new(t).unwrap()),
            time_interval: TimeInterval {
                start: parse(start),
                end: end.map(parse),
                duration: None,
            },
        }
    }

    pub fn names() -> NameLookup {
        let mut names = NameLookup::new();
        names.insert_project(SourceProjectId::new("p1").unwrap(), "Project Alpha");
        names.insert_project(SourceProjectId::new("p_int").unwrap(), "Internal");
        names.insert_project(SourceProjectId::new("p_unknown").unwrap(), "Unknown Project");
        names.insert_project(SourceProjectId::new("p_lunch").unwrap(), "Lunch");
        names.insert_task(SourceTaskId::new("t1").unwrap(), "Development");
        names.insert_task(SourceTaskId::new("t2").unwrap(), "Review");
        names.insert_task(SourceTaskId::new("t3").unwrap(), "Ops");
        names
    }

    pub fn mapped(project: u64, task: Option<u64>) -> MappingOutcome {
        MappingOutcome::Mapped {
            project_id: DestProjectId::new(project),
            task_id: task.map(DestTaskId::new),
        }
    }

    pub fn mapping() -> MappingTable {
        MappingTable::from_entries([
            MappingEntry::new(
                MappingKey::new("Project Alpha", Some("Development")),
                mapped(10, Some(24)),
            ),
            MappingEntry::new(
                MappingKey::new("Project Alpha", Some("Review")),
                mapped(10, Some(25)),
            ),
            MappingEntry::new(MappingKey::project("Internal"), mapped(5, None)),
            MappingEntry::new(MappingKey::project("Lunch"), MappingOutcome::Skip),
        ])
    }
}
