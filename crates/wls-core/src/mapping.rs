//! Source project/task to destination project/task mapping.
//!
//! # Resolution order
//!
//! 1. An entry for the exact `(project, task)` pair, including `task = None`.
//! 2. If a task was given, the project-level entry `(project, None)`.
//!
//! A project-level entry therefore never shadows a task-specific one.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{DestProjectId, DestTaskId, MappingAction};

/// What happens to entries matching a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum MappingOutcome {
    /// Entries are intentionally not sent anywhere.
    Skip,
    /// Entries go to this destination project and optional task.
    #[serde(rename = "map")]
    Mapped {
        project_id: DestProjectId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_id: Option<DestTaskId>,
    },
}

impl MappingOutcome {
    pub const fn action(&self) -> MappingAction {
        match self {
            Self::Skip => MappingAction::Skip,
            Self::Mapped { .. } => MappingAction::Map,
        }
    }
}

impl fmt::Display for MappingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Mapped {
                project_id,
                task_id: Some(task_id),
            } => write!(f, "project {project_id} / task {task_id}"),
            Self::Mapped {
                project_id,
                task_id: None,
            } => write!(f, "project {project_id}"),
        }
    }
}

/// A source project name with an optional task name.
///
/// Renders as `project` or `project:task`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MappingKey {
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
}

impl MappingKey {
    pub fn new(project: impl Into<String>, task: Option<impl Into<String>>) -> Self {
        Self {
            project: project.into(),
            task: task.map(Into::into),
        }
    }

    /// Key covering every task under `project`.
    pub fn project(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            task: None,
        }
    }
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.task {
            Some(task) => write!(f, "{}:{task}", self.project),
            None => write!(f, "{}", self.project),
        }
    }
}

/// One configured correspondence.
///
/// `source_task = None` applies to any task under the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub source_project: String,
    #[serde(default)]
    pub source_task: Option<String>,
    #[serde(flatten)]
    pub target: MappingOutcome,
}

impl MappingEntry {
    pub fn new(key: MappingKey, target: MappingOutcome) -> Self {
        Self {
            source_project: key.project,
            source_task: key.task,
            target,
        }
    }

    pub fn key(&self) -> MappingKey {
        MappingKey {
            project: self.source_project.clone(),
            task: self.source_task.clone(),
        }
    }

    fn matches(&self, project: &str, task: Option<&str>) -> bool {
        self.source_project == project && self.source_task.as_deref() == task
    }
}

/// The full mapping configuration for one run.
///
/// Holds at most one entry per `(source_project, source_task)` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingTable {
    entries: Vec<MappingEntry>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table, later duplicates replacing earlier ones.
    pub fn from_entries(entries: impl IntoIterator<Item = MappingEntry>) -> Self {
        let mut table = Self::new();
        for entry in entries {
            table.upsert(entry);
        }
        table
    }

    /// Adds an entry, replacing any entry for the same pair.
    ///
    /// Returns the replaced entry.
    pub fn upsert(&mut self, entry: MappingEntry) -> Option<MappingEntry> {
        let previous = self.remove(&entry.source_project, entry.source_task.as_deref());
        self.entries.push(entry);
        previous
    }

    /// Removes the entry for exactly this pair.
    pub fn remove(&mut self, project: &str, task: Option<&str>) -> Option<MappingEntry> {
        let idx = self.entries.iter().position(|e| e.matches(project, task))?;
        Some(self.entries.remove(idx))
    }

    /// Exact lookup without the project-level fallback.
    pub fn get(&self, project: &str, task: Option<&str>) -> Option<&MappingEntry> {
        self.entries.iter().find(|e| e.matches(project, task))
    }

    /// Resolves a source pair using the two-tier lookup.
    pub fn resolve(&self, project: &str, task: Option<&str>) -> Option<&MappingOutcome> {
        self.get(project, task)
            .or_else(|| task.and_then(|_| self.get(project, None)))
            .map(|entry| &entry.target)
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decides what to do with a source pair that has no mapping yet.
///
/// Implementations run before the engine (e.g. asking the user); the engine
/// itself never calls one.
pub trait UnmappedResolver {
    /// Returns the outcome to store for `key`, or `None` to leave it unmapped.
    fn resolve_unmapped(&mut self, key: &MappingKey) -> Option<MappingOutcome>;
}

/// Resolver that marks every unmapped pair as skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipUnmapped;

impl UnmappedResolver for SkipUnmapped {
    fn resolve_unmapped(&mut self, _key: &MappingKey) -> Option<MappingOutcome> {
        Some(MappingOutcome::Skip)
    }
}
