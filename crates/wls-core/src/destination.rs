//! Destination project/task catalogue parsed from BambooHR timesheet data.
//!
//! BambooHR encodes empty `byId` collections as `[]` and populated ones as
//! objects keyed by id, so both shapes are accepted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mapping::MappingOutcome;
use crate::types::{DestProjectId, DestTaskId};

#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("invalid timesheet data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("destination project {id} does not exist")]
    UnknownProject { id: DestProjectId },

    #[error("destination task {task} does not belong to project {project}")]
    UnknownTask {
        project: DestProjectId,
        task: DestTaskId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationTask {
    pub id: DestTaskId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationProject {
    pub id: DestProjectId,
    pub name: String,
    pub tasks: Vec<DestinationTask>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ById<T> {
    Populated(BTreeMap<String, T>),
    Empty(Vec<serde_json::Value>),
}

impl<T> Default for ById<T> {
    fn default() -> Self {
        Self::Empty(Vec::new())
    }
}

impl<T> ById<T> {
    fn into_values(self) -> Vec<T> {
        match self {
            Self::Populated(map) => map.into_values().collect(),
            Self::Empty(_) => Vec::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Collection<T> {
    #[serde(default = "ById::default")]
    by_id: ById<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            by_id: ById::default(),
        }
    }
}

#[derive(Deserialize)]
struct RawTask {
    id: DestTaskId,
    name: String,
}

#[derive(Deserialize)]
struct RawProject {
    id: DestProjectId,
    name: String,
    #[serde(default)]
    tasks: Collection<RawTask>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimesheetData {
    #[serde(default)]
    projects_with_tasks: Collection<RawProject>,
}

/// Projects (with tasks) the employee may log hours against, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Catalogue {
    projects: Vec<DestinationProject>,
}

impl Catalogue {
    /// Parses the `timesheetData` JSON blob embedded in the BambooHR time
    /// tracking page.
    pub fn parse(json: &str) -> Result<Self, CatalogueError> {
        let data: TimesheetData = serde_json::from_str(json)?;
        let mut projects: Vec<DestinationProject> = data
            .projects_with_tasks
            .by_id
            .into_values()
            .into_iter()
            .map(|project| {
                let mut tasks: Vec<DestinationTask> = project
                    .tasks
                    .by_id
                    .into_values()
                    .into_iter()
                    .map(|task| DestinationTask {
                        id: task.id,
                        name: task.name,
                    })
                    .collect();
                tasks.sort_by(|a, b| a.name.cmp(&b.name));
                DestinationProject {
                    id: project.id,
                    name: project.name,
                    tasks,
                }
            })
            .collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self { projects })
    }

    pub fn projects(&self) -> &[DestinationProject] {
        &self.projects
    }

    pub fn project(&self, id: DestProjectId) -> Option<&DestinationProject> {
        self.projects.iter().find(|project| project.id == id)
    }

    /// Checks that a mapping target exists in this catalogue.
    pub fn check(&self, outcome: &MappingOutcome) -> Result<(), CatalogueError> {
        let MappingOutcome::Mapped {
            project_id,
            task_id,
        } = *outcome
        else {
            return Ok(());
        };
        let project = self
            .project(project_id)
            .ok_or(CatalogueError::UnknownProject { id: project_id })?;
        match task_id {
            Some(task) if !project.tasks.iter().any(|t| t.id == task) => {
                Err(CatalogueError::UnknownTask {
                    project: project_id,
                    task,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Shorthand for [`Catalogue::parse`] returning the project list.
pub fn parse_timesheet_data(json: &str) -> Result<Vec<DestinationProject>, CatalogueError> {
    Catalogue::parse(json).map(|catalogue| catalogue.projects)
}
