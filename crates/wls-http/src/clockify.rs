//! Clockify REST client.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use wls_core::{NameLookup, RawTimeEntry, SourceProjectId, SourceTaskId};

use crate::{HttpError, RetryPolicy, build_http, join_url, validate_api_key};

pub const CLOCKIFY_BASE_URL: &str = "https://api.clockify.me/api/v1";

/// Page size for list endpoints. A shorter page ends pagination.
pub const PAGE_SIZE: usize = 50;

/// The authenticated Clockify user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockifyUser {
    pub id: String,
    #[serde(default)]
    pub default_workspace: Option<String>,
    #[serde(default)]
    pub active_workspace: Option<String>,
    #[serde(default)]
    settings: UserSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserSettings {
    #[serde(default)]
    time_zone: Option<String>,
}

impl ClockifyUser {
    /// IANA zone name from the user's profile settings.
    pub fn time_zone(&self) -> Option<&str> {
        self.settings.time_zone.as_deref()
    }

    /// Workspace to use when none is configured.
    pub fn workspace(&self) -> Option<&str> {
        self.active_workspace
            .as_deref()
            .or(self.default_workspace.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    pub id: SourceProjectId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Task {
    pub id: SourceTaskId,
    pub name: String,
}

/// Clockify API client (`X-Api-Key` authentication).
#[derive(Clone)]
pub struct ClockifyClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl fmt::Debug for ClockifyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockifyClient")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ClockifyClient {
    /// Creates a client for the public Clockify API.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is blank or the HTTP client fails to build.
    pub fn new(api_key: impl Into<String>) -> Result<Self, HttpError> {
        let api_key = api_key.into();
        validate_api_key(&api_key)?;
        Ok(Self {
            http: build_http()?,
            api_key,
            base_url: CLOCKIFY_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, HttpError> {
        let url = self.url(path);
        let response = self
            .retry
            .send(|| {
                self.http
                    .get(&url)
                    .header("X-Api-Key", &self.api_key)
                    .query(query)
            })
            .await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|err| HttpError::InvalidResponse(err.to_string()))
    }

    /// Fetches every page of a list endpoint.
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, HttpError> {
        let mut items = Vec::new();
        let mut page = 1_usize;
        loop {
            let mut params = query.to_vec();
            params.push(("page", page.to_string()));
            params.push(("page-size", PAGE_SIZE.to_string()));

            let batch: Vec<T> = self.get_json(path, &params).await?;
            let len = batch.len();
            items.extend(batch);
            if len < PAGE_SIZE {
                break;
            }
            page += 1;
        }
        tracing::debug!(path, count = items.len(), pages = page, "fetched list");
        Ok(items)
    }

    pub async fn current_user(&self) -> Result<ClockifyUser, HttpError> {
        self.get_json("/user", &[]).await
    }

    pub async fn list_projects(&self, workspace_id: &str) -> Result<Vec<Project>, HttpError> {
        self.get_all(&format!("/workspaces/{workspace_id}/projects"), &[])
            .await
    }

    pub async fn list_tasks(
        &self,
        workspace_id: &str,
        project_id: &SourceProjectId,
    ) -> Result<Vec<Task>, HttpError> {
        self.get_all(
            &format!("/workspaces/{workspace_id}/projects/{project_id}/tasks"),
            &[],
        )
        .await
    }

    /// Time entries of `user_id` starting within `[start, end]`.
    pub async fn time_entries(
        &self,
        workspace_id: &str,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawTimeEntry>, HttpError> {
        let query = window_query(start, end);
        self.get_all(
            &format!("/workspaces/{workspace_id}/user/{user_id}/time-entries"),
            &query,
        )
        .await
    }

    /// Builds the project and task name lookup for a workspace.
    pub async fn name_lookup(&self, workspace_id: &str) -> Result<NameLookup, HttpError> {
        let mut names = NameLookup::new();
        for project in self.list_projects(workspace_id).await? {
            for task in self.list_tasks(workspace_id, &project.id).await? {
                names.insert_task(task.id, task.name);
            }
            names.insert_project(project.id, project.name);
        }
        tracing::debug!(
            projects = names.project_count(),
            tasks = names.task_count(),
            "built name lookup"
        );
        Ok(names)
    }
}

fn window_query(start: DateTime<Utc>, end: DateTime<Utc>) -> [(&'static str, String); 2] {
    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
    [
        ("start", start.format(FORMAT).to_string()),
        ("end", end.format(FORMAT).to_string()),
    ]
}
