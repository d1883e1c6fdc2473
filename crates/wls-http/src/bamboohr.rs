//! BambooHR REST client for timesheet entries.

use std::fmt;

use chrono::NaiveDate;
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use wls_core::{DestProjectId, DestTaskId, ExistingEntry, PushEntry};

use crate::{HttpError, RetryPolicy, build_http, join_url, validate_api_key};

pub const BAMBOOHR_BASE_URL: &str = "https://api.bamboohr.com/api/gateway.php";

/// Employee id that BambooHR resolves to the API key's owner.
const CURRENT_EMPLOYEE: u64 = 0;

/// BambooHR returns ids as numbers or numeric strings depending on endpoint.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(u64),
    Text(String),
}

impl IdRepr {
    fn into_id(self) -> Option<u64> {
        match self {
            Self::Number(id) => Some(id),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

fn flexible_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    IdRepr::deserialize(deserializer)?
        .into_id()
        .ok_or_else(|| serde::de::Error::custom("expected a numeric id"))
}

/// Empty strings, `null` and `0` all mean "no id".
fn optional_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(Option::<IdRepr>::deserialize(deserializer)?
        .and_then(IdRepr::into_id)
        .filter(|id| *id != 0))
}

/// A BambooHR employee.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    #[serde(deserialize_with = "flexible_id")]
    pub id: u64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl Employee {
    pub fn display_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimesheetRecord {
    date: NaiveDate,
    hours: f64,
    #[serde(deserialize_with = "flexible_id")]
    project_id: u64,
    #[serde(default, deserialize_with = "optional_id")]
    task_id: Option<u64>,
}

impl From<TimesheetRecord> for ExistingEntry {
    fn from(record: TimesheetRecord) -> Self {
        Self {
            date: record.date,
            project_id: DestProjectId::new(record.project_id),
            task_id: record.task_id.map(DestTaskId::new),
            hours: record.hours,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TimesheetList {
    #[serde(default)]
    timesheets: Vec<TimesheetRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTimesheet<'a> {
    employee_id: String,
    date: String,
    hours: f64,
    project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<String>,
    notes: &'a str,
}

impl<'a> CreateTimesheet<'a> {
    fn new(employee_id: u64, entry: &'a PushEntry) -> Self {
        Self {
            employee_id: employee_id.to_string(),
            date: entry.date.format("%Y-%m-%d").to_string(),
            hours: entry.hours,
            project_id: entry.project_id.to_string(),
            task_id: entry.task_id.map(|id| id.to_string()),
            notes: &entry.note,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Created {
    #[serde(default, deserialize_with = "optional_id")]
    id: Option<u64>,
}

/// BambooHR API client (basic auth with the API key as user name).
#[derive(Clone)]
pub struct BambooClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl fmt::Debug for BambooClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BambooClient")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl BambooClient {
    /// Creates a client for the company subdomain `domain`.
    pub fn new(domain: &str, api_key: impl Into<String>) -> Result<Self, HttpError> {
        let api_key = api_key.into();
        validate_api_key(&api_key)?;
        Ok(Self {
            http: build_http()?,
            api_key,
            base_url: join_url(BAMBOOHR_BASE_URL, &format!("/{domain}")),
            retry: RetryPolicy::default(),
        })
    }

    /// Overrides the full base URL, company domain included.
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
                    .basic_auth(&self.api_key, Some("x"))
                    .header(reqwest::header::ACCEPT, "application/json")
                    .query(query)
            })
            .await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|err| HttpError::InvalidResponse(err.to_string()))
    }

    /// The employee that owns the API key.
    pub async fn current_employee(&self) -> Result<Employee, HttpError> {
        self.get_json(&format!("/v1/employees/{CURRENT_EMPLOYEE}"), &[])
            .await
    }

    /// Hour-entries already recorded for `employee_id` within `[from, to]`.
    pub async fn timesheet_entries(
        &self,
        employee_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ExistingEntry>, HttpError> {
        let query = [
            ("start", from.format("%Y-%m-%d").to_string()),
            ("end", to.format("%Y-%m-%d").to_string()),
        ];
        let list: TimesheetList = self
            .get_json(&format!("/v1/employees/{employee_id}/timesheets"), &query)
            .await?;
        tracing::debug!(employee_id, count = list.timesheets.len(), "fetched timesheets");
        Ok(list.timesheets.into_iter().map(ExistingEntry::from).collect())
    }

    /// Creates one hour-entry. Returns the new entry's id when reported.
    ///
    /// Sent exactly once: the server may have stored the entry even when the
    /// response is a 5xx or never arrives.
    pub async fn create_timesheet_entry(
        &self,
        employee_id: u64,
        entry: &PushEntry,
    ) -> Result<Option<u64>, HttpError> {
        let url = self.url(&format!("/v1/employees/{employee_id}/timesheets"));
        let payload = CreateTimesheet::new(employee_id, entry);
        let response = RetryPolicy::none()
            .send(|| {
                self.http
                    .post(&url)
                    .basic_auth(&self.api_key, Some("x"))
                    .header(reqwest::header::ACCEPT, "application/json")
                    .json(&payload)
            })
            .await?;
        let body = response.text().await?;
        Ok(serde_json::from_str::<Created>(&body)
            .ok()
            .and_then(|created| created.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use wls_core::EntryId;

    /// Serves `503` to every request and counts requests per method.
    struct FailingServer {
        base_url: String,
        gets: Arc<AtomicUsize>,
        posts: Arc<AtomicUsize>,
    }

    impl FailingServer {
        fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let base_url = format!("http://{}/acme", listener.local_addr().unwrap());
            let gets = Arc::new(AtomicUsize::new(0));
            let posts = Arc::new(AtomicUsize::new(0));
            let (get_count, post_count) = (Arc::clone(&gets), Arc::clone(&posts));

            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(mut stream) = stream else { break };
                    let mut reader = BufReader::new(stream.try_clone().unwrap());

                    let mut request_line = String::new();
                    reader.read_line(&mut request_line).unwrap();
                    let mut content_length = 0;
                    loop {
                        let mut header = String::new();
                        reader.read_line(&mut header).unwrap();
                        if header.trim().is_empty() {
                            break;
                        }
                        if let Some((name, value)) = header.split_once(':') {
                            if name.eq_ignore_ascii_case("content-length") {
                                content_length = value.trim().parse().unwrap();
                            }
                        }
                    }
                    let mut body = vec![0; content_length];
                    reader.read_exact(&mut body).unwrap();

                    if request_line.starts_with("POST") {
                        post_count.fetch_add(1, Ordering::SeqCst);
                    } else {
                        get_count.fetch_add(1, Ordering::SeqCst);
                    }
                    stream
                        .write_all(
                            b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                        )
                        .unwrap();
                }
            });

            Self {
                base_url,
                gets,
                posts,
            }
        }

        fn client(&self) -> BambooClient {
            BambooClient::new("acme", "key")
                .unwrap()
                .with_base_url(self.base_url.clone())
                .with_retry(RetryPolicy::new(2, Duration::from_millis(1)))
        }
    }

    fn push_entry() -> PushEntry {
        PushEntry {
            source_id: EntryId::new("e1").unwrap(),
            date: NaiveDate::from_ymd_opt(2026, 2, 25).unwrap(),
            hours: 1.5,
            project_id: DestProjectId::new(5),
            task_id: None,
            note: "Meeting".to_string(),
        }
    }

    #[test]
    fn client_rejects_blank_api_key() {
        assert!(matches!(
            BambooClient::new("acme", ""),
            Err(HttpError::InvalidApiKey { .. })
        ));
    }

    #[test]
    fn base_url_includes_domain() {
        let client = BambooClient::new("acme", "key").unwrap();
        assert_eq!(
            client.url("/v1/employees/0"),
            "https://api.bamboohr.com/api/gateway.php/acme/v1/employees/0"
        );
    }

    #[test]
    fn client_debug_redacts_api_key() {
        let client = BambooClient::new("acme", "bamboo-secret").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("bamboo-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn employee_accepts_string_id() {
        let employee: Employee =
            serde_json::from_str(r#"{"id": "123", "firstName": "Dana", "lastName": "Novak"}"#)
                .unwrap();
        assert_eq!(employee.id, 123);
        assert_eq!(employee.display_name(), "Dana Novak");
    }

    #[test]
    fn timesheets_decode_into_existing_entries() {
        let list: TimesheetList = serde_json::from_str(
            r#"{"timesheets": [
                {"id": 1, "date": "2026-02-25", "hours": 2.0, "projectId": "10", "taskId": "24"},
                {"id": 2, "date": "2026-02-25", "hours": 1.5, "projectId": 5, "taskId": null},
                {"id": 3, "date": "2026-02-26", "hours": 1.0, "projectId": 5, "taskId": ""}
            ]}"#,
        )
        .unwrap();
        let entries: Vec<ExistingEntry> =
            list.timesheets.into_iter().map(ExistingEntry::from).collect();

        assert_eq!(entries[0].project_id, DestProjectId::new(10));
        assert_eq!(entries[0].task_id, Some(DestTaskId::new(24)));
        assert_eq!(entries[1].task_id, None);
        assert_eq!(entries[2].task_id, None);
    }

    #[test]
    fn create_payload_uses_string_ids_and_omits_missing_task() {
        let entry = push_entry();

        let json = serde_json::to_value(CreateTimesheet::new(42, &entry)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "employeeId": "42",
                "date": "2026-02-25",
                "hours": 1.5,
                "projectId": "5",
                "notes": "Meeting"
            })
        );
    }

    #[tokio::test]
    async fn create_is_not_retried_after_server_error() {
        let server = FailingServer::start();

        let result = server.client().create_timesheet_entry(42, &push_entry()).await;

        assert_eq!(
            result.unwrap_err().status(),
            Some(reqwest::StatusCode::SERVICE_UNAVAILABLE)
        );
        assert_eq!(server.posts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reads_are_retried_after_server_error() {
        let server = FailingServer::start();
        let day = NaiveDate::from_ymd_opt(2026, 2, 25).unwrap();

        let result = server.client().timesheet_entries(42, day, day).await;

        assert!(result.is_err());
        assert_eq!(server.gets.load(Ordering::SeqCst), 2);
    }
}
