//! Source time entries and their normalized destination form.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::normalize::parse_duration_hours;
use crate::types::{DestProjectId, DestTaskId, EntryId, SourceProjectId, SourceTaskId};

/// A time entry as delivered by the source time-tracking API.
///
/// An entry without an end time is a running timer and is never exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTimeEntry {
    pub id: EntryId,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub project_id: Option<SourceProjectId>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub task_id: Option<SourceTaskId>,

    pub time_interval: TimeInterval,
}

/// The UTC interval of a source entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,

    #[serde(default)]
    pub end: Option<DateTime<Utc>>,

    /// ISO 8601 duration such as `PT1H30M`.
    #[serde(default)]
    pub duration: Option<String>,
}

impl RawTimeEntry {
    /// Whether the entry is a timer that has not been stopped yet.
    pub const fn is_running(&self) -> bool {
        self.time_interval.end.is_none()
    }

    /// Decimal hours worked, or `None` for a running timer.
    ///
    /// The reported duration string wins over the interval bounds when present.
    #[allow(clippy::cast_precision_loss)]
    pub fn hours(&self) -> Option<f64> {
        let end = self.time_interval.end?;
        let hours = match self.time_interval.duration.as_deref() {
            Some(duration) => parse_duration_hours(duration),
            None => (end - self.time_interval.start).num_seconds() as f64 / 3600.0,
        };
        Some(hours)
    }

    /// Description, falling back to the entry id when blank.
    pub fn label(&self) -> &str {
        match self.description.as_deref() {
            Some(description) if !description.is_empty() => description,
            _ => self.id.as_str(),
        }
    }
}

/// An entry in local wall-clock time with destination identifiers resolved.
///
/// Serializes to the export contract: `date`, `start`/`end` as `HH:MM`,
/// `note`, `projectId`, `taskId` (null when absent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEntry {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    pub note: String,
    pub project_id: DestProjectId,
    pub task_id: Option<DestTaskId>,
}

impl fmt::Display for NormalizedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{} project {}",
            self.date,
            self.start.format("%H:%M"),
            self.end.format("%H:%M"),
            self.project_id
        )?;
        if let Some(task_id) = self.task_id {
            write!(f, " task {task_id}")?;
        }
        Ok(())
    }
}

/// Treats `null` and `""` the same for optional source identifiers.
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<String>,
    T::Error: fmt::Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.is_empty() => T::try_from(raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
