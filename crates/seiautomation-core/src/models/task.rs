//! Task catalog and run records from the `/tasks` endpoints.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// An automation the server knows how to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

/// Lifecycle of a task run as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failed,
    Other(String),
}

impl From<String> for RunStatus {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => RunStatus::Pending,
            "running" => RunStatus::Running,
            "success" => RunStatus::Success,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Other(s),
        }
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        status.to_string()
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }
}

/// One invocation of a task. The client only ever reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRun {
    pub id: String,
    pub task_name: String,
    pub status: RunStatus,
    #[serde(default)]
    pub log: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
}

/// Body of `POST /tasks/run`. Unset optionals are left out of the JSON entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRunRequest {
    pub task_slug: String,
    pub headless: bool,
    pub auto_credentials: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloco_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_mode: Option<bool>,
}

/// Parse a server timestamp. The backend emits naive ISO timestamps for
/// UTC values, so a missing offset is read as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw)))
}

fn deserialize_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_task_run_naive_timestamps() {
        let json = r#"{
            "id": "8f14e45f-ceea-467a-9af0-1c2d3e4f5a6b",
            "task_name": "Baixar processos em ZIP",
            "status": "running",
            "log": "",
            "created_at": "2024-05-02T13:45:10.123456",
            "finished_at": null,
            "params": {"bloco_id": 55, "headless": true}
        }"#;
        let run: TaskRun = serde_json::from_str(json).expect("Failed to parse run JSON");
        assert_eq!(run.status, RunStatus::Running);
        assert!(!run.status.is_finished());
        assert_eq!(run.created_at.year(), 2024);
        assert_eq!(run.created_at.hour(), 13);
        assert!(run.finished_at.is_none());
        assert_eq!(run.params.as_ref().and_then(|p| p["bloco_id"].as_i64()), Some(55));
    }

    #[test]
    fn test_parse_task_run_with_offset_and_unknown_status() {
        let json = r#"{
            "id": "1",
            "task_name": "Anotar OK",
            "status": "cancelled",
            "log": "done",
            "created_at": "2024-05-02T13:45:10Z",
            "finished_at": "2024-05-02T14:00:00+00:00"
        }"#;
        let run: TaskRun = serde_json::from_str(json).expect("Failed to parse run JSON");
        assert_eq!(run.status, RunStatus::Other("cancelled".to_string()));
        assert_eq!(run.status.to_string(), "cancelled");
        assert!(run.finished_at.is_some());
        assert!(run.params.is_none());
    }

    #[test]
    fn test_run_status_round_trips_as_string() {
        let status: RunStatus = serde_json::from_str("\"SUCCESS\"").expect("Failed to parse status");
        assert_eq!(status, RunStatus::Success);
        assert!(status.is_finished());
        assert_eq!(serde_json::to_string(&RunStatus::Failed).unwrap(), "\"failed\"");
    }

    #[test]
    fn test_run_request_omits_unset_optionals() {
        let request = TaskRunRequest {
            task_slug: "download_zip".to_string(),
            headless: true,
            auto_credentials: false,
            bloco_id: None,
            limit: Some(10),
            dev_mode: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("bloco_id"));
        assert!(!obj.contains_key("dev_mode"));
        assert_eq!(obj["limit"], 10);
        assert_eq!(obj["task_slug"], "download_zip");
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2024-05-02 08:00:00").is_some());
    }
}
