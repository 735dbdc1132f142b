use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub const ALL: &[JobStatus] = &[
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Done,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "done" => Some(JobStatus::Done),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateThumbnail {
    pub attachment_id: i64,
    pub stored_path: String,
}

/// Background work a handler can enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    GenerateThumbnail(GenerateThumbnail),
}

impl Job {
    pub const GENERATE_THUMBNAIL: &'static str = "generateThumbnail";

    pub fn kind(&self) -> &'static str {
        match self {
            Job::GenerateThumbnail(_) => Self::GENERATE_THUMBNAIL,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Job::GenerateThumbnail(p) => serde_json::json!({
                "attachmentId": p.attachment_id,
                "storedPath": p.stored_path,
            }),
        }
    }

    pub fn decode(kind: &str, payload: &Value) -> Result<Self, JobDecodeError> {
        match kind {
            Self::GENERATE_THUMBNAIL => serde_json::from_value(payload.clone())
                .map(Job::GenerateThumbnail)
                .map_err(|e| JobDecodeError::Payload(e.to_string())),
            other => Err(JobDecodeError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobDecodeError {
    #[error("unknown job kind: {0}")]
    UnknownKind(String),
    #[error("bad job payload: {0}")]
    Payload(String),
}

/// A row of the durable job queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    pub kind: String,
    pub payload: Value,
    pub status: JobStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn job(&self) -> Result<Job, JobDecodeError> {
        Job::decode(&self.kind, &self.payload)
    }
}
