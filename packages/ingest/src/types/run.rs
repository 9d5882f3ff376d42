//! Pipeline run logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of run this was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    Ingest,
    Discovery,
    Backfill,
    Replay,
    CatchUp,
}

impl RunType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunType::Ingest => "ingest",
            RunType::Discovery => "discovery",
            RunType::Backfill => "backfill",
            RunType::Replay => "replay",
            RunType::CatchUp => "catch_up",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "discovery" => RunType::Discovery,
            "backfill" => RunType::Backfill,
            "replay" => RunType::Replay,
            "catch_up" => RunType::CatchUp,
            _ => RunType::Ingest,
        }
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Running,
        }
    }
}

/// One row per pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLog {
    pub id: i64,
    pub run_type: RunType,
    pub status: RunStatus,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub jobs_found: i64,
    pub jobs_new: i64,
    pub jobs_duplicate: i64,
    pub jobs_rejected: i64,
    pub alerts_sent: i64,
    pub analyses_run: i64,
    /// Serialized error list (JSON array of strings)
    pub errors: Vec<String>,
}
