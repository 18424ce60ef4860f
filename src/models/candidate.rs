use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::activity_log::ActivityLogEntry;
use crate::models::file::FileRecord;
use crate::models::note::Note;
use crate::models::stage::Stage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Candidate {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub stage: Stage,
    pub salary_expectation: Option<Decimal>,
    pub source: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every write; lets callers opt into optimistic concurrency.
    pub version: i32,
}

/// Insert payload handed to the store.
#[derive(Debug, Clone)]
pub struct NewCandidate {
    pub organization_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub stage: Stage,
    pub salary_expectation: Option<Decimal>,
    pub source: Option<String>,
    pub created_by: Uuid,
    /// `None` lets the store stamp the current time.
    pub created_at: Option<DateTime<Utc>>,
}

/// Full replacement of the editable fields.
#[derive(Debug, Clone)]
pub struct CandidateChanges {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub stage: Stage,
    pub salary_expectation: Option<Decimal>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub candidate: Candidate,
    pub notes: Vec<Note>,
    pub activity_logs: Vec<ActivityLogEntry>,
    pub files: Vec<FileRecord>,
}

/// One page (or all) of an organization's matching candidates.
///
/// `total` always counts every match, regardless of pagination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateList {
    pub items: Vec<Candidate>,
    pub total: i64,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Outcome of an atomic stage change.
#[derive(Debug, Clone, PartialEq)]
pub enum StageTransition {
    /// Target equals the current stage; nothing was written.
    Unchanged(Candidate),
    Moved {
        candidate: Candidate,
        activity: ActivityLogEntry,
    },
}

impl StageTransition {
    pub fn into_candidate(self) -> Candidate {
        match self {
            StageTransition::Unchanged(candidate) => candidate,
            StageTransition::Moved { candidate, .. } => candidate,
        }
    }
}
