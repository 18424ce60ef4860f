use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata for an attachment; the bytes live in blob storage under `file_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FileRecord {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub file_url: String,
    pub file_name: String,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub candidate_id: Uuid,
    pub file_url: String,
    pub file_name: String,
    pub uploaded_by: Uuid,
}
