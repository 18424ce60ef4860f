use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::candidate::Candidate;
use crate::models::candidate::CandidateList;

/// Raw filter fields as they arrive from the query string.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct CandidateFiltersInput {
    pub search: Option<String>,
    pub stage: Option<String>,
    pub salary_min: Option<String>,
    pub salary_max: Option<String>,
    pub created_from: Option<String>,
    pub created_to: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCandidatePayload {
    #[validate(length(min = 2, max = 120))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    /// Defaults to `applied`.
    #[serde(default)]
    pub stage: Option<String>,
    pub salary_expectation: Option<Decimal>,
    #[validate(length(max = 120))]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCandidatePayload {
    #[validate(length(min = 2, max = 120))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub stage: String,
    pub salary_expectation: Option<Decimal>,
    #[validate(length(max = 120))]
    pub source: Option<String>,
    pub expected_version: Option<i32>,
}

fn trimmed(value: String) -> String {
    value.trim().to_string()
}

fn trimmed_or_none(value: Option<String>) -> Option<String> {
    value.map(trimmed).filter(|v| !v.is_empty())
}

impl CreateCandidatePayload {
    /// Surrounding whitespace removed and blank optionals dropped, so length
    /// rules see what will be stored.
    pub fn trimmed(self) -> Self {
        Self {
            full_name: trimmed(self.full_name),
            email: trimmed(self.email),
            phone: trimmed_or_none(self.phone),
            stage: trimmed_or_none(self.stage),
            salary_expectation: self.salary_expectation,
            source: trimmed_or_none(self.source),
        }
    }
}

impl UpdateCandidatePayload {
    pub fn trimmed(self) -> Self {
        Self {
            full_name: trimmed(self.full_name),
            email: trimmed(self.email),
            phone: trimmed_or_none(self.phone),
            stage: trimmed(self.stage),
            salary_expectation: self.salary_expectation,
            source: trimmed_or_none(self.source),
            expected_version: self.expected_version,
        }
    }
}

/// Stage arrives as a raw token so an unknown value surfaces as a field error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveStagePayload {
    pub stage: String,
    pub expected_version: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNotePayload {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateListResponse {
    pub items: Vec<Candidate>,
    pub total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateCountResponse {
    pub organization_id: Uuid,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUrlQuery {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUrlResponse {
    pub url: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedDownloadQuery {
    pub path: String,
    pub expires: i64,
    pub signature: String,
}

impl From<CandidateList> for CandidateListResponse {
    fn from(value: CandidateList) -> Self {
        Self {
            items: value.items,
            total: value.total,
            page: value.page,
            per_page: value.per_page,
        }
    }
}
