use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::activity_log::{ActivityLogEntry, NewActivity};
use crate::models::candidate::{
    Candidate, CandidateChanges, CandidateList, NewCandidate, StageTransition,
};
use crate::models::file::{FileRecord, NewFileRecord};
use crate::models::note::Note;
use crate::models::organization::{Organization, OrganizationSettings};
use crate::models::stage::Stage;
use crate::services::filter_compiler::CompiledFilter;

/// Persistence seam for the pipeline.
///
/// Candidate listings are always scoped by organization. Methods that write
/// more than one row (a change plus its activity entry, a bootstrap) are
/// atomic: either every row lands or none does.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// Creates the organization, the owner membership and the settings row.
    async fn bootstrap_organization(&self, name: &str, owner_id: Uuid) -> Result<Organization>;

    /// Organizations the user belongs to, oldest membership first.
    async fn list_member_organizations(&self, user_id: Uuid) -> Result<Vec<Organization>>;

    async fn is_member(&self, organization_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn get_settings(&self, organization_id: Uuid) -> Result<Option<OrganizationSettings>>;

    async fn mark_demo_onboarding_seen(&self, organization_id: Uuid) -> Result<OrganizationSettings>;

    /// Matches ordered by `created_at` descending; `total` ignores pagination.
    async fn list_candidates(&self, organization_id: Uuid, filter: &CompiledFilter) -> Result<CandidateList>;

    async fn count_candidates(&self, organization_id: Uuid) -> Result<i64>;

    async fn get_candidate(&self, candidate_id: Uuid) -> Result<Option<Candidate>>;

    async fn insert_candidate(&self, candidate: NewCandidate, activity: Option<NewActivity>) -> Result<Candidate>;

    /// Bulk insert without activity entries.
    async fn insert_candidates(&self, candidates: Vec<NewCandidate>) -> Result<Vec<Candidate>>;

    /// Replaces the editable fields. Fails with `Conflict` when
    /// `expected_version` is given and differs from the stored version.
    async fn update_candidate(
        &self,
        candidate_id: Uuid,
        changes: CandidateChanges,
        expected_version: Option<i32>,
        activity: Option<NewActivity>,
    ) -> Result<Candidate>;

    /// Moves the candidate and appends `StageChanged` in one transaction,
    /// reading the previous stage under the same lock.
    async fn transition_stage(
        &self,
        candidate_id: Uuid,
        stage: Stage,
        expected_version: Option<i32>,
        performed_by: Uuid,
    ) -> Result<StageTransition>;

    /// Removes the candidate together with its notes, files and activity.
    async fn delete_candidate(&self, candidate_id: Uuid) -> Result<()>;

    async fn list_notes(&self, candidate_id: Uuid) -> Result<Vec<Note>>;

    /// Stores the note and appends `NoteAdded` atomically.
    async fn insert_note(&self, candidate_id: Uuid, author_id: Uuid, content: String) -> Result<Note>;

    async fn list_activity(&self, candidate_id: Uuid) -> Result<Vec<ActivityLogEntry>>;

    async fn list_files(&self, candidate_id: Uuid) -> Result<Vec<FileRecord>>;

    async fn insert_file(&self, file: NewFileRecord) -> Result<FileRecord>;
}
