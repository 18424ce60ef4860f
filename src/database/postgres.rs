use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::database::store::PipelineStore;
use crate::error::{Error, Result};
use crate::models::activity_log::{ActivityAction, ActivityLogEntry, NewActivity};
use crate::models::candidate::{
    Candidate, CandidateChanges, CandidateList, NewCandidate, StageTransition,
};
use crate::models::file::{FileRecord, NewFileRecord};
use crate::models::note::Note;
use crate::models::organization::{Organization, OrganizationSettings};
use crate::models::stage::Stage;
use crate::services::filter_compiler::CompiledFilter;

const CANDIDATE_COLUMNS: &str = "id, organization_id, full_name, email, phone, stage, salary_expectation, source, created_by, created_at, updated_at, version";
const ACTIVITY_COLUMNS: &str = "id, candidate_id, action, performed_by, created_at";

/// Escapes LIKE metacharacters so user text matches literally.
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for ch in search.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, organization_id: Uuid, filter: &CompiledFilter) {
    builder.push(" WHERE organization_id = ").push_bind(organization_id);
    if let Some(search) = &filter.search {
        builder.push(" AND full_name ILIKE ").push_bind(like_pattern(search));
    }
    if let Some(stage) = filter.stage {
        builder.push(" AND stage = ").push_bind(stage);
    }
    if let Some(min) = filter.salary_min {
        builder.push(" AND salary_expectation >= ").push_bind(min);
    }
    if let Some(max) = filter.salary_max {
        builder.push(" AND salary_expectation <= ").push_bind(max);
    }
    if let Some(from) = filter.created_from {
        builder.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.created_to {
        builder.push(" AND created_at <= ").push_bind(to);
    }
}

fn version_conflict(candidate: &Candidate, expected: i32) -> Error {
    Error::Conflict(format!(
        "Candidate {} is at version {}, expected {}",
        candidate.id, candidate.version, expected
    ))
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_candidate(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        candidate_id: Uuid,
        expected_version: Option<i32>,
    ) -> Result<Candidate> {
        let candidate = sqlx::query_as::<_, Candidate>(&format!(
            "SELECT {} FROM candidates WHERE id = $1 FOR UPDATE",
            CANDIDATE_COLUMNS
        ))
        .bind(candidate_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Candidate {} not found", candidate_id)))?;

        match expected_version {
            Some(expected) if expected != candidate.version => Err(version_conflict(&candidate, expected)),
            _ => Ok(candidate),
        }
    }

    async fn insert_activity_in(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        candidate_id: Uuid,
        activity: &NewActivity,
    ) -> Result<ActivityLogEntry> {
        let entry = sqlx::query_as::<_, ActivityLogEntry>(&format!(
            "INSERT INTO activity_logs (candidate_id, action, performed_by) VALUES ($1, $2, $3) RETURNING {}",
            ACTIVITY_COLUMNS
        ))
        .bind(candidate_id)
        .bind(Json(&activity.action))
        .bind(activity.performed_by)
        .fetch_one(&mut **tx)
        .await?;
        Ok(entry)
    }
}

#[async_trait]
impl PipelineStore for PgStore {
    async fn bootstrap_organization(&self, name: &str, owner_id: Uuid) -> Result<Organization> {
        let mut tx = self.pool.begin().await?;
        let organization = sqlx::query_as::<_, Organization>(
            "INSERT INTO organizations (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO organization_members (organization_id, user_id, role) VALUES ($1, $2, 'owner')")
            .bind(organization.id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO organization_settings (organization_id) VALUES ($1)")
            .bind(organization.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(organization)
    }

    async fn list_member_organizations(&self, user_id: Uuid) -> Result<Vec<Organization>> {
        let organizations = sqlx::query_as::<_, Organization>(
            r#"
            SELECT o.id, o.name, o.created_at
            FROM organization_members m
            JOIN organizations o ON o.id = m.organization_id
            WHERE m.user_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(organizations)
    }

    async fn is_member(&self, organization_id: Uuid, user_id: Uuid) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM organization_members WHERE organization_id = $1 AND user_id = $2)",
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn get_settings(&self, organization_id: Uuid) -> Result<Option<OrganizationSettings>> {
        let settings = sqlx::query_as::<_, OrganizationSettings>(
            "SELECT organization_id, onboarding_demo_seen, created_at, updated_at FROM organization_settings WHERE organization_id = $1",
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings)
    }

    async fn mark_demo_onboarding_seen(&self, organization_id: Uuid) -> Result<OrganizationSettings> {
        let settings = sqlx::query_as::<_, OrganizationSettings>(
            r#"
            UPDATE organization_settings
            SET onboarding_demo_seen = TRUE, updated_at = NOW()
            WHERE organization_id = $1
            RETURNING organization_id, onboarding_demo_seen, created_at, updated_at
            "#,
        )
        .bind(organization_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(settings)
    }

    async fn list_candidates(&self, organization_id: Uuid, filter: &CompiledFilter) -> Result<CandidateList> {
        let mut items_query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM candidates", CANDIDATE_COLUMNS));
        push_filters(&mut items_query, organization_id, filter);
        items_query.push(" ORDER BY created_at DESC, id DESC");
        if let Some(p) = filter.pagination {
            items_query
                .push(" LIMIT ")
                .push_bind(p.per_page)
                .push(" OFFSET ")
                .push_bind(p.offset());
        }
        let items = items_query
            .build_query_as::<Candidate>()
            .fetch_all(&self.pool)
            .await?;

        let total = if filter.pagination.is_some() {
            let mut total_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM candidates");
            push_filters(&mut total_query, organization_id, filter);
            total_query
                .build_query_scalar::<i64>()
                .fetch_one(&self.pool)
                .await?
        } else {
            items.len() as i64
        };

        Ok(CandidateList {
            items,
            total,
            page: filter.pagination.map(|p| p.page),
            per_page: filter.pagination.map(|p| p.per_page),
        })
    }

    async fn count_candidates(&self, organization_id: Uuid) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM candidates WHERE organization_id = $1")
            .bind(organization_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn get_candidate(&self, candidate_id: Uuid) -> Result<Option<Candidate>> {
        let candidate = sqlx::query_as::<_, Candidate>(&format!(
            "SELECT {} FROM candidates WHERE id = $1",
            CANDIDATE_COLUMNS
        ))
        .bind(candidate_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(candidate)
    }

    async fn insert_candidate(&self, candidate: NewCandidate, activity: Option<NewActivity>) -> Result<Candidate> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, Candidate>(&format!(
            r#"
            INSERT INTO candidates (organization_id, full_name, email, phone, stage, salary_expectation, source, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, NOW()), COALESCE($9, NOW()))
            RETURNING {}
            "#,
            CANDIDATE_COLUMNS
        ))
        .bind(candidate.organization_id)
        .bind(&candidate.full_name)
        .bind(&candidate.email)
        .bind(&candidate.phone)
        .bind(candidate.stage)
        .bind(candidate.salary_expectation)
        .bind(&candidate.source)
        .bind(candidate.created_by)
        .bind(candidate.created_at)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(activity) = activity {
            Self::insert_activity_in(&mut tx, row.id, &activity).await?;
        }
        tx.commit().await?;
        Ok(row)
    }

    async fn insert_candidates(&self, candidates: Vec<NewCandidate>) -> Result<Vec<Candidate>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO candidates (organization_id, full_name, email, phone, stage, salary_expectation, source, created_by, created_at, updated_at) ",
        );
        builder.push_values(candidates, |mut row, c| {
            let created_at = c.created_at.unwrap_or_else(crate::utils::time::now);
            row.push_bind(c.organization_id)
                .push_bind(c.full_name)
                .push_bind(c.email)
                .push_bind(c.phone)
                .push_bind(c.stage)
                .push_bind(c.salary_expectation)
                .push_bind(c.source)
                .push_bind(c.created_by)
                .push_bind(created_at)
                .push_bind(created_at);
        });
        builder.push(format!(" RETURNING {}", CANDIDATE_COLUMNS));
        let rows = builder
            .build_query_as::<Candidate>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn update_candidate(
        &self,
        candidate_id: Uuid,
        changes: CandidateChanges,
        expected_version: Option<i32>,
        activity: Option<NewActivity>,
    ) -> Result<Candidate> {
        let mut tx = self.pool.begin().await?;
        Self::lock_candidate(&mut tx, candidate_id, expected_version).await?;
        let row = sqlx::query_as::<_, Candidate>(&format!(
            r#"
            UPDATE candidates
            SET full_name = $2, email = $3, phone = $4, stage = $5, salary_expectation = $6, source = $7,
                updated_at = NOW(), version = version + 1
            WHERE id = $1
            RETURNING {}
            "#,
            CANDIDATE_COLUMNS
        ))
        .bind(candidate_id)
        .bind(&changes.full_name)
        .bind(&changes.email)
        .bind(&changes.phone)
        .bind(changes.stage)
        .bind(changes.salary_expectation)
        .bind(&changes.source)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(activity) = activity {
            Self::insert_activity_in(&mut tx, candidate_id, &activity).await?;
        }
        tx.commit().await?;
        Ok(row)
    }

    async fn transition_stage(
        &self,
        candidate_id: Uuid,
        stage: Stage,
        expected_version: Option<i32>,
        performed_by: Uuid,
    ) -> Result<StageTransition> {
        let mut tx = self.pool.begin().await?;
        let current = Self::lock_candidate(&mut tx, candidate_id, expected_version).await?;
        if current.stage == stage {
            tx.rollback().await?;
            return Ok(StageTransition::Unchanged(current));
        }

        let candidate = sqlx::query_as::<_, Candidate>(&format!(
            "UPDATE candidates SET stage = $2, updated_at = NOW(), version = version + 1 WHERE id = $1 RETURNING {}",
            CANDIDATE_COLUMNS
        ))
        .bind(candidate_id)
        .bind(stage)
        .fetch_one(&mut *tx)
        .await?;

        let activity = Self::insert_activity_in(
            &mut tx,
            candidate_id,
            &NewActivity::new(
                ActivityAction::StageChanged {
                    from: current.stage,
                    to: stage,
                },
                performed_by,
            ),
        )
        .await?;
        tx.commit().await?;
        Ok(StageTransition::Moved { candidate, activity })
    }

    async fn delete_candidate(&self, candidate_id: Uuid) -> Result<()> {
        // notes, files and activity_logs cascade via their foreign keys
        let res = sqlx::query("DELETE FROM candidates WHERE id = $1")
            .bind(candidate_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Candidate {} not found", candidate_id)));
        }
        Ok(())
    }

    async fn list_notes(&self, candidate_id: Uuid) -> Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, Note>(
            "SELECT id, candidate_id, author_id, content, created_at FROM notes WHERE candidate_id = $1 ORDER BY created_at DESC",
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(notes)
    }

    async fn insert_note(&self, candidate_id: Uuid, author_id: Uuid, content: String) -> Result<Note> {
        let mut tx = self.pool.begin().await?;
        let note = sqlx::query_as::<_, Note>(
            "INSERT INTO notes (candidate_id, author_id, content) VALUES ($1, $2, $3) RETURNING id, candidate_id, author_id, content, created_at",
        )
        .bind(candidate_id)
        .bind(author_id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;
        Self::insert_activity_in(
            &mut tx,
            candidate_id,
            &NewActivity::new(ActivityAction::NoteAdded, author_id),
        )
        .await?;
        tx.commit().await?;
        Ok(note)
    }

    async fn list_activity(&self, candidate_id: Uuid) -> Result<Vec<ActivityLogEntry>> {
        let entries = sqlx::query_as::<_, ActivityLogEntry>(&format!(
            "SELECT {} FROM activity_logs WHERE candidate_id = $1 ORDER BY created_at DESC",
            ACTIVITY_COLUMNS
        ))
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn list_files(&self, candidate_id: Uuid) -> Result<Vec<FileRecord>> {
        let files = sqlx::query_as::<_, FileRecord>(
            "SELECT id, candidate_id, file_url, file_name, uploaded_by, created_at FROM files WHERE candidate_id = $1 ORDER BY created_at DESC",
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    async fn insert_file(&self, file: NewFileRecord) -> Result<FileRecord> {
        let record = sqlx::query_as::<_, FileRecord>(
            r#"
            INSERT INTO files (candidate_id, file_url, file_name, uploaded_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, candidate_id, file_url, file_name, uploaded_by, created_at
            "#,
        )
        .bind(file.candidate_id)
        .bind(file.file_url)
        .bind(file.file_name)
        .bind(file.uploaded_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ana"), "%ana%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }
}
