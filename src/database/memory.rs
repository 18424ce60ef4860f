//! In-process [`PipelineStore`] used by tests and local demos.
//!
//! A single `RwLock` guards every table, so each trait call is atomic with
//! respect to the others, mirroring the transactional guarantees of the
//! Postgres store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::store::PipelineStore;
use crate::error::{Error, Result};
use crate::models::activity_log::{ActivityAction, ActivityLogEntry, NewActivity};
use crate::models::candidate::{
    Candidate, CandidateChanges, CandidateList, NewCandidate, StageTransition,
};
use crate::models::file::{FileRecord, NewFileRecord};
use crate::models::note::Note;
use crate::models::organization::{
    Organization, OrganizationMember, OrganizationRole, OrganizationSettings,
};
use crate::models::stage::Stage;
use crate::services::filter_compiler::CompiledFilter;
use crate::utils::time::now;

#[derive(Default)]
struct Tables {
    organizations: Vec<Organization>,
    members: Vec<OrganizationMember>,
    settings: Vec<OrganizationSettings>,
    candidates: Vec<Candidate>,
    notes: Vec<Note>,
    activity: Vec<ActivityLogEntry>,
    files: Vec<FileRecord>,
}

impl Tables {
    fn candidate_mut(&mut self, candidate_id: Uuid) -> Result<&mut Candidate> {
        self.candidates
            .iter_mut()
            .find(|c| c.id == candidate_id)
            .ok_or_else(|| Error::NotFound(format!("Candidate {} not found", candidate_id)))
    }

    fn require_candidate(&self, candidate_id: Uuid) -> Result<()> {
        if self.candidates.iter().any(|c| c.id == candidate_id) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("Candidate {} not found", candidate_id)))
        }
    }

    fn push_activity(&mut self, candidate_id: Uuid, activity: NewActivity, at: DateTime<Utc>) -> ActivityLogEntry {
        let entry = ActivityLogEntry {
            id: Uuid::new_v4(),
            candidate_id,
            action: activity.action,
            performed_by: activity.performed_by,
            created_at: at,
        };
        self.activity.push(entry.clone());
        entry
    }
}

fn check_version(candidate: &Candidate, expected_version: Option<i32>) -> Result<()> {
    match expected_version {
        Some(expected) if expected != candidate.version => Err(Error::Conflict(format!(
            "Candidate {} is at version {}, expected {}",
            candidate.id, candidate.version, expected
        ))),
        _ => Ok(()),
    }
}

/// Newest first; ties keep the most recent insertion first.
fn newest_first<T: Clone>(rows: impl DoubleEndedIterator<Item = T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut rows: Vec<T> = rows.rev().collect();
    rows.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    rows
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PipelineStore for MemoryStore {
    async fn bootstrap_organization(&self, name: &str, owner_id: Uuid) -> Result<Organization> {
        let mut tables = self.tables.write().await;
        let at = now();
        let organization = Organization {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: at,
        };
        tables.organizations.push(organization.clone());
        tables.members.push(OrganizationMember {
            organization_id: organization.id,
            user_id: owner_id,
            role: OrganizationRole::Owner,
            created_at: at,
        });
        tables.settings.push(OrganizationSettings {
            organization_id: organization.id,
            onboarding_demo_seen: false,
            created_at: at,
            updated_at: at,
        });
        Ok(organization)
    }

    async fn list_member_organizations(&self, user_id: Uuid) -> Result<Vec<Organization>> {
        let tables = self.tables.read().await;
        let mut memberships: Vec<&OrganizationMember> =
            tables.members.iter().filter(|m| m.user_id == user_id).collect();
        memberships.sort_by_key(|m| m.created_at);
        Ok(memberships
            .into_iter()
            .filter_map(|m| tables.organizations.iter().find(|o| o.id == m.organization_id).cloned())
            .collect())
    }

    async fn is_member(&self, organization_id: Uuid, user_id: Uuid) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .members
            .iter()
            .any(|m| m.organization_id == organization_id && m.user_id == user_id))
    }

    async fn get_settings(&self, organization_id: Uuid) -> Result<Option<OrganizationSettings>> {
        let tables = self.tables.read().await;
        Ok(tables
            .settings
            .iter()
            .find(|s| s.organization_id == organization_id)
            .cloned())
    }

    async fn mark_demo_onboarding_seen(&self, organization_id: Uuid) -> Result<OrganizationSettings> {
        let mut tables = self.tables.write().await;
        let settings = tables
            .settings
            .iter_mut()
            .find(|s| s.organization_id == organization_id)
            .ok_or_else(|| Error::NotFound(format!("Settings for organization {} not found", organization_id)))?;
        settings.onboarding_demo_seen = true;
        settings.updated_at = now();
        Ok(settings.clone())
    }

    async fn list_candidates(&self, organization_id: Uuid, filter: &CompiledFilter) -> Result<CandidateList> {
        let tables = self.tables.read().await;
        let matches = newest_first(
            tables
                .candidates
                .iter()
                .filter(|c| c.organization_id == organization_id && filter.matches(c))
                .cloned(),
            |c| c.created_at,
        );
        let total = matches.len() as i64;
        let items = match filter.pagination {
            Some(p) => matches
                .into_iter()
                .skip(p.offset() as usize)
                .take(p.per_page as usize)
                .collect(),
            None => matches,
        };
        Ok(CandidateList {
            items,
            total,
            page: filter.pagination.map(|p| p.page),
            per_page: filter.pagination.map(|p| p.per_page),
        })
    }

    async fn count_candidates(&self, organization_id: Uuid) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .candidates
            .iter()
            .filter(|c| c.organization_id == organization_id)
            .count() as i64)
    }

    async fn get_candidate(&self, candidate_id: Uuid) -> Result<Option<Candidate>> {
        let tables = self.tables.read().await;
        Ok(tables.candidates.iter().find(|c| c.id == candidate_id).cloned())
    }

    async fn insert_candidate(&self, candidate: NewCandidate, activity: Option<NewActivity>) -> Result<Candidate> {
        let mut tables = self.tables.write().await;
        let at = now();
        let created_at = candidate.created_at.unwrap_or(at);
        let row = Candidate {
            id: Uuid::new_v4(),
            organization_id: candidate.organization_id,
            full_name: candidate.full_name,
            email: candidate.email,
            phone: candidate.phone,
            stage: candidate.stage,
            salary_expectation: candidate.salary_expectation,
            source: candidate.source,
            created_by: candidate.created_by,
            created_at,
            updated_at: created_at,
            version: 1,
        };
        tables.candidates.push(row.clone());
        if let Some(activity) = activity {
            tables.push_activity(row.id, activity, at);
        }
        Ok(row)
    }

    async fn insert_candidates(&self, candidates: Vec<NewCandidate>) -> Result<Vec<Candidate>> {
        let mut tables = self.tables.write().await;
        let at = now();
        let rows: Vec<Candidate> = candidates
            .into_iter()
            .map(|c| {
                let created_at = c.created_at.unwrap_or(at);
                Candidate {
                    id: Uuid::new_v4(),
                    organization_id: c.organization_id,
                    full_name: c.full_name,
                    email: c.email,
                    phone: c.phone,
                    stage: c.stage,
                    salary_expectation: c.salary_expectation,
                    source: c.source,
                    created_by: c.created_by,
                    created_at,
                    updated_at: created_at,
                    version: 1,
                }
            })
            .collect();
        tables.candidates.extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn update_candidate(
        &self,
        candidate_id: Uuid,
        changes: CandidateChanges,
        expected_version: Option<i32>,
        activity: Option<NewActivity>,
    ) -> Result<Candidate> {
        let mut tables = self.tables.write().await;
        let at = now();
        let candidate = tables.candidate_mut(candidate_id)?;
        check_version(candidate, expected_version)?;
        candidate.full_name = changes.full_name;
        candidate.email = changes.email;
        candidate.phone = changes.phone;
        candidate.stage = changes.stage;
        candidate.salary_expectation = changes.salary_expectation;
        candidate.source = changes.source;
        candidate.updated_at = at;
        candidate.version += 1;
        let updated = candidate.clone();
        if let Some(activity) = activity {
            tables.push_activity(candidate_id, activity, at);
        }
        Ok(updated)
    }

    async fn transition_stage(
        &self,
        candidate_id: Uuid,
        stage: Stage,
        expected_version: Option<i32>,
        performed_by: Uuid,
    ) -> Result<StageTransition> {
        let mut tables = self.tables.write().await;
        let at = now();
        let candidate = tables.candidate_mut(candidate_id)?;
        check_version(candidate, expected_version)?;
        if candidate.stage == stage {
            return Ok(StageTransition::Unchanged(candidate.clone()));
        }
        let from = candidate.stage;
        candidate.stage = stage;
        candidate.updated_at = at;
        candidate.version += 1;
        let moved = candidate.clone();
        let activity = tables.push_activity(
            candidate_id,
            NewActivity::new(ActivityAction::StageChanged { from, to: stage }, performed_by),
            at,
        );
        Ok(StageTransition::Moved {
            candidate: moved,
            activity,
        })
    }

    async fn delete_candidate(&self, candidate_id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.require_candidate(candidate_id)?;
        tables.candidates.retain(|c| c.id != candidate_id);
        tables.notes.retain(|n| n.candidate_id != candidate_id);
        tables.activity.retain(|a| a.candidate_id != candidate_id);
        tables.files.retain(|f| f.candidate_id != candidate_id);
        Ok(())
    }

    async fn list_notes(&self, candidate_id: Uuid) -> Result<Vec<Note>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables.notes.iter().filter(|n| n.candidate_id == candidate_id).cloned(),
            |n| n.created_at,
        ))
    }

    async fn insert_note(&self, candidate_id: Uuid, author_id: Uuid, content: String) -> Result<Note> {
        let mut tables = self.tables.write().await;
        tables.require_candidate(candidate_id)?;
        let at = now();
        let note = Note {
            id: Uuid::new_v4(),
            candidate_id,
            author_id,
            content,
            created_at: at,
        };
        tables.notes.push(note.clone());
        tables.push_activity(candidate_id, NewActivity::new(ActivityAction::NoteAdded, author_id), at);
        Ok(note)
    }

    async fn list_activity(&self, candidate_id: Uuid) -> Result<Vec<ActivityLogEntry>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables.activity.iter().filter(|a| a.candidate_id == candidate_id).cloned(),
            |a| a.created_at,
        ))
    }

    async fn list_files(&self, candidate_id: Uuid) -> Result<Vec<FileRecord>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables.files.iter().filter(|f| f.candidate_id == candidate_id).cloned(),
            |f| f.created_at,
        ))
    }

    async fn insert_file(&self, file: NewFileRecord) -> Result<FileRecord> {
        let mut tables = self.tables.write().await;
        tables.require_candidate(file.candidate_id)?;
        let record = FileRecord {
            id: Uuid::new_v4(),
            candidate_id: file.candidate_id,
            file_url: file.file_url,
            file_name: file.file_name,
            uploaded_by: file.uploaded_by,
            created_at: now(),
        };
        tables.files.push(record.clone());
        Ok(record)
    }
}
