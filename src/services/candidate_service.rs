use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::database::store::PipelineStore;
use crate::dto::candidate_dto::{CreateCandidatePayload, UpdateCandidatePayload};
use crate::error::{Error, Result};
use crate::models::activity_log::{ActivityAction, NewActivity};
use crate::models::actor::Actor;
use crate::models::candidate::{Candidate, CandidateChanges, CandidateList, CandidateProfile, NewCandidate};
use crate::models::note::Note;
use crate::models::stage::Stage;
use crate::services::access::{load_candidate, require_actor, require_membership};
use crate::services::filter_compiler::CompiledFilter;
use crate::services::query_cache::{CacheKey, CachedValue, QueryCache};
use crate::utils::validation::{field_error, FieldErrors};

#[derive(Clone)]
pub struct CandidateService {
    store: Arc<dyn PipelineStore>,
    cache: QueryCache,
}

fn parse_stage(raw: &str, errors: &mut FieldErrors) -> Option<Stage> {
    match raw.parse::<Stage>() {
        Ok(stage) => Some(stage),
        Err(err) => {
            errors.add("stage", "stage", err.to_string());
            None
        }
    }
}

/// Matches the `NUMERIC(12, 2)` column: at most ten integer digits and two decimals.
const SALARY_MAX_SCALE: u32 = 2;
const SALARY_INTEGER_DIGITS: u32 = 10;

fn check_salary(salary: Option<Decimal>, errors: &mut FieldErrors) {
    let Some(value) = salary else { return };
    if value.is_sign_negative() && !value.is_zero() {
        errors.add("salary_expectation", "non_negative", "salary_expectation must not be negative");
    } else if value.normalize().scale() > SALARY_MAX_SCALE {
        errors.add(
            "salary_expectation",
            "scale",
            format!("salary_expectation allows at most {} decimal places", SALARY_MAX_SCALE),
        );
    } else if value >= Decimal::from(10i64.pow(SALARY_INTEGER_DIGITS)) {
        errors.add(
            "salary_expectation",
            "range",
            format!("salary_expectation must be below 10^{}", SALARY_INTEGER_DIGITS),
        );
    }
}

/// Runs the derived rules and the hand-checked ones, reporting all failures together.
fn validate_fields<T: Validate>(
    payload: &T,
    check: impl FnOnce(&mut FieldErrors),
) -> Result<()> {
    let mut extra = FieldErrors::new();
    check(&mut extra);
    match (payload.validate(), extra.into_result()) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(mut derived), Err(manual)) => {
            for (field, kind) in manual.into_errors() {
                if let validator::ValidationErrorsKind::Field(errs) = kind {
                    for err in errs {
                        derived.add(field, err);
                    }
                }
            }
            Err(Error::Validation(derived))
        }
        (Err(errors), Ok(())) | (Ok(()), Err(errors)) => Err(Error::Validation(errors)),
    }
}

impl CandidateService {
    pub fn new(store: Arc<dyn PipelineStore>, cache: QueryCache) -> Self {
        Self { store, cache }
    }

    /// Candidates of one organization matching every supplied predicate,
    /// newest first. `None` lists the whole pipeline.
    pub async fn list_candidates(
        &self,
        organization_id: Uuid,
        filter: Option<&CompiledFilter>,
    ) -> Result<CandidateList> {
        let unfiltered = CompiledFilter::default();
        let filter = filter.unwrap_or(&unfiltered);
        let key = CacheKey::candidate_list(organization_id, filter);
        if let Some(list) = self.cache.get_list(&key).await {
            return Ok(list);
        }
        let generation = self.cache.generation(&key).await;

        let list = self.store.list_candidates(organization_id, filter).await?;
        tracing::debug!(
            %organization_id,
            total = list.total,
            filtered = !filter.is_unconstrained(),
            "listed candidates"
        );
        self.cache
            .put(key, generation, CachedValue::CandidateList(list.clone()))
            .await;
        Ok(list)
    }

    pub async fn get_candidates_count(&self, organization_id: Uuid) -> Result<i64> {
        let key = CacheKey::candidate_count(organization_id);
        if let Some(total) = self.cache.get_count(&key).await {
            return Ok(total);
        }
        let generation = self.cache.generation(&key).await;
        let total = self.store.count_candidates(organization_id).await?;
        self.cache.put(key, generation, CachedValue::CandidateCount(total)).await;
        Ok(total)
    }

    pub async fn create_candidate(
        &self,
        actor: Option<&Actor>,
        organization_id: Uuid,
        payload: CreateCandidatePayload,
    ) -> Result<Candidate> {
        let actor = require_actor(actor, "create candidates")?;
        let payload = payload.trimmed();
        let mut stage = Stage::Applied;
        validate_fields(&payload, |errors| {
            if let Some(raw) = payload.stage.as_deref() {
                stage = parse_stage(raw, errors).unwrap_or(Stage::Applied);
            }
            check_salary(payload.salary_expectation, errors);
        })?;
        require_membership(self.store.as_ref(), organization_id, actor).await?;

        let candidate = self
            .store
            .insert_candidate(
                NewCandidate {
                    organization_id,
                    full_name: payload.full_name,
                    email: payload.email,
                    phone: payload.phone,
                    stage,
                    salary_expectation: payload.salary_expectation,
                    source: payload.source,
                    created_by: actor.user_id,
                    created_at: None,
                },
                Some(NewActivity::new(ActivityAction::CandidateCreated, actor.user_id)),
            )
            .await?;

        tracing::info!(candidate_id = %candidate.id, %organization_id, stage = %candidate.stage, "candidate created");
        self.cache.invalidate_candidate(organization_id, candidate.id).await;
        Ok(candidate)
    }

    /// Replaces the editable fields. A stage change made through an edit is
    /// logged the same way as a move.
    pub async fn update_candidate(
        &self,
        actor: Option<&Actor>,
        candidate_id: Uuid,
        payload: UpdateCandidatePayload,
    ) -> Result<Candidate> {
        let actor = require_actor(actor, "update candidates")?;
        let payload = payload.trimmed();
        let mut stage = None;
        validate_fields(&payload, |errors| {
            stage = parse_stage(&payload.stage, errors);
            check_salary(payload.salary_expectation, errors);
        })?;
        let stage = stage.ok_or_else(|| Error::Validation(field_error("stage", "stage", "stage is required")))?;

        let current = load_candidate(self.store.as_ref(), candidate_id, actor).await?;
        let activity = (current.stage != stage).then(|| {
            NewActivity::new(
                ActivityAction::StageChanged {
                    from: current.stage,
                    to: stage,
                },
                actor.user_id,
            )
        });

        let candidate = self
            .store
            .update_candidate(
                candidate_id,
                CandidateChanges {
                    full_name: payload.full_name,
                    email: payload.email,
                    phone: payload.phone,
                    stage,
                    salary_expectation: payload.salary_expectation,
                    source: payload.source,
                },
                payload.expected_version,
                activity,
            )
            .await?;

        tracing::info!(%candidate_id, version = candidate.version, "candidate updated");
        self.cache
            .invalidate_candidate(candidate.organization_id, candidate_id)
            .await;
        Ok(candidate)
    }

    /// Deletes the candidate; its notes, files and activity go with it.
    pub async fn delete_candidate(&self, actor: Option<&Actor>, candidate_id: Uuid) -> Result<()> {
        let actor = require_actor(actor, "delete candidates")?;
        let candidate = load_candidate(self.store.as_ref(), candidate_id, actor).await?;
        self.store.delete_candidate(candidate_id).await?;
        tracing::info!(%candidate_id, organization_id = %candidate.organization_id, "candidate deleted");
        self.cache
            .invalidate_candidate(candidate.organization_id, candidate_id)
            .await;
        Ok(())
    }

    /// Candidate plus notes, activity and files. Fails as a whole if any of
    /// the four reads fails.
    pub async fn get_candidate_profile(&self, organization_id: Uuid, candidate_id: Uuid) -> Result<CandidateProfile> {
        let key = CacheKey::candidate_profile(organization_id, candidate_id);
        if let Some(profile) = self.cache.get_profile(&key).await {
            return Ok(profile);
        }
        let generation = self.cache.generation(&key).await;

        let store = self.store.as_ref();
        let (candidate, notes, activity_logs, files) = tokio::try_join!(
            store.get_candidate(candidate_id),
            store.list_notes(candidate_id),
            store.list_activity(candidate_id),
            store.list_files(candidate_id),
        )?;
        let candidate = candidate
            .filter(|c| c.organization_id == organization_id)
            .ok_or_else(|| Error::NotFound(format!("Candidate {} not found", candidate_id)))?;

        let profile = CandidateProfile {
            candidate,
            notes,
            activity_logs,
            files,
        };
        self.cache
            .put(key, generation, CachedValue::CandidateProfile(Box::new(profile.clone())))
            .await;
        Ok(profile)
    }

    pub async fn add_note(&self, actor: Option<&Actor>, candidate_id: Uuid, content: &str) -> Result<Note> {
        let actor = require_actor(actor, "add notes")?;
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::Validation(field_error("content", "length", "content must not be empty")));
        }
        let candidate = load_candidate(self.store.as_ref(), candidate_id, actor).await?;
        let note = self
            .store
            .insert_note(candidate_id, actor.user_id, content.to_string())
            .await?;
        tracing::info!(%candidate_id, note_id = %note.id, "note added");
        self.cache
            .invalidate_key(&CacheKey::candidate_profile(candidate.organization_id, candidate_id))
            .await;
        Ok(note)
    }
}
