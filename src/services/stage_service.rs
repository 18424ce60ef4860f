use std::sync::Arc;

use uuid::Uuid;

use crate::database::store::PipelineStore;
use crate::error::{Error, Result};
use crate::models::actor::Actor;
use crate::models::candidate::{Candidate, StageTransition};
use crate::models::stage::Stage;
use crate::services::access::{load_candidate, require_actor};
use crate::services::query_cache::QueryCache;
use crate::utils::validation::field_error;

#[derive(Clone)]
pub struct StageService {
    store: Arc<dyn PipelineStore>,
    cache: QueryCache,
}

impl StageService {
    pub fn new(store: Arc<dyn PipelineStore>, cache: QueryCache) -> Self {
        Self { store, cache }
    }

    /// Moves a candidate to `stage` and records the move in its activity log.
    ///
    /// Moving to the current stage returns the candidate untouched. Passing
    /// `expected_version` turns a concurrent write into `Conflict` instead of
    /// last-write-wins.
    pub async fn move_candidate_stage(
        &self,
        actor: Option<&Actor>,
        candidate_id: Uuid,
        stage: &str,
        expected_version: Option<i32>,
    ) -> Result<Candidate> {
        let actor = require_actor(actor, "move candidates")?;
        let target = stage
            .parse::<Stage>()
            .map_err(|e| Error::Validation(field_error("stage", "stage", e.to_string())))?;

        let current = load_candidate(self.store.as_ref(), candidate_id, actor).await?;
        let transition = self
            .store
            .transition_stage(candidate_id, target, expected_version, actor.user_id)
            .await?;

        match &transition {
            StageTransition::Unchanged(_) => {
                tracing::debug!(%candidate_id, stage = %target, "stage unchanged");
            }
            StageTransition::Moved { activity, .. } => {
                tracing::info!(
                    %candidate_id,
                    from = %current.stage,
                    to = %target,
                    activity_id = %activity.id,
                    "candidate stage moved"
                );
                self.cache
                    .invalidate_candidate(current.organization_id, candidate_id)
                    .await;
            }
        }
        Ok(transition.into_candidate())
    }
}
