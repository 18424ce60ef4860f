//! Presence and ownership checks shared by the services.
//!
//! Row-level policies in the store are not relied upon: every id-addressed
//! operation re-checks that the actor belongs to the owning organization.

use uuid::Uuid;

use crate::database::store::PipelineStore;
use crate::error::{Error, Result};
use crate::models::actor::Actor;
use crate::models::candidate::Candidate;

pub fn require_actor<'a>(actor: Option<&'a Actor>, action: &str) -> Result<&'a Actor> {
    actor.ok_or_else(|| Error::Unauthorized(format!("You must be authenticated to {}.", action)))
}

/// Non-members get `NotFound`, so organization ids do not leak.
pub async fn require_membership(store: &dyn PipelineStore, organization_id: Uuid, actor: &Actor) -> Result<()> {
    if store.is_member(organization_id, actor.user_id).await? {
        Ok(())
    } else {
        Err(Error::NotFound(format!("Organization {} not found", organization_id)))
    }
}

/// Loads a candidate the actor may act on.
pub async fn load_candidate(store: &dyn PipelineStore, candidate_id: Uuid, actor: &Actor) -> Result<Candidate> {
    let candidate = store
        .get_candidate(candidate_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Candidate {} not found", candidate_id)))?;
    if !store.is_member(candidate.organization_id, actor.user_id).await? {
        return Err(Error::NotFound(format!("Candidate {} not found", candidate_id)));
    }
    Ok(candidate)
}
