use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::database::store::PipelineStore;
use crate::dto::organization_dto::BootstrapOrganizationPayload;
use crate::error::{Error, Result};
use crate::models::actor::Actor;
use crate::models::organization::{Organization, OrganizationSettings};
use crate::services::access::{require_actor, require_membership};

pub const DEFAULT_ORGANIZATION_NAME: &str = "My Company";

#[derive(Clone)]
pub struct OrganizationService {
    store: Arc<dyn PipelineStore>,
}

impl OrganizationService {
    pub fn new(store: Arc<dyn PipelineStore>) -> Self {
        Self { store }
    }

    /// Creates an organization owned by the actor, with its settings row.
    pub async fn bootstrap(&self, actor: Option<&Actor>, payload: BootstrapOrganizationPayload) -> Result<Organization> {
        let actor = require_actor(actor, "create an organization")?;
        payload.validate()?;
        let name = payload
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_ORGANIZATION_NAME);

        let organization = self.store.bootstrap_organization(name, actor.user_id).await?;
        tracing::info!(organization_id = %organization.id, owner = %actor.user_id, "organization bootstrapped");
        Ok(organization)
    }

    /// The actor's oldest membership, if any.
    pub async fn current_organization(&self, actor: Option<&Actor>) -> Result<Option<Organization>> {
        let actor = require_actor(actor, "load organizations")?;
        let organizations = self.store.list_member_organizations(actor.user_id).await?;
        Ok(organizations.into_iter().next())
    }

    pub async fn require_member(&self, actor: Option<&Actor>, organization_id: Uuid) -> Result<()> {
        let actor = require_actor(actor, "access this organization")?;
        require_membership(self.store.as_ref(), organization_id, actor).await
    }

    pub async fn get_settings(&self, actor: Option<&Actor>, organization_id: Uuid) -> Result<OrganizationSettings> {
        self.require_member(actor, organization_id).await?;
        self.store
            .get_settings(organization_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Settings for organization {} not found", organization_id)))
    }

    pub async fn mark_demo_onboarding_seen(
        &self,
        actor: Option<&Actor>,
        organization_id: Uuid,
    ) -> Result<OrganizationSettings> {
        self.require_member(actor, organization_id).await?;
        let settings = self.store.mark_demo_onboarding_seen(organization_id).await?;
        tracing::info!(%organization_id, "demo onboarding marked as seen");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    fn service() -> OrganizationService {
        OrganizationService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn bootstrap_defaults_name_and_creates_settings() {
        let service = service();
        let actor = Actor::new(Uuid::new_v4());
        let org = service
            .bootstrap(Some(&actor), BootstrapOrganizationPayload::default())
            .await
            .unwrap();
        assert_eq!(org.name, DEFAULT_ORGANIZATION_NAME);

        let settings = service.get_settings(Some(&actor), org.id).await.unwrap();
        assert!(!settings.onboarding_demo_seen);
        let settings = service.mark_demo_onboarding_seen(Some(&actor), org.id).await.unwrap();
        assert!(settings.onboarding_demo_seen);
    }

    #[tokio::test]
    async fn current_organization_is_the_first_membership() {
        let service = service();
        let actor = Actor::new(Uuid::new_v4());
        assert_eq!(service.current_organization(Some(&actor)).await.unwrap(), None);

        let first = service
            .bootstrap(
                Some(&actor),
                BootstrapOrganizationPayload {
                    name: Some("  Acme  ".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(first.name, "Acme");
        service
            .bootstrap(
                Some(&actor),
                BootstrapOrganizationPayload {
                    name: Some("Second".into()),
                },
            )
            .await
            .unwrap();
        let current = service.current_organization(Some(&actor)).await.unwrap().unwrap();
        assert_eq!(current.id, first.id);
    }

    #[tokio::test]
    async fn outsiders_see_not_found() {
        let service = service();
        let owner = Actor::new(Uuid::new_v4());
        let org = service
            .bootstrap(Some(&owner), BootstrapOrganizationPayload::default())
            .await
            .unwrap();
        let stranger = Actor::new(Uuid::new_v4());
        let err = service.get_settings(Some(&stranger), org.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = service.bootstrap(None, BootstrapOrganizationPayload::default()).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }
}
