use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::database::store::PipelineStore;
use crate::error::{Error, Result};
use crate::models::actor::Actor;
use crate::models::candidate::{Candidate, NewCandidate};
use crate::models::stage::Stage;
use crate::services::access::{require_actor, require_membership};
use crate::services::query_cache::{EntityKind, QueryCache};
use crate::utils::time::now;

struct DemoCandidate {
    full_name: &'static str,
    email: &'static str,
    stage: Stage,
    salary: i64,
    source: &'static str,
    phone: &'static str,
    days_ago: i64,
}

const DEMO_CANDIDATES: [DemoCandidate; 10] = [
    DemoCandidate { full_name: "Ana Torres", email: "ana.torres@demo.ats", stage: Stage::Applied, salary: 35000, source: "LinkedIn", phone: "+34 600 111 111", days_ago: 2 },
    DemoCandidate { full_name: "Bruno Diaz", email: "bruno.diaz@demo.ats", stage: Stage::Screening, salary: 42000, source: "Referral", phone: "+34 600 222 222", days_ago: 6 },
    DemoCandidate { full_name: "Carla Mendez", email: "carla.mendez@demo.ats", stage: Stage::Interview, salary: 50000, source: "Indeed", phone: "+34 600 333 333", days_ago: 10 },
    DemoCandidate { full_name: "Diego Herrera", email: "diego.herrera@demo.ats", stage: Stage::Offer, salary: 60000, source: "LinkedIn", phone: "+34 600 444 444", days_ago: 14 },
    DemoCandidate { full_name: "Elena Soto", email: "elena.soto@demo.ats", stage: Stage::Hired, salary: 65000, source: "Referral", phone: "+34 600 555 555", days_ago: 20 },
    DemoCandidate { full_name: "Fabian Ruiz", email: "fabian.ruiz@demo.ats", stage: Stage::Rejected, salary: 38000, source: "Website", phone: "+34 600 666 666", days_ago: 8 },
    DemoCandidate { full_name: "Gabriela Cruz", email: "gabriela.cruz@demo.ats", stage: Stage::Screening, salary: 47000, source: "LinkedIn", phone: "+34 600 777 777", days_ago: 4 },
    DemoCandidate { full_name: "Hector Lima", email: "hector.lima@demo.ats", stage: Stage::Applied, salary: 33000, source: "Website", phone: "+34 600 888 888", days_ago: 1 },
    DemoCandidate { full_name: "Irene Martin", email: "irene.martin@demo.ats", stage: Stage::Interview, salary: 54000, source: "Referral", phone: "+34 600 999 999", days_ago: 9 },
    DemoCandidate { full_name: "Javier Nunez", email: "javier.nunez@demo.ats", stage: Stage::Offer, salary: 59000, source: "LinkedIn", phone: "+34 600 000 123", days_ago: 12 },
];

/// The demo rows stamped relative to `now`. Each row is pushed back a further
/// 30 seconds by its position so ordering is stable even for equal `days_ago`.
fn demo_rows(organization_id: Uuid, created_by: Uuid, now: DateTime<Utc>) -> Vec<NewCandidate> {
    DEMO_CANDIDATES
        .iter()
        .enumerate()
        .map(|(index, demo)| NewCandidate {
            organization_id,
            full_name: demo.full_name.to_string(),
            email: demo.email.to_string(),
            phone: Some(demo.phone.to_string()),
            stage: demo.stage,
            salary_expectation: Some(Decimal::from(demo.salary)),
            source: Some(demo.source.to_string()),
            created_by,
            created_at: Some(
                now - Duration::milliseconds(demo.days_ago * 86_400_000) - Duration::milliseconds(index as i64 * 30_000),
            ),
        })
        .collect()
}

#[derive(Clone)]
pub struct SeedService {
    store: Arc<dyn PipelineStore>,
    cache: QueryCache,
}

impl SeedService {
    pub fn new(store: Arc<dyn PipelineStore>, cache: QueryCache) -> Self {
        Self { store, cache }
    }

    pub async fn seed_demo_candidates(&self, actor: Option<&Actor>, organization_id: Uuid) -> Result<Vec<Candidate>> {
        self.seed_demo_candidates_at(actor, organization_id, now()).await
    }

    /// Fills an empty pipeline with the demo catalog. No notes, files or
    /// activity are created.
    ///
    /// The emptiness check and the insert are separate store calls, so two
    /// concurrent seeds can both pass the check.
    pub async fn seed_demo_candidates_at(
        &self,
        actor: Option<&Actor>,
        organization_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Candidate>> {
        let actor = require_actor(actor, "seed demo candidates")?;
        require_membership(self.store.as_ref(), organization_id, actor).await?;

        let existing = self.store.count_candidates(organization_id).await?;
        if existing > 0 {
            tracing::warn!(%organization_id, existing, "refusing to seed a non-empty pipeline");
            return Err(Error::Precondition("pipeline not empty".to_string()));
        }

        let inserted = self
            .store
            .insert_candidates(demo_rows(organization_id, actor.user_id, now))
            .await?;
        tracing::info!(%organization_id, inserted = inserted.len(), "seeded demo candidates");
        self.cache.invalidate(EntityKind::CandidateList, organization_id).await;
        self.cache.invalidate(EntityKind::CandidateCount, organization_id).await;
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn rows_are_backdated_by_days_and_position() {
        let now = at("2024-05-15T12:00:00Z");
        let rows = demo_rows(Uuid::nil(), Uuid::nil(), now);
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].created_at, Some(at("2024-05-13T12:00:00Z")));
        // Bruno: 6 days and one 30s step back
        assert_eq!(rows[1].created_at, Some(at("2024-05-09T11:59:30Z")));
        assert_eq!(rows[9].full_name, "Javier Nunez");
        assert_eq!(rows[9].phone.as_deref(), Some("+34 600 000 123"));
        assert!(rows.iter().all(|r| r.email.ends_with("@demo.ats")));
    }

    #[tokio::test]
    async fn seeds_ten_candidates_once() {
        let store = Arc::new(MemoryStore::new());
        let actor = Actor::new(Uuid::new_v4());
        let org = store.bootstrap_organization("Acme", actor.user_id).await.unwrap();
        let service = SeedService::new(store.clone(), QueryCache::new());

        let seeded = service.seed_demo_candidates(Some(&actor), org.id).await.unwrap();
        assert_eq!(seeded.len(), 10);
        assert!(seeded.iter().all(|c| c.created_by == actor.user_id));
        assert_eq!(store.count_candidates(org.id).await.unwrap(), 10);
        for candidate in &seeded {
            assert!(store.list_activity(candidate.id).await.unwrap().is_empty());
        }

        let err = service.seed_demo_candidates(Some(&actor), org.id).await.unwrap_err();
        assert!(matches!(err, Error::Precondition(ref m) if m == "pipeline not empty"));
        assert_eq!(store.count_candidates(org.id).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn seeding_requires_an_actor() {
        let service = SeedService::new(Arc::new(MemoryStore::new()), QueryCache::new());
        let err = service.seed_demo_candidates(None, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }
}
