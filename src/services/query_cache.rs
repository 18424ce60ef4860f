//! Explicit read cache for organization-scoped queries.
//!
//! Entries are keyed by (entity kind, organization, digest). Every mutating
//! operation names the entries it invalidates; entries also expire after a
//! TTL and the oldest go first once the cache is full.
//!
//! Readers take a [`Generation`] before reading the store and hand it back to
//! [`QueryCache::put`]. An invalidation in between bumps the generation, so a
//! result read before a write can never be cached after it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::candidate::{CandidateList, CandidateProfile};
use crate::services::filter_compiler::CompiledFilter;

pub const DEFAULT_CAPACITY: usize = 1024;
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    CandidateList,
    CandidateCount,
    CandidateProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub entity: EntityKind,
    pub organization_id: Uuid,
    pub digest: String,
}

impl CacheKey {
    pub fn candidate_list(organization_id: Uuid, filter: &CompiledFilter) -> Self {
        Self {
            entity: EntityKind::CandidateList,
            organization_id,
            digest: filter_digest(filter),
        }
    }

    pub fn candidate_count(organization_id: Uuid) -> Self {
        Self {
            entity: EntityKind::CandidateCount,
            organization_id,
            digest: String::new(),
        }
    }

    pub fn candidate_profile(organization_id: Uuid, candidate_id: Uuid) -> Self {
        Self {
            entity: EntityKind::CandidateProfile,
            organization_id,
            digest: candidate_id.to_string(),
        }
    }

    fn scope(&self) -> (EntityKind, Uuid) {
        (self.entity, self.organization_id)
    }
}

/// Hex SHA-256 of the filter's JSON form. Absent fields are skipped when
/// serializing, so equal filters always share a digest.
pub fn filter_digest(filter: &CompiledFilter) -> String {
    let json = serde_json::to_vec(filter).unwrap_or_default();
    hex::encode(Sha256::digest(&json))
}

#[derive(Debug, Clone)]
pub enum CachedValue {
    CandidateList(CandidateList),
    CandidateCount(i64),
    CandidateProfile(Box<CandidateProfile>),
}

/// Invalidation counter of one (entity kind, organization) scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

struct Entry {
    value: CachedValue,
    stored_at: Instant,
}

#[derive(Default)]
struct Tables {
    entries: HashMap<CacheKey, Entry>,
    generations: HashMap<(EntityKind, Uuid), u64>,
}

impl Tables {
    fn generation(&self, scope: (EntityKind, Uuid)) -> u64 {
        self.generations.get(&scope).copied().unwrap_or(0)
    }

    fn bump(&mut self, scope: (EntityKind, Uuid)) {
        *self.generations.entry(scope).or_insert(0) += 1;
    }

    /// Drops expired entries, then the oldest ones until there is room for one more.
    fn make_room(&mut self, capacity: usize, ttl: Duration) {
        let now = Instant::now();
        self.entries.retain(|_, entry| now.duration_since(entry.stored_at) < ttl);
        while self.entries.len() >= capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    debug!(entity = ?key.entity, organization_id = %key.organization_id, "evicting cached query");
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[derive(Clone)]
pub struct QueryCache {
    tables: Arc<RwLock<Tables>>,
    capacity: usize,
    ttl: Duration,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::with_limits(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(capacity: usize, ttl: Duration) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Take this before reading the store for `key`.
    pub async fn generation(&self, key: &CacheKey) -> Generation {
        Generation(self.tables.read().await.generation(key.scope()))
    }

    pub async fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        let tables = self.tables.read().await;
        tables
            .entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// Stores `value` unless the key's scope was invalidated since `seen`.
    /// Returns whether the value was kept.
    pub async fn put(&self, key: CacheKey, seen: Generation, value: CachedValue) -> bool {
        let mut tables = self.tables.write().await;
        if tables.generation(key.scope()) != seen.0 {
            debug!(entity = ?key.entity, organization_id = %key.organization_id, "skipping stale cache fill");
            return false;
        }
        if !tables.entries.contains_key(&key) {
            tables.make_room(self.capacity, self.ttl);
        }
        tables.entries.insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
        true
    }

    pub async fn get_list(&self, key: &CacheKey) -> Option<CandidateList> {
        match self.get(key).await {
            Some(CachedValue::CandidateList(list)) => Some(list),
            _ => None,
        }
    }

    pub async fn get_count(&self, key: &CacheKey) -> Option<i64> {
        match self.get(key).await {
            Some(CachedValue::CandidateCount(total)) => Some(total),
            _ => None,
        }
    }

    pub async fn get_profile(&self, key: &CacheKey) -> Option<CandidateProfile> {
        match self.get(key).await {
            Some(CachedValue::CandidateProfile(profile)) => Some(*profile),
            _ => None,
        }
    }

    /// Drops every entry of `entity` for the organization. Returns how many went.
    pub async fn invalidate(&self, entity: EntityKind, organization_id: Uuid) -> usize {
        let mut tables = self.tables.write().await;
        tables.bump((entity, organization_id));
        let before = tables.entries.len();
        tables
            .entries
            .retain(|key, _| !(key.entity == entity && key.organization_id == organization_id));
        before - tables.entries.len()
    }

    /// Drops one entry. In-flight fills anywhere in its scope are discarded too.
    pub async fn invalidate_key(&self, key: &CacheKey) -> bool {
        let mut tables = self.tables.write().await;
        tables.bump(key.scope());
        tables.entries.remove(key).is_some()
    }

    /// Everything a change to one candidate can make stale: the organization's
    /// lists and count, and that candidate's profile.
    pub async fn invalidate_candidate(&self, organization_id: Uuid, candidate_id: Uuid) {
        self.invalidate(EntityKind::CandidateList, organization_id).await;
        self.invalidate(EntityKind::CandidateCount, organization_id).await;
        self.invalidate_key(&CacheKey::candidate_profile(organization_id, candidate_id))
            .await;
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stage::Stage;

    fn list() -> CachedValue {
        CachedValue::CandidateList(CandidateList {
            items: vec![],
            total: 0,
            page: None,
            per_page: None,
        })
    }

    async fn fill(cache: &QueryCache, key: CacheKey, value: CachedValue) {
        let generation = cache.generation(&key).await;
        assert!(cache.put(key, generation, value).await);
    }

    #[test]
    fn equal_filters_share_a_digest() {
        let a = CompiledFilter {
            stage: Some(Stage::Offer),
            ..CompiledFilter::default()
        };
        let b = a.clone();
        let c = CompiledFilter::default();
        assert_eq!(filter_digest(&a), filter_digest(&b));
        assert_ne!(filter_digest(&a), filter_digest(&c));
        assert_eq!(filter_digest(&a).len(), 64);
    }

    #[tokio::test]
    async fn invalidation_is_scoped_to_entity_and_organization() {
        let cache = QueryCache::new();
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        let filter = CompiledFilter::default();
        fill(&cache, CacheKey::candidate_list(org_a, &filter), list()).await;
        fill(&cache, CacheKey::candidate_list(org_b, &filter), list()).await;
        fill(&cache, CacheKey::candidate_count(org_a), CachedValue::CandidateCount(3)).await;

        assert_eq!(cache.invalidate(EntityKind::CandidateList, org_a).await, 1);
        assert!(cache.get_list(&CacheKey::candidate_list(org_b, &filter)).await.is_some());
        assert_eq!(cache.get_count(&CacheKey::candidate_count(org_a)).await, Some(3));
    }

    #[tokio::test]
    async fn candidate_invalidation_clears_lists_count_and_profile() {
        let cache = QueryCache::new();
        let org = Uuid::new_v4();
        let candidate = Uuid::new_v4();
        let other = Uuid::new_v4();
        fill(&cache, CacheKey::candidate_list(org, &CompiledFilter::default()), list()).await;
        fill(&cache, CacheKey::candidate_count(org), CachedValue::CandidateCount(1)).await;
        fill(&cache, CacheKey::candidate_profile(org, other), CachedValue::CandidateCount(0)).await;
        fill(&cache, CacheKey::candidate_profile(org, candidate), CachedValue::CandidateCount(0)).await;

        cache.invalidate_candidate(org, candidate).await;
        assert_eq!(cache.len().await, 1);
        assert!(cache.get(&CacheKey::candidate_profile(org, other)).await.is_some());
    }

    #[tokio::test]
    async fn fill_started_before_an_invalidation_is_dropped() {
        let cache = QueryCache::new();
        let org = Uuid::new_v4();
        let key = CacheKey::candidate_count(org);

        let seen = cache.generation(&key).await;
        cache.invalidate(EntityKind::CandidateCount, org).await;
        assert!(!cache.put(key.clone(), seen, CachedValue::CandidateCount(0)).await);
        assert_eq!(cache.get_count(&key).await, None);

        let fresh = cache.generation(&key).await;
        assert!(cache.put(key.clone(), fresh, CachedValue::CandidateCount(1)).await);
        assert_eq!(cache.get_count(&key).await, Some(1));
    }

    #[tokio::test]
    async fn other_organizations_keep_filling_during_an_invalidation() {
        let cache = QueryCache::new();
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        let key_b = CacheKey::candidate_count(org_b);

        let seen = cache.generation(&key_b).await;
        cache.invalidate(EntityKind::CandidateCount, org_a).await;
        assert!(cache.put(key_b, seen, CachedValue::CandidateCount(2)).await);
    }

    #[tokio::test]
    async fn full_cache_evicts_the_oldest_entry() {
        let cache = QueryCache::with_limits(2, DEFAULT_TTL);
        let org = Uuid::new_v4();
        let first = CacheKey::candidate_profile(org, Uuid::new_v4());
        let second = CacheKey::candidate_profile(org, Uuid::new_v4());
        let third = CacheKey::candidate_profile(org, Uuid::new_v4());

        fill(&cache, first.clone(), CachedValue::CandidateCount(1)).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        fill(&cache, second.clone(), CachedValue::CandidateCount(2)).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        fill(&cache, third.clone(), CachedValue::CandidateCount(3)).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get(&first).await.is_none());
        assert!(cache.get(&second).await.is_some());
        assert!(cache.get(&third).await.is_some());
    }

    #[tokio::test]
    async fn expired_entries_are_not_served() {
        let cache = QueryCache::with_limits(8, Duration::from_millis(20));
        let key = CacheKey::candidate_count(Uuid::new_v4());
        fill(&cache, key.clone(), CachedValue::CandidateCount(4)).await;
        assert_eq!(cache.get_count(&key).await, Some(4));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get_count(&key).await, None);
    }
}
