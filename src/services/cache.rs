//! Normalized entity cache.
//!
//! One cache per client session, keyed by entity identity. Entries are
//! created on first fetch, refreshed on re-fetch and by the reconciler, and
//! never deleted.

use crate::models::entity::{Entity, EntityId};
use crate::models::page::Page;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A cached entity with the time it was last written.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub entity: Entity,
    pub cached_at: DateTime<Utc>,
}

/// Process-wide store of last-known entity values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityCache {
    entries: HashMap<EntityId, CacheEntry>,
}

impl EntityCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entries.contains_key(id)
    }

    /// Last-known value of an entity.
    pub fn read(&self, id: &EntityId) -> Option<&Entity> {
        self.entries.get(id).map(|entry| &entry.entity)
    }

    /// Cache entry including write time.
    pub fn entry(&self, id: &EntityId) -> Option<&CacheEntry> {
        self.entries.get(id)
    }

    /// Identities currently cached.
    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entries.keys()
    }

    /// Record a fetched entity.
    ///
    /// A fetch may select fewer fields than an earlier one, so fetched fields
    /// are merged into an existing entry instead of replacing it.
    pub fn write_fetched(&mut self, entity: Entity) {
        let cached_at = Utc::now();
        match self.entries.get_mut(&entity.id) {
            Some(entry) => {
                entry.entity.merge_from(entity);
                entry.cached_at = cached_at;
            }
            None => {
                log::debug!("[cache] New entity {}", entity.id);
                self.entries
                    .insert(entity.id.clone(), CacheEntry { entity, cached_at });
            }
        }
    }

    /// Record every entity of a fetched page. Returns the number written.
    pub fn ingest_page(&mut self, page: &Page<Entity>) -> usize {
        for entity in &page.items {
            self.write_fetched(entity.clone());
        }
        page.items.len()
    }

    /// Replace an existing entity with a reconciled value.
    pub(crate) fn replace(&mut self, entity: Entity) {
        self.entries.insert(
            entity.id.clone(),
            CacheEntry {
                entity,
                cached_at: Utc::now(),
            },
        );
    }
}
