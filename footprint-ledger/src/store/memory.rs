//! In-memory entry store.
//!
//! Used for offline runs and tests. Entries and profiles live behind one
//! lock so an insert and its stats update are never observed apart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use footprint_engine::ActivityRecord;

use super::{EntryQuery, EntryStore, LifetimeStats, UserProfile};
use crate::error::Result;

#[derive(Debug, Default)]
struct Ledger {
    entries: Vec<ActivityRecord>,
    users: HashMap<String, UserProfile>,
}

/// Entry store held in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Ledger>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries across all users.
    pub async fn entry_count(&self) -> usize {
        self.inner.read().await.entries.len()
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn insert_entry(&self, mut record: ActivityRecord, delta: LifetimeStats) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        record.id = Some(id.clone());

        let mut ledger = self.inner.write().await;
        if let Some(user) = ledger.users.get_mut(&record.user_id) {
            user.lifetime_stats.apply(&delta);
        }
        debug!(entry_id = %id, user_id = %record.user_id, "Stored entry");
        ledger.entries.push(record);

        Ok(id)
    }

    async fn entries_for_user(&self, user_id: &str, query: &EntryQuery) -> Result<Vec<ActivityRecord>> {
        let ledger = self.inner.read().await;
        let mut entries: Vec<ActivityRecord> = ledger
            .entries
            .iter()
            .filter(|r| r.user_id == user_id && query.matches(r))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(entries)
    }

    async fn user_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.inner.read().await.users.get(user_id).cloned())
    }

    async fn upsert_user(&self, mut profile: UserProfile) -> Result<()> {
        let mut ledger = self.inner.write().await;
        if let Some(existing) = ledger.users.get(&profile.user_id) {
            profile.lifetime_stats = existing.lifetime_stats;
        }
        ledger.users.insert(profile.user_id.clone(), profile);
        Ok(())
    }
}
