//! Entry storage.
//!
//! The [`EntryStore`] trait is the seam between the entry service and a
//! backing database. Inserting an entry and bumping the owner's lifetime
//! stats is one atomic step for every implementation.

mod memory;
mod mongo;
mod schemas;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use footprint_engine::{ActivityRecord, Category};

use crate::error::Result;

pub use memory::MemoryStore;
pub use mongo::{IntoIndexes, MongoStore};
pub use schemas::{EntryDoc, Metadata, UserDoc, ENTRY_COLLECTION, USER_COLLECTION};

/// Filter for a user's entries. Results are always newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EntryQuery {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub category: Option<Category>,
}

impl EntryQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            ..Self::default()
        }
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            since: Some(start),
            until: Some(end),
            category: None,
        }
    }

    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    /// Inclusive on both bounds
    pub fn matches(&self, record: &ActivityRecord) -> bool {
        self.since.map_or(true, |s| record.date >= s)
            && self.until.map_or(true, |u| record.date <= u)
            && self.category.map_or(true, |c| record.category() == c)
    }
}

/// Denormalized running totals kept on the user profile.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifetimeStats {
    #[serde(default)]
    pub total_emissions: f64,
    #[serde(default)]
    pub total_offsets: f64,
    #[serde(default)]
    pub eco_points: u64,
    #[serde(default)]
    pub trees_planted: u64,
    #[serde(default)]
    pub entries_logged: u64,
}

impl LifetimeStats {
    /// Increment contributed by a single new record
    pub fn delta_for(record: &ActivityRecord) -> Self {
        Self {
            total_emissions: record.co2_emissions,
            total_offsets: record.co2_offset,
            eco_points: u64::from(record.eco_points_earned),
            trees_planted: u64::from(record.trees_planted()),
            entries_logged: 1,
        }
    }

    pub fn apply(&mut self, delta: &LifetimeStats) {
        self.total_emissions += delta.total_emissions;
        self.total_offsets += delta.total_offsets;
        self.eco_points = self.eco_points.saturating_add(delta.eco_points);
        self.trees_planted = self.trees_planted.saturating_add(delta.trees_planted);
        self.entries_logged = self.entries_logged.saturating_add(delta.entries_logged);
    }
}

/// User profile as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub lifetime_stats: LifetimeStats,
    pub joined_date: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
        joined_date: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            name: name.into(),
            avatar_url: None,
            lifetime_stats: LifetimeStats::default(),
            joined_date,
        }
    }

    /// Placeholder profile with zero stats, served when none is stored
    pub fn placeholder(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::new(user_id, "", "Eco Warrior", now)
    }
}

/// Persistence for activity records and user profiles.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Insert a record and add `delta` to its owner's lifetime stats.
    ///
    /// Both happen or neither does. A missing owner profile leaves the
    /// stats untouched. Returns the assigned id.
    async fn insert_entry(&self, record: ActivityRecord, delta: LifetimeStats) -> Result<String>;

    /// A user's records matching `query`, newest first.
    async fn entries_for_user(&self, user_id: &str, query: &EntryQuery) -> Result<Vec<ActivityRecord>>;

    async fn user_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// Create the profile or replace everything but its lifetime stats.
    async fn upsert_user(&self, profile: UserProfile) -> Result<()>;
}
