//! MongoDB entry store.
//!
//! Entries and users live in two collections. An entry insert and the
//! `$inc` of its owner's `lifetimeStats` run in one session transaction,
//! which needs a replica set; standalone servers can opt out with
//! [`MongoStore::with_transactions`].

use async_trait::async_trait;
use bson::{doc, Bson, DateTime, Document};
use futures_util::StreamExt;
use mongodb::{options::IndexOptions, Client, Collection, IndexModel};
use tracing::{debug, error, info};

use footprint_engine::ActivityRecord;

use super::schemas::{EntryDoc, UserDoc, ENTRY_COLLECTION, USER_COLLECTION};
use super::{EntryQuery, EntryStore, LifetimeStats, UserProfile};
use crate::error::{LedgerError, Result};

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Entry store backed by MongoDB.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    entries: Collection<EntryDoc>,
    users: Collection<UserDoc>,
    transactions: bool,
}

impl MongoStore {
    /// Connect, verify with a ping and apply collection indexes.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| LedgerError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        let database = client.database(db_name);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| LedgerError::Database(format!("MongoDB ping failed: {}", e)))?;

        let entries = database.collection::<EntryDoc>(ENTRY_COLLECTION);
        let users = database.collection::<UserDoc>(USER_COLLECTION);
        apply_indexes(&entries).await?;
        apply_indexes(&users).await?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            entries,
            users,
            transactions: true,
        })
    }

    /// Toggle session transactions for entry inserts
    pub fn with_transactions(mut self, enabled: bool) -> Self {
        self.transactions = enabled;
        self
    }

    async fn insert_with_transaction(
        &self,
        entry: &EntryDoc,
        owner: Document,
        update: Document,
    ) -> Result<Bson> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        let inserted = match self.entries.insert_one(entry).session(&mut session).await {
            Ok(result) => result.inserted_id,
            Err(e) => {
                let _ = session.abort_transaction().await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.users.update_one(owner, update).session(&mut session).await {
            let _ = session.abort_transaction().await;
            return Err(e.into());
        }

        session.commit_transaction().await?;
        Ok(inserted)
    }

    async fn insert_without_transaction(
        &self,
        entry: &EntryDoc,
        owner: Document,
        update: Document,
    ) -> Result<Bson> {
        let inserted = self.entries.insert_one(entry).await?.inserted_id;
        self.users.update_one(owner, update).await?;
        Ok(inserted)
    }
}

/// Apply schema-defined indexes
async fn apply_indexes<T>(collection: &Collection<T>) -> Result<()>
where
    T: IntoIndexes + Send + Sync,
{
    let indices: Vec<IndexModel> = T::into_indices()
        .into_iter()
        .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
        .collect();

    if indices.is_empty() {
        return Ok(());
    }

    collection
        .create_indexes(indices)
        .await
        .map_err(|e| LedgerError::Database(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Filter document for a user's entries
pub(crate) fn entry_filter(user_id: &str, query: &EntryQuery) -> Document {
    let mut filter = doc! {
        "userId": user_id,
        "metadata.is_deleted": { "$ne": true },
    };

    let mut date = Document::new();
    if let Some(since) = query.since {
        date.insert("$gte", DateTime::from_chrono(since));
    }
    if let Some(until) = query.until {
        date.insert("$lte", DateTime::from_chrono(until));
    }
    if !date.is_empty() {
        filter.insert("date", date);
    }

    if let Some(category) = query.category {
        filter.insert("type", category.as_str());
    }

    filter
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// `$inc` update applying a lifetime stats delta
pub(crate) fn stats_increment(delta: &LifetimeStats) -> Document {
    doc! {
        "$inc": {
            "lifetimeStats.totalEmissions": delta.total_emissions,
            "lifetimeStats.totalOffsets": delta.total_offsets,
            "lifetimeStats.ecoPoints": saturating_i64(delta.eco_points),
            "lifetimeStats.treesPlanted": saturating_i64(delta.trees_planted),
            "lifetimeStats.entriesLogged": saturating_i64(delta.entries_logged),
        },
        "$set": { "metadata.updated_at": DateTime::now() },
    }
}

#[async_trait]
impl EntryStore for MongoStore {
    fn name(&self) -> &str {
        "mongodb"
    }

    async fn insert_entry(&self, record: ActivityRecord, delta: LifetimeStats) -> Result<String> {
        let entry = EntryDoc::from_record(&record);
        let owner = doc! { "userId": record.user_id.as_str() };
        let update = stats_increment(&delta);

        let inserted = if self.transactions {
            self.insert_with_transaction(&entry, owner, update).await?
        } else {
            self.insert_without_transaction(&entry, owner, update).await?
        };

        let id = inserted
            .as_object_id()
            .map(|oid| oid.to_hex())
            .ok_or_else(|| LedgerError::Database("Failed to get inserted ID".into()))?;

        debug!(entry_id = %id, user_id = %record.user_id, "Stored entry");
        Ok(id)
    }

    async fn entries_for_user(&self, user_id: &str, query: &EntryQuery) -> Result<Vec<ActivityRecord>> {
        let cursor = self
            .entries
            .find(entry_filter(user_id, query))
            .sort(doc! { "date": -1 })
            .await
            .map_err(|e| LedgerError::Database(format!("Find failed: {}", e)))?;

        let records: Vec<ActivityRecord> = cursor
            .filter_map(|entry| async {
                match entry {
                    Ok(e) => Some(e.into_record()),
                    Err(e) => {
                        error!("Error reading entry document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(records)
    }

    async fn user_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let user = self
            .users
            .find_one(doc! { "userId": user_id, "metadata.is_deleted": { "$ne": true } })
            .await?;
        Ok(user.map(UserDoc::into_profile))
    }

    async fn upsert_user(&self, profile: UserProfile) -> Result<()> {
        let now = DateTime::now();
        let update = doc! {
            "$set": {
                "email": profile.email.as_str(),
                "name": profile.name.as_str(),
                "avatarUrl": profile.avatar_url.clone(),
                "joinedDate": DateTime::from_chrono(profile.joined_date),
                "metadata.updated_at": now,
            },
            "$setOnInsert": {
                "lifetimeStats": bson::to_bson(&profile.lifetime_stats)?,
                "metadata.is_deleted": false,
                "metadata.created_at": now,
            },
        };

        self.users
            .update_one(doc! { "userId": profile.user_id.as_str() }, update)
            .upsert(true)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Round trips against a server need a running MongoDB instance;
    // these cover the documents the store sends.
    use super::*;
    use footprint_engine::Category;

    #[test]
    fn test_entry_filter_without_bounds() {
        let filter = entry_filter("u1", &EntryQuery::all());
        assert_eq!(filter.get_str("userId").unwrap(), "u1");
        assert!(!filter.contains_key("date"));
        assert!(!filter.contains_key("type"));
    }

    #[test]
    fn test_entry_filter_with_range_and_category() {
        let query = EntryQuery::between(
            "2024-03-01T00:00:00Z".parse().unwrap(),
            "2024-03-31T00:00:00Z".parse().unwrap(),
        )
        .with_category(Some(Category::Plantation));
        let filter = entry_filter("u1", &query);

        let date = filter.get_document("date").unwrap();
        assert!(date.get_datetime("$gte").is_ok());
        assert!(date.get_datetime("$lte").is_ok());
        assert_eq!(filter.get_str("type").unwrap(), "plantation");
    }

    #[test]
    fn test_stats_increment() {
        let delta = LifetimeStats {
            total_emissions: 0.0,
            total_offsets: 150.0,
            eco_points: 50,
            trees_planted: 5,
            entries_logged: 1,
        };
        let update = stats_increment(&delta);
        let inc = update.get_document("$inc").unwrap();

        assert_eq!(inc.get_f64("lifetimeStats.totalOffsets").unwrap(), 150.0);
        assert_eq!(inc.get_i64("lifetimeStats.ecoPoints").unwrap(), 50);
        assert_eq!(inc.get_i64("lifetimeStats.entriesLogged").unwrap(), 1);
        assert_eq!(saturating_i64(u64::MAX), i64::MAX);
    }
}
