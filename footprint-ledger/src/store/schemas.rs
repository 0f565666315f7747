//! MongoDB document schemas for entries and users.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use footprint_engine::{ActivityInput, ActivityRecord};

use super::mongo::IntoIndexes;
use super::{LifetimeStats, UserProfile};

/// Collection name for activity entries
pub const ENTRY_COLLECTION: &str = "entries";

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Common metadata for all documents
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    /// Whether this document has been soft-deleted
    #[serde(default)]
    pub is_deleted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Metadata {
    pub fn new() -> Self {
        let now = DateTime::now();
        Self {
            is_deleted: false,
            updated_at: Some(now),
            created_at: Some(now),
        }
    }
}

/// Activity entry stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: String,

    pub date: DateTime,

    /// `type` and `details` fields
    #[serde(flatten)]
    pub activity: ActivityInput,

    pub co2_emissions: f64,

    pub co2_offset: f64,

    #[serde(default)]
    pub eco_points_earned: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_consumed: Option<f64>,
}

impl EntryDoc {
    /// New document for a record; any id on the record is ignored
    pub fn from_record(record: &ActivityRecord) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            user_id: record.user_id.clone(),
            date: DateTime::from_chrono(record.date),
            activity: record.activity.clone(),
            co2_emissions: record.co2_emissions,
            co2_offset: record.co2_offset,
            eco_points_earned: record.eco_points_earned,
            fuel_consumed: record.fuel_consumed,
        }
    }

    pub fn into_record(self) -> ActivityRecord {
        ActivityRecord {
            id: self.id.map(|oid| oid.to_hex()),
            user_id: self.user_id,
            date: self.date.to_chrono(),
            activity: self.activity,
            co2_emissions: self.co2_emissions,
            co2_offset: self.co2_offset,
            eco_points_earned: self.eco_points_earned,
            fuel_consumed: self.fuel_consumed,
        }
    }
}

impl IntoIndexes for EntryDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // History and weekly windows
            (
                doc! { "userId": 1, "date": -1 },
                Some(
                    IndexOptions::builder()
                        .name("user_date_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "userId": 1, "type": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_type_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: String,

    pub email: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    #[serde(default)]
    pub lifetime_stats: LifetimeStats,

    pub joined_date: DateTime,
}

impl UserDoc {
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            user_id: profile.user_id.clone(),
            email: profile.email.clone(),
            name: profile.name.clone(),
            avatar_url: profile.avatar_url.clone(),
            lifetime_stats: profile.lifetime_stats,
            joined_date: DateTime::from_chrono(profile.joined_date),
        }
    }

    pub fn into_profile(self) -> UserProfile {
        UserProfile {
            user_id: self.user_id,
            email: self.email,
            name: self.name,
            avatar_url: self.avatar_url,
            lifetime_stats: self.lifetime_stats,
            joined_date: self.joined_date.to_chrono(),
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "userId": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}
