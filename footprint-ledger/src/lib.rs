//! Footprint Ledger for EcoTrack
//!
//! Persists activity records with the per-user lifetime stats kept beside
//! them, and serves dashboard reads. Storage is optional: without it, or
//! when it fails, the [`EntryService`] still computes entries and answers
//! reads with empty results plus a warning.
//!
//! # Key Components
//!
//! - [`EntryStore`]: Storage seam, with [`MemoryStore`] and [`MongoStore`]
//! - [`EntryService`]: Logging, preview and dashboard queries

pub mod error;
pub mod service;
pub mod store;

pub use error::{LedgerError, Result};
pub use service::{
    Clock, EntryService, LoggedEntry, Outcome, DEFAULT_HISTORY_WEEKS, DEFAULT_RECENT_DAYS,
    DEFAULT_TREND_WEEKS, NO_STORE_WARNING, TEMP_ID_PREFIX, UNSAVED_WARNING,
};
pub use store::{EntryQuery, EntryStore, LifetimeStats, MemoryStore, MongoStore, UserProfile};
