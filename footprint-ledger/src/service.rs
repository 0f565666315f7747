//! Entry service: calculation plus persistence with degraded mode.
//!
//! Writes validate and compute first, then try to persist. When storage is
//! absent or failing, a computed entry is still returned, flagged unsaved
//! with a temporary id. Reads fall back to empty results with a warning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use footprint_engine::{
    aggregate, ActivityInput, ActivityRecord, Assessment, Calculator, Category, CategoryTotals,
    FootprintError, History, LifetimeSummary, WeeklyTrend,
};

use crate::error::{LedgerError, Result};
use crate::store::{EntryQuery, EntryStore, LifetimeStats, UserProfile};

/// Warning attached to entries that were computed but not persisted
pub const UNSAVED_WARNING: &str = "Entry calculated but not saved (database not connected)";

/// Warning attached to reads served without a store
pub const NO_STORE_WARNING: &str = "Database not connected";

/// Prefix of ids handed out to unsaved entries
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Default history window in weeks
pub const DEFAULT_HISTORY_WEEKS: u32 = 4;

/// Default weekly trend window in weeks
pub const DEFAULT_TREND_WEEKS: u32 = 12;

/// Default recent-activity window in days
pub const DEFAULT_RECENT_DAYS: u32 = 7;

/// Result of logging an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedEntry {
    pub entry: ActivityRecord,
    pub saved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Read result that may have been served degraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl<T> Outcome<T> {
    pub fn ok(data: T) -> Self {
        Self { data, warning: None }
    }

    pub fn degraded(data: T, warning: impl Into<String>) -> Self {
        Self {
            data,
            warning: Some(warning.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            data: f(self.data),
            warning: self.warning,
        }
    }
}

/// Source of the current instant
pub type Clock = fn() -> DateTime<Utc>;

/// Logs activities and serves dashboard reads for users.
#[derive(Clone)]
pub struct EntryService {
    calculator: Calculator,
    store: Option<Arc<dyn EntryStore>>,
    clock: Clock,
}

impl EntryService {
    /// Service without storage; every write is unsaved.
    pub fn new(calculator: Calculator) -> Self {
        Self {
            calculator,
            store: None,
            clock: Utc::now,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn EntryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn calculator(&self) -> &Calculator {
        &self.calculator
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Validate and compute an activity without touching storage.
    pub fn preview(&self, input: &ActivityInput) -> Result<Assessment> {
        input.validate()?;
        Ok(self.calculator.assess(input)?)
    }

    /// Validate, compute and persist an activity.
    ///
    /// Invalid input and unknown energy sources are errors. Storage
    /// problems are not: the computed entry comes back with
    /// `saved = false`.
    pub async fn log_entry(
        &self,
        user_id: &str,
        input: ActivityInput,
        date: Option<DateTime<Utc>>,
    ) -> Result<LoggedEntry> {
        if user_id.trim().is_empty() {
            return Err(FootprintError::InvalidInput("userId is required".to_string()).into());
        }
        let assessment = self.preview(&input)?;

        let now = self.now();
        let mut record = ActivityRecord::new(user_id, date.unwrap_or(now), input, assessment);
        let delta = LifetimeStats::delta_for(&record);

        let failure = match &self.store {
            Some(store) => match store.insert_entry(record.clone(), delta).await {
                Ok(id) => {
                    debug!(user_id, entry_id = %id, category = %record.category(), "Logged entry");
                    record.id = Some(id);
                    return Ok(LoggedEntry {
                        entry: record,
                        saved: true,
                        warning: None,
                    });
                }
                Err(e) => e.to_string(),
            },
            None => NO_STORE_WARNING.to_string(),
        };

        warn!(user_id, reason = %failure, "Entry not persisted, returning computed result");
        record.id = Some(format!("{}{}", TEMP_ID_PREFIX, now.timestamp_millis()));
        Ok(LoggedEntry {
            entry: record,
            saved: false,
            warning: Some(UNSAVED_WARNING.to_string()),
        })
    }

    async fn load(&self, user_id: &str, query: &EntryQuery) -> Outcome<Vec<ActivityRecord>> {
        let Some(store) = &self.store else {
            return Outcome::degraded(Vec::new(), NO_STORE_WARNING);
        };
        match store.entries_for_user(user_id, query).await {
            Ok(records) => Outcome::ok(records),
            Err(e) => {
                warn!(user_id, store = store.name(), error = %e, "Entry read failed, serving empty result");
                Outcome::degraded(Vec::new(), unavailable(&e))
            }
        }
    }

    /// Entries of the last `weeks` weeks, optionally one category, with totals.
    pub async fn history(&self, user_id: &str, weeks: u32, category: Option<Category>) -> Outcome<History> {
        let since = aggregate::window_start(self.now(), weeks);
        let query = EntryQuery::since(since).with_category(category);
        self.load(user_id, &query)
            .await
            .map(|records| aggregate::history(&records, Some(since), category))
    }

    /// Entries of the last `days` days, newest first.
    pub async fn recent(&self, user_id: &str, days: u32) -> Outcome<Vec<ActivityRecord>> {
        let now = self.now();
        let since = aggregate::window_start_days(now, days);
        self.load(user_id, &EntryQuery::since(since))
            .await
            .map(|records| aggregate::recent_entries(&records, days, now))
    }

    /// Lifetime totals across every entry of the user.
    pub async fn summary(&self, user_id: &str) -> Outcome<LifetimeSummary> {
        self.load(user_id, &EntryQuery::all())
            .await
            .map(|records| aggregate::lifetime_summary(&records))
    }

    /// Weekly buckets of the last `weeks` weeks and their latest change.
    pub async fn weekly(&self, user_id: &str, weeks: u32) -> Outcome<WeeklyTrend> {
        let now = self.now();
        let query = EntryQuery::since(aggregate::window_start(now, weeks));
        self.load(user_id, &query)
            .await
            .map(|records| aggregate::weekly_trend(&records, weeks, now))
    }

    /// Per-category totals for `start <= date <= end`.
    pub async fn breakdown(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Outcome<BTreeMap<Category, CategoryTotals>> {
        self.load(user_id, &EntryQuery::between(start, end))
            .await
            .map(|records| aggregate::category_breakdown_between(&records, start, end))
    }

    /// Stored profile, or a zero-stats placeholder.
    pub async fn profile(&self, user_id: &str) -> Outcome<UserProfile> {
        let placeholder = || UserProfile::placeholder(user_id, self.now());
        let Some(store) = &self.store else {
            return Outcome::degraded(placeholder(), NO_STORE_WARNING);
        };
        match store.user_profile(user_id).await {
            Ok(Some(profile)) => Outcome::ok(profile),
            Ok(None) => Outcome::ok(placeholder()),
            Err(e) => {
                warn!(user_id, store = store.name(), error = %e, "Profile read failed, serving placeholder");
                Outcome::degraded(placeholder(), unavailable(&e))
            }
        }
    }

    /// Create or update a user profile. Requires storage.
    pub async fn register(&self, profile: UserProfile) -> Result<()> {
        if profile.user_id.trim().is_empty() {
            return Err(FootprintError::InvalidInput("userId is required".to_string()).into());
        }
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| LedgerError::Database(NO_STORE_WARNING.to_string()))?;
        store.upsert_user(profile).await
    }
}

fn unavailable(err: &LedgerError) -> String {
    format!("Database unavailable: {}", err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use footprint_engine::{EnergyInput, FactorTable, PlantationInput, PlasticInput, SurvivalScaling, VehicleInput};

    /// Store whose every call fails
    struct BrokenStore;

    #[async_trait]
    impl EntryStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }

        async fn insert_entry(&self, _: ActivityRecord, _: LifetimeStats) -> Result<String> {
            Err(LedgerError::Database("connection refused".into()))
        }

        async fn entries_for_user(&self, _: &str, _: &EntryQuery) -> Result<Vec<ActivityRecord>> {
            Err(LedgerError::Database("connection refused".into()))
        }

        async fn user_profile(&self, _: &str) -> Result<Option<UserProfile>> {
            Err(LedgerError::Database("connection refused".into()))
        }

        async fn upsert_user(&self, _: UserProfile) -> Result<()> {
            Err(LedgerError::Database("connection refused".into()))
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        "2024-03-31T12:00:00Z".parse().unwrap()
    }

    fn at(ts: &str) -> DateTime<Utc> {
        ts.parse().unwrap()
    }

    fn service(store: Option<Arc<dyn EntryStore>>) -> EntryService {
        let service = EntryService::new(Calculator::new(FactorTable::default())).with_clock(fixed_now);
        match store {
            Some(store) => service.with_store(store),
            None => service,
        }
    }

    fn car(km: f64) -> ActivityInput {
        ActivityInput::Vehicle(VehicleInput {
            distance: km,
            vehicle_type: "car".into(),
            fuel_type: "petrol".into(),
            mileage: None,
            description: "commute".into(),
        })
    }

    fn neem(count: u32) -> ActivityInput {
        ActivityInput::Plantation(PlantationInput {
            trees_planted: count,
            species: "neem".into(),
            survival: SurvivalScaling::None,
            location: String::new(),
        })
    }

    async fn registered_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_user(UserProfile::new("u1", "u1@example.org", "Asha", at("2024-01-01T00:00:00Z")))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_log_entry_persists_and_updates_stats() {
        let store = registered_store().await;
        let svc = service(Some(store.clone()));

        let logged = svc.log_entry("u1", car(100.0), None).await.unwrap();
        assert!(logged.saved);
        assert!(logged.warning.is_none());
        assert_eq!(logged.entry.co2_emissions, 12.0);
        assert_eq!(logged.entry.date, fixed_now());
        assert!(!logged.entry.id.as_deref().unwrap().starts_with(TEMP_ID_PREFIX));

        svc.log_entry("u1", neem(5), Some(at("2024-03-30T09:00:00Z"))).await.unwrap();

        let profile = svc.profile("u1").await;
        assert!(!profile.is_degraded());
        let stats = profile.data.lifetime_stats;
        assert_eq!(stats.entries_logged, 2);
        assert_eq!(stats.total_emissions, 12.0);
        assert_eq!(stats.total_offsets, 150.0);
        assert_eq!(stats.eco_points, 50);
        assert_eq!(stats.trees_planted, 5);
    }

    #[tokio::test]
    async fn test_log_entry_without_store_is_unsaved() {
        let svc = service(None);
        let logged = svc.log_entry("u1", car(100.0), None).await.unwrap();

        assert!(!logged.saved);
        assert_eq!(logged.warning.as_deref(), Some(UNSAVED_WARNING));
        assert_eq!(
            logged.entry.id,
            Some(format!("temp-{}", fixed_now().timestamp_millis()))
        );
        assert_eq!(logged.entry.co2_emissions, 12.0);
    }

    #[tokio::test]
    async fn test_log_entry_with_failing_store_is_unsaved() {
        let svc = service(Some(Arc::new(BrokenStore)));
        let logged = svc.log_entry("u1", neem(2), None).await.unwrap();
        assert!(!logged.saved);
        assert_eq!(logged.entry.co2_offset, 60.0);
        assert_eq!(logged.entry.eco_points_earned, 20);
    }

    #[tokio::test]
    async fn test_log_entry_rejects_bad_input() {
        let svc = service(Some(Arc::new(MemoryStore::new())));

        let zero = svc.log_entry("u1", car(0.0), None).await;
        assert!(matches!(zero, Err(ref e) if e.is_client_error()));

        let unknown_energy = ActivityInput::Energy(EnergyInput {
            energy_source: "peat".into(),
            amount: 10.0,
            is_renewable: false,
            grid_factor: None,
        });
        let result = svc.log_entry("u1", unknown_energy, None).await;
        assert!(matches!(
            result,
            Err(LedgerError::Footprint(FootprintError::UnknownFactorKey { .. }))
        ));

        assert!(svc.log_entry("  ", car(10.0), None).await.is_err());
    }

    #[test]
    fn test_preview_applies_grid_factor() {
        let svc = service(None);
        let input = ActivityInput::Energy(EnergyInput {
            energy_source: "electricity".into(),
            amount: 200.0,
            is_renewable: false,
            grid_factor: Some(0.5),
        });
        assert_eq!(svc.preview(&input).unwrap().co2_emissions, 100.0);
    }

    #[tokio::test]
    async fn test_reads_over_memory_store() {
        let svc = service(Some(registered_store().await));
        svc.log_entry("u1", car(100.0), Some(at("2024-03-20T08:00:00Z"))).await.unwrap();
        svc.log_entry("u1", car(90.0), Some(at("2024-03-27T08:00:00Z"))).await.unwrap();
        svc.log_entry("u1", neem(1), Some(at("2024-03-29T08:00:00Z"))).await.unwrap();
        let bottles = ActivityInput::Plastic(PlasticInput {
            plastic_type: "plastic_bottle".into(),
            quantity: 4.0,
        });
        svc.log_entry("u1", bottles, Some(at("2024-01-02T08:00:00Z"))).await.unwrap();

        let history = svc.history("u1", DEFAULT_HISTORY_WEEKS, None).await;
        assert_eq!(history.data.entries.len(), 3);
        assert_eq!(history.data.total_emissions, 22.8);
        assert_eq!(history.data.total_offsets, 30.0);

        let vehicles = svc.history("u1", DEFAULT_HISTORY_WEEKS, Some(Category::Vehicle)).await;
        assert_eq!(vehicles.data.entries.len(), 2);

        let recent = svc.recent("u1", DEFAULT_RECENT_DAYS).await;
        assert_eq!(recent.data.len(), 2);
        assert_eq!(recent.data[0].category(), Category::Plantation);

        let summary = svc.summary("u1").await;
        assert_eq!(summary.data.entries_count, 4);
        assert_eq!(summary.data.trees_planted, 1);
        assert_eq!(summary.data.total_emissions, 24.8);

        let weekly = svc.weekly("u1", DEFAULT_TREND_WEEKS).await;
        assert_eq!(weekly.data.weekly_data.len(), 2);
        // week 13 nets 10.8 - 30 = -19.2 against 12.0 in week 12
        assert_eq!(weekly.data.percentage_change, -260.0);

        let breakdown = svc
            .breakdown("u1", at("2024-03-01T00:00:00Z"), at("2024-03-31T00:00:00Z"))
            .await;
        assert_eq!(breakdown.data.len(), 2);
        assert_eq!(breakdown.data[&Category::Vehicle].count, 2);
        assert!(!breakdown.data.contains_key(&Category::Plastic));
    }

    #[tokio::test]
    async fn test_unbounded_windows_cover_every_entry() {
        let svc = service(Some(registered_store().await));
        svc.log_entry("u1", car(100.0), Some(at("2024-01-02T08:00:00Z"))).await.unwrap();
        svc.log_entry("u1", car(90.0), Some(at("2024-03-27T08:00:00Z"))).await.unwrap();

        assert_eq!(svc.history("u1", u32::MAX, None).await.data.entries.len(), 2);
        assert_eq!(svc.recent("u1", u32::MAX).await.data.len(), 2);
        assert_eq!(svc.weekly("u1", u32::MAX).await.data.weekly_data.len(), 2);
    }

    #[tokio::test]
    async fn test_reads_degrade_on_failure() {
        let svc = service(Some(Arc::new(BrokenStore)));

        let history = svc.history("u1", 4, None).await;
        assert!(history.is_degraded());
        assert_eq!(history.data, History::default());

        let weekly = svc.weekly("u1", 12).await;
        assert!(weekly.data.weekly_data.is_empty());
        assert_eq!(weekly.data.percentage_change, 0.0);

        assert_eq!(svc.summary("u1").await.data, LifetimeSummary::default());
        assert!(svc.recent("u1", 7).await.data.is_empty());

        let profile = svc.profile("u1").await;
        assert!(profile.is_degraded());
        assert_eq!(profile.data.lifetime_stats, LifetimeStats::default());
    }

    #[tokio::test]
    async fn test_profile_placeholder_for_unknown_user() {
        let svc = service(Some(Arc::new(MemoryStore::new())));
        let profile = svc.profile("nobody").await;
        assert!(!profile.is_degraded());
        assert_eq!(profile.data.user_id, "nobody");
        assert_eq!(profile.data.lifetime_stats.entries_logged, 0);
    }

    #[tokio::test]
    async fn test_register_requires_store() {
        let profile = UserProfile::new("u2", "u2@example.org", "Ravi", fixed_now());
        assert!(service(None).register(profile.clone()).await.is_err());

        let store = Arc::new(MemoryStore::new());
        let svc = service(Some(store.clone()));
        svc.register(profile).await.unwrap();
        assert!(store.user_profile("u2").await.unwrap().is_some());
    }

    #[test]
    fn test_logged_entry_json_shape() {
        let svc = service(None);
        let logged = tokio_test::block_on(svc.log_entry("u1", car(10.0), None)).unwrap();
        let json = serde_json::to_value(&logged).unwrap();

        assert_eq!(json["saved"], false);
        assert_eq!(json["entry"]["type"], "vehicle");
        assert_eq!(json["entry"]["details"]["vehicleType"], "car");
        assert!(json["entry"]["_id"].as_str().unwrap().starts_with("temp-"));
        assert_eq!(json["warning"], UNSAVED_WARNING);
    }
}
