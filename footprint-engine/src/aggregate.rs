//! Weekly, category and lifetime rollups over activity records.
//!
//! Every fold sums unrounded quantities and rounds once on output. Time
//! windows are anchored on an explicit `as_of` instant so results never
//! depend on the wall clock.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::precision::{round_to, PERCENT_DECIMALS, TOTAL_DECIMALS};
use crate::types::{ActivityRecord, Category};

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    emissions: f64,
    offsets: f64,
    eco_points: u64,
    trees_planted: u64,
    count: usize,
}

impl Totals {
    fn add(&mut self, record: &ActivityRecord) {
        self.emissions += record.co2_emissions;
        self.offsets += record.co2_offset;
        self.eco_points += u64::from(record.eco_points_earned);
        self.trees_planted += u64::from(record.trees_planted());
        self.count += 1;
    }

    fn fold<'a>(records: impl IntoIterator<Item = &'a ActivityRecord>) -> Self {
        let mut totals = Self::default();
        for record in records {
            totals.add(record);
        }
        totals
    }

    fn net(&self) -> f64 {
        round_to(self.emissions - self.offsets, TOTAL_DECIMALS)
    }
}

/// Start of a trailing window of `weeks` weeks ending at `as_of`.
///
/// Windows reaching past the earliest representable instant start there.
pub fn window_start(as_of: DateTime<Utc>, weeks: u32) -> DateTime<Utc> {
    days_before(as_of, i64::from(weeks) * 7)
}

/// Start of a trailing window of `days` days ending at `as_of`.
pub fn window_start_days(as_of: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    days_before(as_of, i64::from(days))
}

fn days_before(as_of: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|span| as_of.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// One ISO week of activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyBucket {
    /// `YYYY-Www` label
    pub week: String,
    /// ISO week-numbering year
    pub year: i32,
    pub week_number: u32,
    pub emissions: f64,
    pub offsets: f64,
    pub net_footprint: f64,
    pub entry_count: usize,
}

/// Weekly series plus the change between its last two weeks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyTrend {
    pub weekly_data: Vec<WeeklyBucket>,
    pub percentage_change: f64,
}

/// Partition records of the trailing window by ISO year and week.
///
/// Buckets are in chronological order. Weeks without records are absent
/// rather than zero-filled.
pub fn weekly_buckets(
    records: &[ActivityRecord],
    window_weeks: u32,
    as_of: DateTime<Utc>,
) -> Vec<WeeklyBucket> {
    let start = window_start(as_of, window_weeks);
    let mut weeks: BTreeMap<(i32, u32), Totals> = BTreeMap::new();

    for record in records.iter().filter(|r| r.date >= start) {
        let iso = record.date.iso_week();
        weeks.entry((iso.year(), iso.week())).or_default().add(record);
    }

    weeks
        .into_iter()
        .map(|((year, week_number), totals)| WeeklyBucket {
            // Week number is zero-padded: `2024-W05`, never `2024-W5`
            week: format!("{}-W{:02}", year, week_number),
            year,
            week_number,
            emissions: round_to(totals.emissions, TOTAL_DECIMALS),
            offsets: round_to(totals.offsets, TOTAL_DECIMALS),
            net_footprint: totals.net(),
            entry_count: totals.count,
        })
        .collect()
}

/// Weekly buckets and the percentage change of net footprint from the
/// second-to-last to the last bucket (0 with fewer than two buckets).
pub fn weekly_trend(records: &[ActivityRecord], window_weeks: u32, as_of: DateTime<Utc>) -> WeeklyTrend {
    let weekly_data = weekly_buckets(records, window_weeks, as_of);

    let percentage_change = match weekly_data.as_slice() {
        [.., previous, current] => percentage_change(current.net_footprint, previous.net_footprint),
        _ => 0.0,
    };

    WeeklyTrend {
        weekly_data,
        percentage_change,
    }
}

/// Signed percentage change rounded to one decimal.
///
/// With `previous == 0` the result is `100` for a positive `current` and
/// `0` otherwise.
pub fn percentage_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    round_to((current - previous) / previous * 100.0, PERCENT_DECIMALS)
}

/// Per-category totals.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotals {
    pub total_emissions: f64,
    pub total_offsets: f64,
    pub count: usize,
}

/// Grouped sums by category. Categories without records are absent.
pub fn category_breakdown(records: &[ActivityRecord]) -> BTreeMap<Category, CategoryTotals> {
    let mut groups: BTreeMap<Category, Totals> = BTreeMap::new();
    for record in records {
        groups.entry(record.category()).or_default().add(record);
    }

    groups
        .into_iter()
        .map(|(category, totals)| {
            (
                category,
                CategoryTotals {
                    total_emissions: round_to(totals.emissions, TOTAL_DECIMALS),
                    total_offsets: round_to(totals.offsets, TOTAL_DECIMALS),
                    count: totals.count,
                },
            )
        })
        .collect()
}

/// [`category_breakdown`] restricted to `start <= date <= end`.
pub fn category_breakdown_between(
    records: &[ActivityRecord],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> BTreeMap<Category, CategoryTotals> {
    let in_range: Vec<ActivityRecord> = records
        .iter()
        .filter(|r| r.date >= start && r.date <= end)
        .cloned()
        .collect();
    category_breakdown(&in_range)
}

/// Totals over a user's whole record set.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifetimeSummary {
    pub total_emissions: f64,
    pub total_offsets: f64,
    pub net_footprint: f64,
    pub eco_points: u64,
    pub entries_count: usize,
    pub trees_planted: u64,
}

/// Unconditional sum across all records.
///
/// `trees_planted` is read from plantation details, never inferred from
/// the offset. An empty set gives the all-zero summary.
pub fn lifetime_summary(records: &[ActivityRecord]) -> LifetimeSummary {
    let totals = Totals::fold(records);

    LifetimeSummary {
        total_emissions: round_to(totals.emissions, TOTAL_DECIMALS),
        total_offsets: round_to(totals.offsets, TOTAL_DECIMALS),
        net_footprint: totals.net(),
        eco_points: totals.eco_points,
        entries_count: totals.count,
        trees_planted: totals.trees_planted,
    }
}

/// Entries of a history window with their totals.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    /// Newest first
    pub entries: Vec<ActivityRecord>,
    pub total_emissions: f64,
    pub total_offsets: f64,
    pub net_footprint: f64,
}

/// Records since `since` (all when `None`), optionally of one category.
pub fn history(
    records: &[ActivityRecord],
    since: Option<DateTime<Utc>>,
    category: Option<Category>,
) -> History {
    let mut entries: Vec<ActivityRecord> = records
        .iter()
        .filter(|r| since.map_or(true, |start| r.date >= start))
        .filter(|r| category.map_or(true, |c| r.category() == c))
        .cloned()
        .collect();
    sort_newest_first(&mut entries);

    let totals = Totals::fold(&entries);
    History {
        total_emissions: round_to(totals.emissions, TOTAL_DECIMALS),
        total_offsets: round_to(totals.offsets, TOTAL_DECIMALS),
        net_footprint: totals.net(),
        entries,
    }
}

/// Records from the last `days` days, newest first.
pub fn recent_entries(records: &[ActivityRecord], days: u32, as_of: DateTime<Utc>) -> Vec<ActivityRecord> {
    let start = window_start_days(as_of, days);
    let mut entries: Vec<ActivityRecord> =
        records.iter().filter(|r| r.date >= start).cloned().collect();
    sort_newest_first(&mut entries);
    entries
}

pub(crate) fn sort_newest_first(entries: &mut [ActivityRecord]) {
    entries.sort_by(|a, b| b.date.cmp(&a.date));
}
