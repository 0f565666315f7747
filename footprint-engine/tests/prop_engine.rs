//! Property-based tests for the footprint engine using proptest.
//!
//! Covers: fallback equivalence, energy rejection and renewable zeroing,
//! eco points, the mileage path, purity and aggregate sign conventions.

use chrono::{DateTime, Duration, Utc};
use footprint_engine::{
    lifetime_summary, percentage_change, weekly_buckets, ActivityInput, ActivityRecord,
    Calculator, FactorTable, FootprintError, PlantationInput, PlasticInput, SurvivalScaling,
    VehicleInput,
};
use proptest::prelude::*;

fn calc() -> Calculator {
    Calculator::new(FactorTable::default())
}

fn unknown_key() -> impl Strategy<Value = String> {
    "zz[a-z]{3,10}"
}

fn species() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("neem".to_string()),
        Just("mango".to_string()),
        Just("banyan".to_string()),
        Just("teak".to_string()),
        unknown_key(),
    ]
}

// ── Fallback policy ──────────────────────────────────────────────────

proptest! {
    /// Unknown plastic types behave exactly like the fallback key.
    #[test]
    fn plastic_unknown_matches_fallback(qty in 0.001f64..10_000.0, key in unknown_key()) {
        let c = calc();
        prop_assert_eq!(c.plastic_emission(qty, &key), c.plastic_emission(qty, "plastic_bottle"));
    }

    /// Unknown vehicle/fuel pairs behave exactly like car + petrol.
    #[test]
    fn vehicle_unknown_matches_fallback(km in 0.001f64..10_000.0, vehicle in unknown_key(), fuel in unknown_key()) {
        let c = calc();
        prop_assert_eq!(
            c.vehicle_emission(km, &vehicle, &fuel, None),
            c.vehicle_emission(km, "car", "petrol", None)
        );
    }

    /// Unknown species use the default rate and never error.
    #[test]
    fn tree_unknown_matches_default_rate(n in 1u32..10_000, key in unknown_key()) {
        let offset = calc().tree_offset(n, &key, SurvivalScaling::None);
        let expected = (f64::from(n) * 22.0 * 1000.0).round() / 1000.0;
        prop_assert_eq!(offset.co2_offset_kg, expected);
    }
}

// ── Energy ───────────────────────────────────────────────────────────

proptest! {
    /// Unknown sources are always rejected for non-renewable energy.
    #[test]
    fn energy_unknown_rejects(kwh in 0.001f64..100_000.0, key in unknown_key()) {
        let result = calc().energy_emission(kwh, &key, false);
        let is_unknown_key = matches!(result, Err(FootprintError::UnknownFactorKey { .. }));
        prop_assert!(is_unknown_key);
    }

    /// Renewable energy is zero for every source.
    #[test]
    fn energy_renewable_is_zero(
        kwh in 0.001f64..100_000.0,
        source in prop_oneof![
            Just("electricity".to_string()),
            Just("coal".to_string()),
            unknown_key(),
        ],
    ) {
        prop_assert_eq!(calc().energy_emission(kwh, &source, true).unwrap(), 0.0);
    }
}

// ── Plantation ───────────────────────────────────────────────────────

proptest! {
    /// Eco points are ten per tree whatever the species or scaling.
    #[test]
    fn eco_points_ten_per_tree(n in 1u32..100_000, species in species(), p in 0.01f64..=1.0) {
        let c = calc();
        prop_assert_eq!(c.tree_offset(n, &species, SurvivalScaling::None).eco_points, n * 10);
        prop_assert_eq!(c.tree_offset(n, &species, SurvivalScaling::Probability(p)).eco_points, n * 10);
    }

    /// Survival scaling never increases the offset.
    #[test]
    fn survival_scaling_shrinks(n in 1u32..10_000, species in species(), p in 0.01f64..=1.0) {
        let c = calc();
        let full = c.tree_offset(n, &species, SurvivalScaling::None).co2_offset_kg;
        let scaled = c.tree_offset(n, &species, SurvivalScaling::Probability(p)).co2_offset_kg;
        prop_assert!(scaled <= full);
    }
}

// ── Vehicle mileage path ─────────────────────────────────────────────

proptest! {
    /// With a positive mileage the result is exactly fuel burned × per-unit factor.
    #[test]
    fn mileage_path_formula(
        km in 0.1f64..5_000.0,
        mileage in 0.5f64..80.0,
        fuel in prop_oneof![Just("petrol"), Just("diesel"), Just("cng"), Just("electric")],
    ) {
        let c = calc();
        let (lookup, _) = c.factors().fuel_factor(fuel);
        let expected = ((km / mileage) * lookup.factor * 1000.0).round() / 1000.0;

        let result = c.vehicle_emission(km, "car", fuel, Some(mileage));
        prop_assert_eq!(result.co2_kg, expected);
        prop_assert!(result.fuel_consumed.is_some());
    }

    /// Non-positive or non-finite measures give zero, never an error.
    #[test]
    fn invalid_measures_are_zero(bad in prop_oneof![Just(0.0f64), Just(f64::NAN), Just(f64::INFINITY), -1e6f64..0.0]) {
        let c = calc();
        prop_assert_eq!(c.vehicle_emission(bad, "car", "petrol", None).co2_kg, 0.0);
        prop_assert_eq!(c.vehicle_emission(bad, "car", "petrol", Some(12.0)).co2_kg, 0.0);
        prop_assert_eq!(c.plastic_emission(bad, "plastic_bag"), 0.0);
        prop_assert_eq!(c.energy_emission(bad, "coal", false).unwrap(), 0.0);
    }
}

// ── Purity ───────────────────────────────────────────────────────────

proptest! {
    /// Identical inputs give bit-identical outputs.
    #[test]
    fn assess_is_deterministic(km in 0.0f64..1_000.0, qty in 0.0f64..1_000.0, n in 0u32..1_000) {
        let c = calc();
        let inputs = [
            ActivityInput::Vehicle(VehicleInput {
                distance: km,
                vehicle_type: "bus".into(),
                fuel_type: "diesel".into(),
                mileage: None,
                description: String::new(),
            }),
            ActivityInput::Plastic(PlasticInput { plastic_type: "bag".into(), quantity: qty }),
            ActivityInput::Plantation(PlantationInput {
                trees_planted: n,
                species: "mango".into(),
                survival: SurvivalScaling::Default,
                location: String::new(),
            }),
        ];
        for input in &inputs {
            let first = c.assess(input).unwrap();
            let second = c.assess(input).unwrap();
            prop_assert_eq!(first.co2_emissions.to_bits(), second.co2_emissions.to_bits());
            prop_assert_eq!(first.co2_offset.to_bits(), second.co2_offset.to_bits());
            prop_assert_eq!(first.eco_points_earned, second.eco_points_earned);
            // one-sided sign convention
            prop_assert!(first.co2_emissions == 0.0 || first.co2_offset == 0.0);
        }
    }
}

// ── Aggregation ──────────────────────────────────────────────────────

fn record(date: DateTime<Utc>, emissions: f64, offset: f64) -> ActivityRecord {
    let activity = if offset > 0.0 {
        ActivityInput::Plantation(PlantationInput {
            trees_planted: 1,
            species: "neem".into(),
            survival: SurvivalScaling::None,
            location: String::new(),
        })
    } else {
        ActivityInput::Plastic(PlasticInput {
            plastic_type: "plastic_bottle".into(),
            quantity: 1.0,
        })
    };
    let mut record = ActivityRecord::new("user", date, activity, Default::default());
    record.co2_emissions = emissions;
    record.co2_offset = offset;
    record
}

proptest! {
    /// Weekly entry counts add up to the number of records in the window.
    #[test]
    fn weekly_counts_cover_window(day_offsets in prop::collection::vec(0i64..83, 0..40)) {
        let as_of: DateTime<Utc> = "2024-06-30T12:00:00Z".parse().unwrap();
        let records: Vec<ActivityRecord> = day_offsets
            .iter()
            .map(|d| record(as_of - Duration::days(*d), 1.0, 0.0))
            .collect();

        let buckets = weekly_buckets(&records, 12, as_of);
        let total: usize = buckets.iter().map(|b| b.entry_count).sum();
        prop_assert_eq!(total, records.len());
        prop_assert!(buckets.windows(2).all(|w| (w[0].year, w[0].week_number) < (w[1].year, w[1].week_number)));
        prop_assert!(buckets.iter().all(|b| b.entry_count > 0));
    }

    /// Lifetime net footprint is emissions minus offsets.
    #[test]
    fn lifetime_net_is_difference(values in prop::collection::vec((0.0f64..500.0, any::<bool>()), 0..30)) {
        let date: DateTime<Utc> = "2024-01-10T00:00:00Z".parse().unwrap();
        let records: Vec<ActivityRecord> = values
            .iter()
            .map(|(v, is_offset)| if *is_offset { record(date, 0.0, *v) } else { record(date, *v, 0.0) })
            .collect();

        let summary = lifetime_summary(&records);
        prop_assert_eq!(summary.entries_count, records.len());
        prop_assert!((summary.net_footprint - (summary.total_emissions - summary.total_offsets)).abs() <= 0.02);
    }

    /// A zero baseline yields 100 for growth and 0 otherwise.
    #[test]
    fn percentage_change_zero_baseline(current in -1_000.0f64..1_000.0) {
        let expected = if current > 0.0 { 100.0 } else { 0.0 };
        prop_assert_eq!(percentage_change(current, 0.0), expected);
    }
}
