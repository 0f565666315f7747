//! Footprint Engine for EcoTrack
//!
//! Turns logged activities into CO2 quantities and rolls them up for
//! dashboards:
//!
//! - **Vehicle** trips emit per km, or per unit of fuel when mileage is known
//! - **Plastic** use emits per item
//! - **Energy** use emits per kWh unless renewable
//! - **Plantation** offsets per tree per year and earns eco points
//!
//! Emissions and offsets are always two non-negative quantities; the net
//! footprint is derived. The engine is pure and synchronous and never needs
//! a storage connection.
//!
//! # Key Components
//!
//! - [`FactorTable`]: Injected factor configuration (defaults or YAML/JSON)
//! - [`Calculator`]: The four emission/offset operations and [`Calculator::assess`]
//! - [`aggregate`]: Weekly buckets, percentage change, category and lifetime sums
//!
//! # Example
//!
//! ```
//! use footprint_engine::{Calculator, FactorTable, SurvivalScaling};
//!
//! let calculator = Calculator::new(FactorTable::default());
//! assert_eq!(calculator.vehicle_emission(100.0, "car", "petrol", None).co2_kg, 12.0);
//!
//! let trees = calculator.tree_offset(5, "neem", SurvivalScaling::None);
//! assert_eq!(trees.co2_offset_kg, 150.0);
//! assert_eq!(trees.eco_points, 50);
//! ```

pub mod aggregate;
pub mod calculator;
pub mod error;
pub mod factors;
pub mod precision;
pub mod types;

// Re-export main types
pub use aggregate::{
    category_breakdown, category_breakdown_between, history, lifetime_summary, percentage_change,
    recent_entries, weekly_buckets, weekly_trend, window_start, window_start_days, CategoryTotals,
    History, LifetimeSummary, WeeklyBucket, WeeklyTrend,
};
pub use calculator::{Calculator, TreeOffset, VehicleEmission, ECO_POINTS_PER_TREE};
pub use error::{FootprintError, Result};
pub use factors::{FactorLookup, FactorTable, FuelFactor, FuelUnit};
pub use types::*;
