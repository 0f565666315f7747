//! CO2 emission and offset calculator.
//!
//! Every operation is pure: the same inputs and factor table always give
//! bit-identical output. Measures that are not finite and positive yield a
//! zero result without a factor lookup. Vehicle, plastic and tree lookups
//! fall back silently to a documented key; energy lookups reject unknown
//! sources with [`FootprintError::UnknownFactorKey`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::factors::{FactorTable, FuelUnit};
use crate::precision::{round_to, QUANTITY_DECIMALS};
use crate::types::{ActivityInput, Assessment, SurvivalScaling};

/// Eco points credited per planted tree, whatever the species
pub const ECO_POINTS_PER_TREE: u32 = 10;

/// Vehicle trip result.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleEmission {
    pub co2_kg: f64,
    /// Fuel burned, present only on the mileage path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_consumed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_unit: Option<FuelUnit>,
}

/// Plantation result.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeOffset {
    /// Annual absorption in kg CO2
    pub co2_offset_kg: f64,
    pub eco_points: u32,
}

fn usable(measure: f64) -> bool {
    measure.is_finite() && measure > 0.0
}

/// Emission/offset calculator over an injected factor table.
#[derive(Debug, Clone, Default)]
pub struct Calculator {
    factors: FactorTable,
}

impl Calculator {
    pub fn new(factors: FactorTable) -> Self {
        Self { factors }
    }

    pub fn factors(&self) -> &FactorTable {
        &self.factors
    }

    /// Trip emissions in kg CO2.
    ///
    /// With a positive `mileage` the fuel burned (`distance / mileage`) is
    /// multiplied by the per-fuel-unit factor and the per-km table is not
    /// consulted.
    pub fn vehicle_emission(
        &self,
        distance_km: f64,
        vehicle_type: &str,
        fuel_type: &str,
        mileage: Option<f64>,
    ) -> VehicleEmission {
        if !usable(distance_km) {
            debug!(distance_km, "Non-positive distance, zero vehicle emission");
            return VehicleEmission::default();
        }

        if let Some(mileage) = mileage.filter(|m| usable(*m)) {
            let fuel_consumed = distance_km / mileage;
            let (lookup, unit) = self.factors.fuel_factor(fuel_type);
            if lookup.fallback {
                debug!(fuel_type, fallback = %lookup.key, "Unknown fuel, using fallback fuel factor");
            }
            return VehicleEmission {
                co2_kg: round_to(fuel_consumed * lookup.factor, QUANTITY_DECIMALS),
                fuel_consumed: Some(round_to(fuel_consumed, QUANTITY_DECIMALS)),
                fuel_unit: Some(unit),
            };
        }

        let lookup = self.factors.vehicle_per_km(vehicle_type, fuel_type);
        if lookup.fallback {
            debug!(vehicle_type, fuel_type, fallback = %lookup.key, "Unknown vehicle factor, using fallback");
        }
        VehicleEmission {
            co2_kg: round_to(distance_km * lookup.factor, QUANTITY_DECIMALS),
            fuel_consumed: None,
            fuel_unit: None,
        }
    }

    /// Plastic emissions in kg CO2 for `quantity` items.
    pub fn plastic_emission(&self, quantity: f64, item_type: &str) -> f64 {
        if !usable(quantity) {
            debug!(quantity, "Non-positive plastic quantity, zero emission");
            return 0.0;
        }

        let lookup = self.factors.plastic_per_item(item_type);
        if lookup.fallback {
            debug!(item_type, fallback = %lookup.key, "Unknown plastic type, using fallback");
        }
        round_to(quantity * lookup.factor, QUANTITY_DECIMALS)
    }

    /// Energy emissions in kg CO2. Renewable energy never emits.
    pub fn energy_emission(&self, amount_kwh: f64, source: &str, is_renewable: bool) -> Result<f64> {
        self.energy_emission_with_factor(amount_kwh, source, is_renewable, None)
    }

    /// Energy emissions with an optional kg/kWh override for the table factor.
    ///
    /// The source must still be known to the table.
    pub fn energy_emission_with_factor(
        &self,
        amount_kwh: f64,
        source: &str,
        is_renewable: bool,
        grid_factor: Option<f64>,
    ) -> Result<f64> {
        if is_renewable {
            return Ok(0.0);
        }
        if !usable(amount_kwh) {
            debug!(amount_kwh, "Non-positive energy amount, zero emission");
            return Ok(0.0);
        }

        let table_factor = self.factors.energy_per_kwh(source)?;
        let factor = match grid_factor {
            Some(f) if f.is_finite() && f >= 0.0 => f,
            _ => table_factor,
        };
        Ok(round_to(amount_kwh * factor, QUANTITY_DECIMALS))
    }

    /// Annual offset and eco points for a plantation.
    ///
    /// An out-of-range survival probability yields a zero result.
    pub fn tree_offset(&self, tree_count: u32, species: &str, survival: SurvivalScaling) -> TreeOffset {
        if tree_count == 0 {
            return TreeOffset::default();
        }
        let Some(multiplier) = survival.multiplier() else {
            debug!(?survival, "Invalid survival probability, zero offset");
            return TreeOffset::default();
        };

        let lookup = self.factors.tree_rate(species);
        if lookup.fallback {
            debug!(species, rate = lookup.factor, "Unknown species, using default rate");
        }

        let offset = f64::from(tree_count) * lookup.factor * multiplier;
        TreeOffset {
            co2_offset_kg: round_to(offset, QUANTITY_DECIMALS),
            eco_points: tree_count.saturating_mul(ECO_POINTS_PER_TREE),
        }
    }

    /// Creation output for any activity.
    ///
    /// Fails only for an unknown, non-renewable energy source.
    pub fn assess(&self, activity: &ActivityInput) -> Result<Assessment> {
        let (co2_kg, eco_points, fuel_consumed) = match activity {
            ActivityInput::Vehicle(v) => {
                let emission =
                    self.vehicle_emission(v.distance, &v.vehicle_type, &v.fuel_type, v.mileage);
                (emission.co2_kg, 0, emission.fuel_consumed)
            }
            ActivityInput::Plastic(p) => (self.plastic_emission(p.quantity, &p.plastic_type), 0, None),
            ActivityInput::Energy(e) => {
                let co2_kg = self.energy_emission_with_factor(
                    e.amount,
                    &e.energy_source,
                    e.is_renewable,
                    e.grid_factor,
                )?;
                (co2_kg, 0, None)
            }
            ActivityInput::Plantation(t) => {
                let offset = self.tree_offset(t.trees_planted, &t.species, t.survival);
                (offset.co2_offset_kg, offset.eco_points, None)
            }
        };

        // Exactly one side of the effect is non-zero
        if activity.category().is_offset() {
            Ok(Assessment::offset(co2_kg, eco_points))
        } else {
            Ok(Assessment {
                fuel_consumed,
                ..Assessment::emission(co2_kg)
            })
        }
    }
}
