//! Emission and offset factor tables.
//!
//! A single [`FactorTable`] is loaded once at process start (built-in
//! defaults, or a YAML/JSON file) and handed to the
//! [`Calculator`](crate::Calculator). Nothing in the engine reads factors
//! from global state.
//!
//! Keys are matched after [`normalize_key`]: lower-case, with spaces and
//! hyphens folded to underscores. Plastic factors are per item, not per kg.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{FootprintError, Result};
use crate::types::Category;

/// Unit a fuel is metered in on the mileage path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelUnit {
    Litre,
    Kilogram,
    KilowattHour,
}

/// kg CO2 released per unit of burned fuel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuelFactor {
    pub unit: FuelUnit,
    pub kg_co2_per_unit: f64,
}

/// Vehicle factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleFactors {
    /// kg CO2 per km, keyed by `vehicle_fuel` or by fuel alone
    pub per_km: BTreeMap<String, f64>,
    /// Key used when neither the combined nor the fuel key is known
    #[serde(default = "default_vehicle_fallback")]
    pub fallback_key: String,
    /// Per-fuel-unit factors used when mileage is known
    pub per_fuel_unit: BTreeMap<String, FuelFactor>,
    #[serde(default = "default_fuel_fallback")]
    pub fallback_fuel: String,
}

/// Plastic factors, kg CO2 per item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlasticFactors {
    pub per_item: BTreeMap<String, f64>,
    #[serde(default = "default_plastic_fallback")]
    pub fallback_key: String,
}

/// Energy factors, kg CO2 per kWh. No fallback: unknown sources are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyFactors {
    pub per_kwh: BTreeMap<String, f64>,
}

/// Tree absorption rates, kg CO2 per tree per year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantationFactors {
    pub annual_offset_per_tree: BTreeMap<String, f64>,
    #[serde(default = "default_tree_rate")]
    pub default_annual_offset: f64,
}

fn default_vehicle_fallback() -> String {
    "car_petrol".to_string()
}

fn default_fuel_fallback() -> String {
    "petrol".to_string()
}

fn default_plastic_fallback() -> String {
    "plastic_bottle".to_string()
}

fn default_tree_rate() -> f64 {
    22.0
}

/// Result of a fallback-aware lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorLookup {
    /// Key that supplied the factor
    pub key: String,
    pub factor: f64,
    /// Whether the requested key was unknown and a fallback was used
    pub fallback: bool,
}

/// Complete factor configuration, mapping category → subtype → factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorTable {
    pub vehicle: VehicleFactors,
    pub plastic: PlasticFactors,
    pub energy: EnergyFactors,
    pub plantation: PlantationFactors,
}

impl Default for FactorTable {
    fn default() -> Self {
        let per_km = table(&[
            ("petrol", 0.12),
            ("diesel", 0.15),
            ("cng", 0.09),
            ("electric", 0.05),
            ("car_petrol", 0.12),
            ("car_diesel", 0.17),
            ("car_cng", 0.10),
            ("car_electric", 0.053),
            ("motorcycle_petrol", 0.072),
            ("bus_diesel", 0.089),
            ("bus_cng", 0.075),
        ]);

        let per_fuel_unit = [
            ("petrol", FuelUnit::Litre, 2.31),
            ("diesel", FuelUnit::Litre, 2.68),
            ("cng", FuelUnit::Kilogram, 2.65),
            ("electric", FuelUnit::KilowattHour, 0.9),
        ]
        .into_iter()
        .map(|(key, unit, kg_co2_per_unit)| {
            (
                key.to_string(),
                FuelFactor {
                    unit,
                    kg_co2_per_unit,
                },
            )
        })
        .collect();

        Self {
            vehicle: VehicleFactors {
                per_km,
                fallback_key: default_vehicle_fallback(),
                per_fuel_unit,
                fallback_fuel: default_fuel_fallback(),
            },
            plastic: PlasticFactors {
                per_item: table(&[
                    ("plastic_bottle", 0.5),
                    ("plastic_bag", 0.033),
                    ("plastic_container", 0.2),
                    ("single_use", 0.1),
                    ("packaging", 0.15),
                ]),
                fallback_key: default_plastic_fallback(),
            },
            energy: EnergyFactors {
                per_kwh: table(&[
                    ("electricity", 0.9),
                    ("natural_gas", 0.202),
                    ("heating_oil", 0.268),
                    ("coal", 0.341),
                ]),
            },
            plantation: PlantationFactors {
                annual_offset_per_tree: table(&[
                    ("neem", 30.0),
                    ("mango", 24.0),
                    ("banyan", 21.0),
                    ("teak", 18.0),
                ]),
                default_annual_offset: default_tree_rate(),
            },
        }
    }
}

fn table(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries
        .iter()
        .map(|(key, factor)| (key.to_string(), *factor))
        .collect()
}

/// Fold a user-supplied subtype into table-key form.
pub fn normalize_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

fn canonical_fuel(raw: &str) -> String {
    match normalize_key(raw).as_str() {
        "gasoline" => "petrol".to_string(),
        "ev" => "electric".to_string(),
        other => other.to_string(),
    }
}

fn canonical_vehicle(raw: &str) -> String {
    match normalize_key(raw).as_str() {
        "motorbike" => "motorcycle".to_string(),
        other => other.to_string(),
    }
}

impl FactorTable {
    /// Load from a YAML or JSON file, chosen by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let table = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&contents)?,
            Some("yaml") | Some("yml") => Self::from_yaml(&contents)?,
            other => {
                return Err(FootprintError::Config(format!(
                    "unsupported factor file extension: {:?}",
                    other
                )))
            }
        };

        tracing::info!(path = %path.display(), "Loaded factor table");
        Ok(table)
    }

    /// Parse and validate a YAML factor table.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let table: Self = serde_yaml::from_str(yaml)?;
        table.validate()?;
        Ok(table)
    }

    /// Parse and validate a JSON factor table.
    pub fn from_json(json: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject negative or non-finite factors and fallback keys missing from their table.
    pub fn validate(&self) -> Result<()> {
        let flat = [
            ("vehicle", &self.vehicle.per_km),
            ("plastic", &self.plastic.per_item),
            ("energy", &self.energy.per_kwh),
            ("plantation", &self.plantation.annual_offset_per_tree),
        ];
        for (name, entries) in flat {
            for (key, factor) in entries {
                check_factor(name, key, *factor)?;
            }
        }
        for (key, fuel) in &self.vehicle.per_fuel_unit {
            check_factor("fuel", key, fuel.kg_co2_per_unit)?;
        }
        check_factor(
            "plantation",
            "default_annual_offset",
            self.plantation.default_annual_offset,
        )?;

        if !self.vehicle.per_km.contains_key(&self.vehicle.fallback_key) {
            return Err(missing_fallback("vehicle", &self.vehicle.fallback_key));
        }
        if !self
            .vehicle
            .per_fuel_unit
            .contains_key(&self.vehicle.fallback_fuel)
        {
            return Err(missing_fallback("fuel", &self.vehicle.fallback_fuel));
        }
        if !self.plastic.per_item.contains_key(&self.plastic.fallback_key) {
            return Err(missing_fallback("plastic", &self.plastic.fallback_key));
        }
        Ok(())
    }

    /// Per-km factor: `vehicle_fuel`, then `fuel`, then the fallback key.
    pub fn vehicle_per_km(&self, vehicle_type: &str, fuel_type: &str) -> FactorLookup {
        let vehicle = canonical_vehicle(vehicle_type);
        let fuel = canonical_fuel(fuel_type);
        let combined = format!("{}_{}", vehicle, fuel);

        for key in [combined.as_str(), fuel.as_str()] {
            if let Some(factor) = self.vehicle.per_km.get(key) {
                return FactorLookup {
                    key: key.to_string(),
                    factor: *factor,
                    fallback: false,
                };
            }
        }

        let key = self.vehicle.fallback_key.clone();
        let factor = self.vehicle.per_km.get(&key).copied().unwrap_or(0.0);
        FactorLookup {
            key,
            factor,
            fallback: true,
        }
    }

    /// Per-fuel-unit factor for the mileage path; unknown fuels use the fallback fuel.
    pub fn fuel_factor(&self, fuel_type: &str) -> (FactorLookup, FuelUnit) {
        let fuel = canonical_fuel(fuel_type);
        let (key, fallback) = if self.vehicle.per_fuel_unit.contains_key(&fuel) {
            (fuel, false)
        } else {
            (self.vehicle.fallback_fuel.clone(), true)
        };

        let (factor, unit) = self
            .vehicle
            .per_fuel_unit
            .get(&key)
            .map(|f| (f.kg_co2_per_unit, f.unit))
            .unwrap_or((0.0, FuelUnit::Litre));

        (
            FactorLookup {
                key,
                factor,
                fallback,
            },
            unit,
        )
    }

    /// Per-item plastic factor; unknown types use the fallback key.
    ///
    /// `bottle` and `plastic_bottle` name the same entry.
    pub fn plastic_per_item(&self, item_type: &str) -> FactorLookup {
        let key = normalize_key(item_type);
        let prefixed = format!("plastic_{}", key);

        for candidate in [key.as_str(), prefixed.as_str()] {
            if let Some(factor) = self.plastic.per_item.get(candidate) {
                return FactorLookup {
                    key: candidate.to_string(),
                    factor: *factor,
                    fallback: false,
                };
            }
        }

        let key = self.plastic.fallback_key.clone();
        let factor = self.plastic.per_item.get(&key).copied().unwrap_or(0.0);
        FactorLookup {
            key,
            factor,
            fallback: true,
        }
    }

    /// Per-kWh energy factor. Unknown sources have no safe fallback.
    pub fn energy_per_kwh(&self, source: &str) -> Result<f64> {
        let key = normalize_key(source);
        self.energy
            .per_kwh
            .get(&key)
            .copied()
            .ok_or(FootprintError::UnknownFactorKey {
                category: Category::Energy,
                key,
            })
    }

    /// Annual absorption per tree; unknown species use the default rate.
    pub fn tree_rate(&self, species: &str) -> FactorLookup {
        let key = normalize_key(species);
        match self.plantation.annual_offset_per_tree.get(&key) {
            Some(rate) => FactorLookup {
                key,
                factor: *rate,
                fallback: false,
            },
            None => FactorLookup {
                key: "default".to_string(),
                factor: self.plantation.default_annual_offset,
                fallback: true,
            },
        }
    }
}

fn check_factor(table: &str, key: &str, factor: f64) -> Result<()> {
    if factor.is_finite() && factor >= 0.0 {
        Ok(())
    } else {
        Err(FootprintError::Config(format!(
            "{} factor '{}' must be a non-negative number, got {}",
            table, key, factor
        )))
    }
}

fn missing_fallback(table: &str, key: &str) -> FootprintError {
    FootprintError::Config(format!(
        "{} fallback key '{}' is not in the table",
        table, key
    ))
}
