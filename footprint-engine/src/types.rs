//! Core types for activity records.
//!
//! An activity is one logged user action: a vehicle trip, plastic use,
//! energy consumption or a tree plantation. Its CO2 effect is always kept
//! as two non-negative quantities (emissions and offset); the net footprint
//! is derived on read and never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{FootprintError, Result};

/// Activity category.
///
/// Closed set: every record belongs to exactly one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Vehicle,
    Plastic,
    Energy,
    Plantation,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vehicle => "vehicle",
            Self::Plastic => "plastic",
            Self::Energy => "energy",
            Self::Plantation => "plantation",
        }
    }

    /// Whether records of this category credit an offset instead of emitting
    pub fn is_offset(&self) -> bool {
        matches!(self, Self::Plantation)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = FootprintError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "vehicle" | "vehicles" => Ok(Self::Vehicle),
            "plastic" | "plastics" => Ok(Self::Plastic),
            "energy" | "heating" => Ok(Self::Energy),
            "plantation" | "trees" => Ok(Self::Plantation),
            other => Err(FootprintError::InvalidInput(format!(
                "unknown category '{}'",
                other
            ))),
        }
    }
}

/// How a plantation offset accounts for saplings that do not survive.
///
/// The caller chooses; the calculator never applies scaling on its own.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "probability", rename_all = "snake_case")]
pub enum SurvivalScaling {
    /// Every tree counts in full (multiplier 1.0)
    #[default]
    None,
    /// Apply [`SurvivalScaling::DEFAULT_PROBABILITY`]
    Default,
    /// Apply an explicit probability in `(0, 1]`
    Probability(f64),
}

impl SurvivalScaling {
    pub const DEFAULT_PROBABILITY: f64 = 0.7;

    /// Multiplier for the raw offset, or `None` when the probability is out of range
    pub fn multiplier(&self) -> Option<f64> {
        match *self {
            Self::None => Some(1.0),
            Self::Default => Some(Self::DEFAULT_PROBABILITY),
            Self::Probability(p) if p.is_finite() && p > 0.0 && p <= 1.0 => Some(p),
            Self::Probability(_) => None,
        }
    }
}

/// Vehicle trip payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleInput {
    /// Distance driven in km
    pub distance: f64,
    /// car, motorcycle, bus, ...
    #[serde(default)]
    pub vehicle_type: String,
    /// petrol, diesel, cng, electric
    pub fuel_type: String,
    /// Distance per fuel unit (km/l, km/kg or km/kWh)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mileage: Option<f64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Plastic usage payload. Quantities are item counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlasticInput {
    pub plastic_type: String,
    pub quantity: f64,
}

/// Energy consumption payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyInput {
    pub energy_source: String,
    /// Energy consumed in kWh
    pub amount: f64,
    #[serde(default)]
    pub is_renewable: bool,
    /// Caller-supplied kg CO2 per kWh replacing the table factor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_factor: Option<f64>,
}

/// Tree plantation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantationInput {
    pub trees_planted: u32,
    #[serde(default)]
    pub species: String,
    #[serde(default)]
    pub survival: SurvivalScaling,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
}

/// Typed activity payload, discriminated by category.
///
/// Serialized as `{"type": "...", "details": {...}}`, which is also the
/// shape of the persisted details payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details", rename_all = "lowercase")]
pub enum ActivityInput {
    Vehicle(VehicleInput),
    Plastic(PlasticInput),
    Energy(EnergyInput),
    Plantation(PlantationInput),
}

impl ActivityInput {
    pub fn category(&self) -> Category {
        match self {
            Self::Vehicle(_) => Category::Vehicle,
            Self::Plastic(_) => Category::Plastic,
            Self::Energy(_) => Category::Energy,
            Self::Plantation(_) => Category::Plantation,
        }
    }

    /// Basic range checks for callers that must reject bad input.
    ///
    /// The calculator itself degrades such input to a zero result.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Vehicle(v) => {
                require_positive("distance", v.distance)?;
                require_present("fuelType", &v.fuel_type)?;
                if let Some(mileage) = v.mileage {
                    require_positive("mileage", mileage)?;
                }
            }
            Self::Plastic(p) => {
                require_positive("quantity", p.quantity)?;
                require_present("plasticType", &p.plastic_type)?;
            }
            Self::Energy(e) => {
                require_positive("amount", e.amount)?;
                require_present("energySource", &e.energy_source)?;
                if let Some(factor) = e.grid_factor {
                    if !factor.is_finite() || factor < 0.0 {
                        return Err(FootprintError::InvalidInput(
                            "gridFactor must be a non-negative number".to_string(),
                        ));
                    }
                }
            }
            Self::Plantation(t) => {
                if t.trees_planted == 0 {
                    return Err(FootprintError::InvalidInput(
                        "treesPlanted must be greater than 0".to_string(),
                    ));
                }
                if t.survival.multiplier().is_none() {
                    return Err(FootprintError::InvalidInput(
                        "survival probability must be in (0, 1]".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn require_positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FootprintError::InvalidInput(format!(
            "{} must be greater than 0",
            field
        )))
    }
}

fn require_present(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(FootprintError::InvalidInput(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

/// Computed CO2 effect of one activity, as returned on creation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub co2_emissions: f64,
    pub co2_offset: f64,
    pub eco_points_earned: u32,
    /// Fuel units burned, reported when the mileage path was used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_consumed: Option<f64>,
}

impl Assessment {
    pub fn emission(co2_kg: f64) -> Self {
        Self {
            co2_emissions: co2_kg,
            ..Default::default()
        }
    }

    pub fn offset(co2_kg: f64, eco_points: u32) -> Self {
        Self {
            co2_offset: co2_kg,
            eco_points_earned: eco_points,
            ..Default::default()
        }
    }

    pub fn net_footprint(&self) -> f64 {
        self.co2_emissions - self.co2_offset
    }
}

/// Persisted activity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub date: DateTime<Utc>,
    #[serde(flatten)]
    pub activity: ActivityInput,
    pub co2_emissions: f64,
    pub co2_offset: f64,
    #[serde(default)]
    pub eco_points_earned: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_consumed: Option<f64>,
}

impl ActivityRecord {
    /// Build an unsaved record from an activity and its assessment
    pub fn new(
        user_id: impl Into<String>,
        date: DateTime<Utc>,
        activity: ActivityInput,
        assessment: Assessment,
    ) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            date,
            activity,
            co2_emissions: assessment.co2_emissions,
            co2_offset: assessment.co2_offset,
            eco_points_earned: assessment.eco_points_earned,
            fuel_consumed: assessment.fuel_consumed,
        }
    }

    pub fn category(&self) -> Category {
        self.activity.category()
    }

    pub fn net_footprint(&self) -> f64 {
        self.co2_emissions - self.co2_offset
    }

    /// Trees planted, read from plantation details only
    pub fn trees_planted(&self) -> u32 {
        match &self.activity {
            ActivityInput::Plantation(p) => p.trees_planted,
            _ => 0,
        }
    }

    pub fn assessment(&self) -> Assessment {
        Assessment {
            co2_emissions: self.co2_emissions,
            co2_offset: self.co2_offset,
            eco_points_earned: self.eco_points_earned,
            fuel_consumed: self.fuel_consumed,
        }
    }
}
