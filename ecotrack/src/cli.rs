//! EcoTrack subcommands
//!
//! Every command prints a JSON document on stdout. Logs go to stderr.

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;

use footprint_engine::{
    ActivityInput, Category, EnergyInput, PlantationInput, PlasticInput, SurvivalScaling,
    VehicleInput,
};
use footprint_ledger::{
    EntryService, UserProfile, DEFAULT_HISTORY_WEEKS, DEFAULT_RECENT_DAYS, DEFAULT_TREND_WEEKS,
};

/// Top-level commands
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Compute an activity's CO2 effect without saving it
    Calculate {
        #[command(subcommand)]
        activity: ActivityCommand,
    },

    /// Compute and save an activity for a user
    Log {
        #[command(flatten)]
        user: UserArg,

        /// Activity date (RFC 3339 or YYYY-MM-DD), defaults to now
        #[arg(long, value_parser = parse_date)]
        date: Option<DateTime<Utc>>,

        #[command(subcommand)]
        activity: ActivityCommand,
    },

    /// Entries of the last weeks with totals
    History {
        #[command(flatten)]
        user: UserArg,

        /// Window length in weeks
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_WEEKS)]
        weeks: u32,

        /// Only this category (vehicle, plastic, energy, plantation)
        #[arg(short, long)]
        category: Option<Category>,
    },

    /// Entries of the last days
    Recent {
        #[command(flatten)]
        user: UserArg,

        /// Window length in days
        #[arg(short, long, default_value_t = DEFAULT_RECENT_DAYS)]
        days: u32,
    },

    /// Lifetime totals
    Summary {
        #[command(flatten)]
        user: UserArg,
    },

    /// Weekly net footprint trend
    Weekly {
        #[command(flatten)]
        user: UserArg,

        /// Window length in weeks
        #[arg(short, long, default_value_t = DEFAULT_TREND_WEEKS)]
        weeks: u32,
    },

    /// Per-category totals for a date range
    Breakdown {
        #[command(flatten)]
        user: UserArg,

        /// Range start (RFC 3339 or YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        start: DateTime<Utc>,

        /// Range end (RFC 3339 or YYYY-MM-DD), defaults to now
        #[arg(long, value_parser = parse_date)]
        end: Option<DateTime<Utc>>,
    },

    /// User profile and lifetime stats
    Profile {
        #[command(flatten)]
        user: UserArg,
    },

    /// Create or update a user profile
    Register {
        #[command(flatten)]
        user: UserArg,

        #[arg(long)]
        email: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        avatar_url: Option<String>,
    },

    /// Print the effective factor table as YAML
    Factors,
}

impl Command {
    /// Whether the command reads or writes storage
    pub fn uses_store(&self) -> bool {
        !matches!(self, Self::Calculate { .. } | Self::Factors)
    }
}

/// User selector shared by per-user commands
#[derive(Debug, Clone, Args)]
pub struct UserArg {
    /// User identifier
    #[arg(short, long = "user", env = "ECOTRACK_USER")]
    pub user_id: String,
}

/// Activity payload
#[derive(Debug, Clone, Subcommand)]
pub enum ActivityCommand {
    /// A vehicle trip
    Vehicle {
        /// Distance in km
        #[arg(long)]
        distance: f64,

        /// car, motorcycle, bus, ...
        #[arg(long, default_value = "car")]
        vehicle_type: String,

        /// petrol, diesel, cng, electric
        #[arg(long, default_value = "petrol")]
        fuel_type: String,

        /// Distance per fuel unit (km/l, km/kg or km/kWh)
        #[arg(long)]
        mileage: Option<f64>,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Plastic items used
    Plastic {
        /// plastic_bottle, plastic_bag, ...
        #[arg(long = "type", default_value = "plastic_bottle")]
        plastic_type: String,

        /// Item count
        #[arg(long)]
        quantity: f64,
    },

    /// Energy consumed
    Energy {
        /// electricity, natural_gas, heating_oil, coal
        #[arg(long, default_value = "electricity")]
        source: String,

        /// Amount in kWh
        #[arg(long)]
        amount: f64,

        #[arg(long)]
        renewable: bool,

        /// kg CO2 per kWh replacing the table factor
        #[arg(long)]
        grid_factor: Option<f64>,
    },

    /// Trees planted
    Plantation {
        #[arg(long)]
        trees: u32,

        /// neem, mango, banyan, teak, ...
        #[arg(long, default_value = "")]
        species: String,

        /// Scale by this survival probability in (0, 1]
        #[arg(long, conflicts_with = "default_survival")]
        survival: Option<f64>,

        /// Scale by the default survival probability
        #[arg(long)]
        default_survival: bool,

        #[arg(long, default_value = "")]
        location: String,
    },
}

impl From<ActivityCommand> for ActivityInput {
    fn from(command: ActivityCommand) -> Self {
        match command {
            ActivityCommand::Vehicle {
                distance,
                vehicle_type,
                fuel_type,
                mileage,
                description,
            } => ActivityInput::Vehicle(VehicleInput {
                distance,
                vehicle_type,
                fuel_type,
                mileage,
                description,
            }),
            ActivityCommand::Plastic {
                plastic_type,
                quantity,
            } => ActivityInput::Plastic(PlasticInput {
                plastic_type,
                quantity,
            }),
            ActivityCommand::Energy {
                source,
                amount,
                renewable,
                grid_factor,
            } => ActivityInput::Energy(EnergyInput {
                energy_source: source,
                amount,
                is_renewable: renewable,
                grid_factor,
            }),
            ActivityCommand::Plantation {
                trees,
                species,
                survival,
                default_survival,
                location,
            } => {
                let survival = match (survival, default_survival) {
                    (Some(p), _) => SurvivalScaling::Probability(p),
                    (None, true) => SurvivalScaling::Default,
                    (None, false) => SurvivalScaling::None,
                };
                ActivityInput::Plantation(PlantationInput {
                    trees_planted: trees,
                    species,
                    survival,
                    location,
                })
            }
        }
    }
}

/// Parse RFC 3339, or a bare date taken as midnight UTC
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid date '{}': expected RFC 3339 or YYYY-MM-DD", raw))
}

fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Execute a command and render its JSON output
pub async fn execute_command(service: &EntryService, command: Command) -> anyhow::Result<String> {
    match command {
        Command::Calculate { activity } => {
            let assessment = service.preview(&activity.into())?;
            to_json(&assessment)
        }

        Command::Log { user, date, activity } => {
            let logged = service.log_entry(&user.user_id, activity.into(), date).await?;
            to_json(&logged)
        }

        Command::History {
            user,
            weeks,
            category,
        } => to_json(&service.history(&user.user_id, weeks, category).await),

        Command::Recent { user, days } => to_json(&service.recent(&user.user_id, days).await),

        Command::Summary { user } => to_json(&service.summary(&user.user_id).await),

        Command::Weekly { user, weeks } => to_json(&service.weekly(&user.user_id, weeks).await),

        Command::Breakdown { user, start, end } => {
            let end = end.unwrap_or_else(Utc::now);
            if end < start {
                anyhow::bail!("--end must not be before --start");
            }
            to_json(&service.breakdown(&user.user_id, start, end).await)
        }

        Command::Profile { user } => to_json(&service.profile(&user.user_id).await),

        Command::Register {
            user,
            email,
            name,
            avatar_url,
        } => {
            let mut profile = UserProfile::new(user.user_id, email, name, Utc::now());
            profile.avatar_url = avatar_url;
            service.register(profile.clone()).await?;
            to_json(&profile)
        }

        Command::Factors => Ok(service.calculator().factors().to_yaml()?),
    }
}
