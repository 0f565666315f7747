//! Error types for the footprint engine

use crate::types::Category;

/// Errors raised by factor loading and emission calculation.
///
/// Non-positive or non-finite measures are not errors inside the
/// calculator (they yield a zero result); `InvalidInput` is raised by
/// [`crate::ActivityInput::validate`] for callers that must reject them.
#[derive(Debug, thiserror::Error)]
pub enum FootprintError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown {category} factor key: {key}")]
    UnknownFactorKey { category: Category, key: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl FootprintError {
    /// Whether the error describes bad caller input rather than a broken setup
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::UnknownFactorKey { .. })
    }
}

/// Result type alias for footprint engine operations
pub type Result<T> = std::result::Result<T, FootprintError>;
