//! Error types for the footprint ledger

use footprint_engine::FootprintError;

/// Main error type for ledger operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Footprint(#[from] FootprintError),

    #[error("Database error: {0}")]
    Database(String),
}

impl LedgerError {
    /// Whether the caller sent something the engine rejects
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Footprint(e) => e.is_client_error(),
            Self::Database(_) => false,
        }
    }
}

impl From<mongodb::error::Error> for LedgerError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for LedgerError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Database(format!("BSON encode error: {}", err))
    }
}

impl From<bson::de::Error> for LedgerError {
    fn from(err: bson::de::Error) -> Self {
        Self::Database(format!("BSON decode error: {}", err))
    }
}

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;
