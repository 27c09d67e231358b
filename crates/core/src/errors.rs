//! Core error types for the collector.
//!
//! This module defines database-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to these types by the storage layer.

use thiserror::Error;

use crate::instruments::ResolutionError;
use marketfeed_market_data::MarketDataError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type.
///
/// The variants follow the four failure classes the collector distinguishes:
/// resolution, provider, persistence and configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Instrument resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Market data operation failed: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),

    #[error("Missing configuration key: {0}")]
    MissingConfigKey(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Database-agnostic error type for storage operations.
///
/// This enum uses `String` for all error details, allowing the storage layer
/// to convert storage-specific errors (Diesel, SQLite, etc.) into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish a database connection.
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to create or configure the connection pool.
    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    /// A database query failed to execute.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// The requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A database transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Database migration failed.
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// The on-disk database failed its integrity check.
    #[error("Database is corrupted: {0}")]
    Corrupted(String),

    /// Moving a corrupted database aside or rebuilding it failed.
    #[error("Database recovery failed: {0}")]
    RecoveryFailed(String),

    /// Internal/unexpected database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Unexpected(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_error_display() {
        let err = Error::from(ResolutionError::NoFuturesRows);
        assert_eq!(
            err.to_string(),
            "Instrument resolution failed: No futures rows in the derivatives segment"
        );
    }
}
