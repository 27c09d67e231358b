//! Storage-specific error types for SQLite operations.
//!
//! Diesel and r2d2 errors are wrapped here and converted to the
//! database-agnostic errors of `marketfeed_core` at the crate boundary.

use diesel::result::Error as DieselError;
use marketfeed_core::errors::{DatabaseError, Error};
use thiserror::Error;

/// Storage-specific errors that wrap Diesel and r2d2 types.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("Query execution failed: {0}")]
    QueryFailed(#[from] DieselError),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be decoded back into its domain type.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An error raised by a writer job, carried through the transaction.
    #[error(transparent)]
    Core(Error),
}

/// Lets a writer job's core error pass through `immediate_transaction`.
impl From<Error> for StorageError {
    fn from(err: Error) -> Self {
        StorageError::Core(err)
    }
}

/// SQLite reports on-disk damage through these messages.
fn is_corruption_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("malformed") || message.contains("not a database")
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConnectionFailed(e) => {
                Error::Database(DatabaseError::ConnectionFailed(e.to_string()))
            }
            StorageError::PoolError(e) => {
                Error::Database(DatabaseError::PoolCreationFailed(e.to_string()))
            }
            StorageError::QueryFailed(DieselError::NotFound) => {
                Error::Database(DatabaseError::NotFound("Record not found".to_string()))
            }
            StorageError::QueryFailed(DieselError::DatabaseError(_, info))
                if is_corruption_message(info.message()) =>
            {
                Error::Database(DatabaseError::Corrupted(info.message().to_string()))
            }
            StorageError::QueryFailed(DieselError::RollbackTransaction) => {
                Error::Database(DatabaseError::TransactionFailed(
                    "transaction rolled back".to_string(),
                ))
            }
            StorageError::QueryFailed(e) => {
                Error::Database(DatabaseError::QueryFailed(e.to_string()))
            }
            StorageError::MigrationFailed(e) => Error::Database(DatabaseError::MigrationFailed(e)),
            StorageError::SerializationError(e) => Error::Database(DatabaseError::Internal(e)),
            StorageError::Core(e) => e,
        }
    }
}

/// Extension trait for easily converting Diesel Results to core Results.
///
/// This provides a `.into_core()` method on any `Result<T, diesel::result::Error>`
/// which handles the conversion through StorageError.
pub trait IntoCore<T> {
    fn into_core(self) -> marketfeed_core::Result<T>;
}

impl<T> IntoCore<T> for std::result::Result<T, DieselError> {
    fn into_core(self) -> marketfeed_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

impl<T> IntoCore<T> for std::result::Result<T, r2d2::Error> {
    fn into_core(self) -> marketfeed_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

impl<T> IntoCore<T> for std::result::Result<T, diesel::ConnectionError> {
    fn into_core(self) -> marketfeed_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_core_not_found() {
        let err: Error = StorageError::QueryFailed(DieselError::NotFound).into();
        assert!(matches!(err, Error::Database(DatabaseError::NotFound(_))));
    }

    #[test]
    fn test_core_error_passes_through_unchanged() {
        let original = Error::InvalidConfigValue("bad".to_string());
        let err: Error = StorageError::from(original).into();
        assert!(matches!(err, Error::InvalidConfigValue(ref m) if m == "bad"));
    }

    #[test]
    fn test_corruption_messages() {
        assert!(is_corruption_message("database disk image is malformed"));
        assert!(is_corruption_message("file is not a database"));
        assert!(!is_corruption_message("no such table: quotes"));
    }
}
