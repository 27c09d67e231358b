//! SQLite storage for the market feed collector.
//!
//! This crate is the only place in the workspace where Diesel dependencies
//! exist. It implements the store traits defined in `marketfeed-core`:
//! - Database file lifecycle: integrity check, recovery, pooling, migrations
//! - A single-writer actor that serialises all mutations
//! - The token universe repository (atomic replace)
//! - The quote snapshot repository (upsert on token and ingest time)
//!
//! ```text
//! core (engine, services)
//!          │ TokenStore / QuoteStore
//!          ▼
//!  storage-sqlite (this crate)
//!          │
//!          ▼
//!      SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;
pub mod utils;

// Repository implementations
pub mod instruments;
pub mod quotes;

// Re-export database utilities
pub use db::{
    check_integrity, create_pool, get_connection, get_db_path, init, open,
    recover_corrupted_database, run_migrations, spawn_writer, Database, DbConnection, DbPool,
    WriteHandle,
};

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

pub use instruments::TokenRepository;
pub use quotes::QuoteRepository;

// Re-export from marketfeed-core for convenience
pub use marketfeed_core::errors::{DatabaseError, Error, Result};
