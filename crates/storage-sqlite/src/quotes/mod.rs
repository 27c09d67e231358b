//! SQLite storage for quote snapshots.

mod model;
mod repository;

pub use model::{ingest_key, QuoteDB};
pub use repository::QuoteRepository;

// Re-export trait from core for convenience
pub use marketfeed_core::quotes::QuoteStore;
