//! SQLite storage for the resolved token universe.

pub(crate) mod model;
mod repository;

pub use model::{TokenDB, TokenRefreshDB};
pub use repository::TokenRepository;

// Re-export trait from core for convenience
pub use marketfeed_core::instruments::TokenStore;
