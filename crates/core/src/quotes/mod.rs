//! Quote persistence interface.
//!
//! - [`model`] - The stored quote row
//! - [`store`] - Storage trait implemented by the SQLite crate

pub mod model;
pub mod store;

pub use model::StoredQuote;
pub use store::QuoteStore;
