//! Marketfeed Core - Instrument universe, acquisition loop and storage traits.
//!
//! This crate holds the collector's domain logic. It is database-agnostic and
//! defines the traits that the `storage-sqlite` crate implements.

pub mod acquisition;
pub mod errors;
pub mod instruments;
pub mod quotes;
pub mod settings;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
