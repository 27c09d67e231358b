//! Instrument universe module.
//!
//! - [`model`] - Resolved tokens and their roles
//! - [`resolver`] - Catalog to universe resolution, strike spacing
//! - [`store`] - Storage trait for the resolved universe
//! - [`service`] - Refresh orchestration (download, resolve, swap)
//!
//! ```text
//! CatalogSource → UniverseResolver → TokenStore::replace_all
//! ```

pub mod errors;
pub mod model;
pub mod resolver;
pub mod service;
pub mod store;


pub use errors::ResolutionError;
pub use model::{OptionSide, ResolvedToken, TokenType};
pub use resolver::{strike_distance, UniverseResolver};
pub use service::{RefreshOutcome, UniverseService};
pub use store::TokenStore;
