//! Universe refresh orchestration.

use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use log::{debug, info, warn};

use super::model::TokenType;
use super::resolver::UniverseResolver;
use super::store::TokenStore;
use crate::acquisition::Clock;
use crate::errors::Result;
use marketfeed_market_data::CatalogSource;

/// Result of [`UniverseService::refresh`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The stored universe is still current.
    Skipped,
    Refreshed {
        futures: usize,
        options: usize,
        equities: usize,
    },
}

/// Downloads the catalog, resolves it and swaps the stored universe.
pub struct UniverseService {
    catalog: Arc<dyn CatalogSource>,
    store: Arc<dyn TokenStore>,
    resolver: UniverseResolver,
    clock: Arc<dyn Clock>,
    timezone: Tz,
}

impl UniverseService {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        store: Arc<dyn TokenStore>,
        resolver: UniverseResolver,
        clock: Arc<dyn Clock>,
        timezone: Tz,
    ) -> Self {
        Self {
            catalog,
            store,
            resolver,
            clock,
            timezone,
        }
    }

    /// Exchange-local date according to the service clock.
    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.timezone).date_naive()
    }

    /// Whether the stored universe should be rebuilt.
    ///
    /// True when nothing is stored, when the stored futures have expired, or
    /// when the last refresh happened on an earlier exchange-local day.
    pub fn needs_refresh(&self, today: NaiveDate) -> Result<bool> {
        if self.store.count()? == 0 {
            debug!("Token store is empty");
            return Ok(true);
        }

        if let Some(expiry) = self.store.earliest_futures_expiry()? {
            if expiry < today {
                debug!("Stored futures expired on {}", expiry);
                return Ok(true);
            }
        }

        match self.store.last_refreshed_at()? {
            Some(at) => Ok(at.with_timezone(&self.timezone).date_naive() < today),
            None => Ok(true),
        }
    }

    /// Refresh the universe unless it is current; `force` always refreshes.
    ///
    /// On any catalog or resolution failure the stored universe is untouched.
    pub async fn refresh(&self, force: bool) -> Result<RefreshOutcome> {
        let today = self.today();
        if !force && !self.needs_refresh(today)? {
            info!("Token universe is current, skipping refresh");
            return Ok(RefreshOutcome::Skipped);
        }

        let catalog = self.catalog.fetch_catalog().await?;
        info!(
            "Catalog from {} has {} rows",
            self.catalog.id(),
            catalog.len()
        );

        let resolved = match self.resolver.resolve(&catalog) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("Universe resolution failed, keeping the stored universe: {}", e);
                return Err(e.into());
            }
        };

        let count_of = |kind: TokenType| resolved.iter().filter(|t| t.token_type == kind).count();
        let outcome = RefreshOutcome::Refreshed {
            futures: count_of(TokenType::Futures),
            options: count_of(TokenType::Options),
            equities: count_of(TokenType::Equity),
        };

        let written = self.store.replace_all(resolved, self.clock.now()).await?;
        info!("Stored {} resolved tokens", written);
        Ok(outcome)
    }
}
