use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use marketfeed_core::acquisition::{AcquisitionEngine, Clock, RunSummary, SystemClock};
use marketfeed_core::instruments::{RefreshOutcome, TokenStore, UniverseResolver, UniverseService};
use marketfeed_market_data::{
    RateLimiter, ScripMasterClient, SmartApiOptions, SmartApiProvider,
};
use marketfeed_storage_sqlite::{db, QuoteRepository, TokenRepository};

pub struct AppState {
    pub token_store: Arc<dyn TokenStore>,
    pub universe_service: UniverseService,
    pub engine: AcquisitionEngine,
    pub force_token_refresh: bool,
}

pub fn init_tracing() {
    let log_format = std::env::var("MF_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let database = db::open(&config.data_dir, config.recover_on_corruption)?;

    let token_store: Arc<dyn TokenStore> = Arc::new(TokenRepository::new(
        database.pool.clone(),
        database.writer.clone(),
    ));
    let quote_store = Arc::new(QuoteRepository::new(
        database.pool.clone(),
        database.writer.clone(),
    ));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let catalog = Arc::new(ScripMasterClient::new(config.catalog_url.clone())?);
    let universe_service = UniverseService::new(
        catalog,
        token_store.clone(),
        UniverseResolver::new(config.resolver.clone()),
        clock.clone(),
        config.acquisition.market_hours.timezone,
    );

    let options = SmartApiOptions {
        base_url: config.smartapi_base_url.clone(),
        ..SmartApiOptions::default()
    };
    let provider = Arc::new(SmartApiProvider::new(config.credentials.clone(), options)?);

    let engine = AcquisitionEngine::new(
        provider,
        token_store.clone(),
        quote_store,
        Arc::new(RateLimiter::new()),
        clock,
        config.acquisition.clone(),
    );

    Ok(AppState {
        token_store,
        universe_service,
        engine,
        force_token_refresh: config.force_token_refresh,
    })
}

/// Refresh the universe, then collect until `cancel` fires.
pub async fn run(state: AppState, cancel: CancellationToken) -> anyhow::Result<RunSummary> {
    match state
        .universe_service
        .refresh(state.force_token_refresh)
        .await
    {
        Ok(RefreshOutcome::Skipped) => {}
        Ok(RefreshOutcome::Refreshed {
            futures,
            options,
            equities,
        }) => tracing::info!(
            "Token universe refreshed: {} futures, {} options, {} equities",
            futures,
            options,
            equities
        ),
        Err(e) => {
            let stored = state.token_store.count()?;
            if stored == 0 {
                return Err(anyhow::Error::new(e).context("no token universe available"));
            }
            tracing::warn!(
                "Token refresh failed, continuing with {} stored tokens: {}",
                stored,
                e
            );
        }
    }

    let summary = state.engine.run(cancel).await;
    tracing::info!(
        "Collector stopped after {} cycles: {} fetched, {} unfetched, {} persisted, {} errors (state {})",
        summary.cycles,
        summary.fetched,
        summary.unfetched,
        summary.persisted,
        summary.errors,
        summary.final_state
    );
    Ok(summary)
}

/// Cancel `token` on Ctrl+C or SIGTERM.
pub fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, finishing the current step");
        token.cancel();
    });
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!("SIGTERM handler unavailable: {}", e);
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Ctrl+C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}
