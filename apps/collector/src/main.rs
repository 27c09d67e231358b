mod config;
mod main_lib;

use config::Config;
use main_lib::{build_state, init_tracing, run, spawn_shutdown_listener};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();
    tracing::info!("Data directory: {}", config.data_dir);

    let state = build_state(&config)?;

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    run(state, cancel).await?;
    Ok(())
}
