//! Runnable entry point: loads configuration, connects both databases, and
//! runs one `Loader::update`. No CLI ergonomics (argument parsing,
//! subcommands, progress UI) - those are out of scope.

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use xref_loader::core_store::PgCoreStore;
use xref_loader::staging_store::PgStagingStore;
use xref_loader::{Loader, LoaderConfig, Result};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config_path = std::env::var("XREF_LOADER_CONFIG_PATH").ok();
    let config = LoaderConfig::load(config_path.as_deref())?;

    log::info!(
        "starting xref load for species_id={} (dumpcheck={})",
        config.species_id,
        config.dumpcheck
    );

    let staging_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.staging.connection_string())
        .await
        .map_err(xref_loader::LoaderError::from)?;
    let core_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.core.connection_string())
        .await
        .map_err(xref_loader::LoaderError::from)?;

    let staging_store = Arc::new(PgStagingStore::new(staging_pool));
    let core_store = Arc::new(PgCoreStore::new(core_pool));

    let loader = Loader::new(staging_store, core_store, config);
    let stats = loader.update().await?;

    log::info!("load finished: {stats}");
    Ok(())
}
