pub mod cli;
pub mod core;
pub mod providers;
pub mod server;
pub mod store;

use crate::core::Aggregator;
use crate::core::cache::{KeyValueCollection, NAMESPACE, Store};
use crate::core::config::AppConfig;
use crate::providers::{BirdeyeProvider, MoralisProvider};
use crate::store::KeyValueStore;
use crate::store::memory::MemoryCollection;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub enum AppCommand {
    Fetch { address: Option<String>, json: bool },
    Serve,
    ClearCache,
}

/// Opens the tokenomics collection, falling back to memory when the on-disk
/// store is unavailable.
pub fn build_cache(config: &AppConfig) -> Result<Arc<dyn KeyValueCollection>> {
    if !config.cache.persist {
        return Ok(Arc::new(MemoryCollection::new()));
    }

    let data_path = config.default_data_path()?;
    let store = KeyValueStore::open(&data_path);
    match store.get_collection(NAMESPACE, true, true) {
        Some(collection) => Ok(collection),
        None => {
            warn!(
                path = %data_path.display(),
                "Persistent cache unavailable, using in-memory cache"
            );
            Ok(Arc::new(MemoryCollection::new()))
        }
    }
}

pub fn build_aggregator(
    config: &AppConfig,
    cache: Arc<dyn KeyValueCollection>,
) -> Result<Aggregator> {
    let price_provider = MoralisProvider::new(
        &config.providers.moralis.base_url,
        &config.moralis_api_key(),
        config.fetch_timeout(),
    )?;
    let supply_provider = BirdeyeProvider::new(
        &config.providers.birdeye.base_url,
        &config.birdeye_api_key(),
        &config.providers.birdeye.chain,
        config.fetch_timeout(),
    )?;

    Ok(Aggregator::new(
        Arc::new(price_provider),
        Arc::new(supply_provider),
        cache,
        config.aggregator_settings(),
    ))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Tokenomics starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let cache = build_cache(&config)?;

    match command {
        AppCommand::Fetch { address, json } => {
            let aggregator = build_aggregator(&config, cache)?;
            let address = address.unwrap_or_else(|| config.asset_address.clone());
            cli::fetch::run(&aggregator, &address, json).await
        }
        AppCommand::Serve => {
            let aggregator = build_aggregator(&config, cache)?;
            let state = Arc::new(server::AppState {
                aggregator,
                asset_address: config.asset_address.clone(),
            });
            server::serve(state, &config.server).await
        }
        AppCommand::ClearCache => cli::cache::clear(cache.as_ref()).await,
    }
}
