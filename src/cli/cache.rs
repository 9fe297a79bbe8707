use crate::core::cache::KeyValueCollection;
use anyhow::{Context, Result};
use tracing::info;

/// Drops every cached record so the next read goes upstream.
pub async fn clear(cache: &dyn KeyValueCollection) -> Result<()> {
    cache.clear().await.context("Failed to clear cache")?;
    info!("Cleared tokenomics cache");
    println!("Cache cleared");
    Ok(())
}
