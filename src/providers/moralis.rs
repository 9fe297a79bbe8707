use super::util::{deserialize_exact_decimal, fetch_json, http_client};
use crate::core::error::FetchError;
use crate::core::provider::PriceInfoProvider;
use crate::core::token::PriceInfo;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_BASE_URL: &str = "https://solana-gateway.moralis.io";

#[derive(Debug, Deserialize)]
struct MoralisPriceResponse {
    name: Option<String>,
    symbol: Option<String>,
    #[serde(
        rename = "usdPrice",
        default,
        deserialize_with = "deserialize_exact_decimal"
    )]
    usd_price: Option<Decimal>,
    #[serde(
        rename = "usdPrice24hrPercentChange",
        default,
        deserialize_with = "deserialize_exact_decimal"
    )]
    usd_price_24hr_percent_change: Option<Decimal>,
    #[serde(
        rename = "usdPrice24h",
        default,
        deserialize_with = "deserialize_exact_decimal"
    )]
    usd_price_24h: Option<Decimal>,
}

/// Price feed backed by the Moralis Solana token price endpoint
pub struct MoralisProvider {
    base_url: String,
    api_key: String,
    client: Client,
}

impl MoralisProvider {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: http_client(timeout).context("Failed to build Moralis HTTP client")?,
        })
    }
}

#[async_trait]
impl PriceInfoProvider for MoralisProvider {
    fn name(&self) -> &'static str {
        "moralis"
    }

    #[instrument(name = "MoralisPriceFetch", skip(self), fields(address = %address))]
    async fn fetch_price_info(&self, address: &str) -> Result<PriceInfo, FetchError> {
        let url = format!("{}/token/mainnet/{}/price", self.base_url, address);
        debug!("Requesting price data from {}", url);

        let request = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .header("X-API-Key", &self.api_key);
        let data: MoralisPriceResponse = fetch_json(self.name(), request).await?;

        // usdPrice24h is what the dashboard has always shown as 24h volume
        Ok(PriceInfo {
            name: data.name,
            symbol: data.symbol,
            price_usd: data.usd_price,
            price_change_percentage_24h: data.usd_price_24hr_percent_change,
            volume_24h: data.usd_price_24h,
        })
    }
}
