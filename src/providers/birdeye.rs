use super::util::{deserialize_exact_decimal, fetch_json, http_client};
use crate::core::error::{FetchCause, FetchError};
use crate::core::provider::SupplyInfoProvider;
use crate::core::token::SupplyInfo;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_BASE_URL: &str = "https://public-api.birdeye.so";
pub const DEFAULT_CHAIN: &str = "solana";

#[derive(Debug, Deserialize)]
struct BirdeyeResponse {
    data: Option<BirdeyeMarketData>,
}

#[derive(Debug, Deserialize)]
struct BirdeyeMarketData {
    #[serde(default, deserialize_with = "deserialize_exact_decimal")]
    market_cap: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_exact_decimal")]
    total_supply: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_exact_decimal")]
    circulating_supply: Option<Decimal>,
}

/// Supply feed backed by the Birdeye market-data endpoint
pub struct BirdeyeProvider {
    base_url: String,
    api_key: String,
    chain: String,
    client: Client,
}

impl BirdeyeProvider {
    pub fn new(base_url: &str, api_key: &str, chain: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            chain: chain.to_string(),
            client: http_client(timeout).context("Failed to build Birdeye HTTP client")?,
        })
    }

    fn market_data_url(&self, address: &str) -> Result<Url, FetchError> {
        Url::parse_with_params(
            &format!("{}/defi/v3/token/market-data", self.base_url),
            &[("address", address), ("ui_amount_mode", "scaled")],
        )
        .map_err(|e| FetchError::new(self.name(), FetchCause::Network, e.to_string()))
    }
}

#[async_trait]
impl SupplyInfoProvider for BirdeyeProvider {
    fn name(&self) -> &'static str {
        "birdeye"
    }

    #[instrument(name = "BirdeyeMarketFetch", skip(self), fields(address = %address))]
    async fn fetch_supply_info(&self, address: &str) -> Result<SupplyInfo, FetchError> {
        let url = self.market_data_url(address)?;
        debug!("Requesting market data from {}", url);

        let request = self
            .client
            .get(url)
            .header("accept", "application/json")
            .header("x-api-key", &self.api_key)
            .header("x-chain", &self.chain);
        let response: BirdeyeResponse = fetch_json(self.name(), request).await?;

        let data = response.data.ok_or_else(|| {
            FetchError::new(
                self.name(),
                FetchCause::BadResponse,
                "unexpected response: missing data object",
            )
        })?;

        Ok(SupplyInfo {
            market_cap: data.market_cap,
            total_supply: data.total_supply,
            circulating_supply: data.circulating_supply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ADDRESS: &str = "TKN123";

    async fn create_mock_server(status_code: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/defi/v3/token/market-data"))
            .and(query_param("address", ADDRESS))
            .and(query_param("ui_amount_mode", "scaled"))
            .and(header("x-api-key", "test-key"))
            .and(header("x-chain", "solana"))
            .respond_with(ResponseTemplate::new(status_code).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider(server: &MockServer) -> BirdeyeProvider {
        BirdeyeProvider::new(&server.uri(), "test-key", "solana", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_successful_market_data_fetch() {
        let body = r#"{
            "success": true,
            "data": {
                "price": 5.4638e-05,
                "liquidity": 12000.5,
                "market_cap": 54570.77,
                "total_supply": 999593117.56,
                "circulating_supply": 999593117.56
            }
        }"#;
        let server = create_mock_server(200, body).await;

        let info = provider(&server).fetch_supply_info(ADDRESS).await.unwrap();

        assert_eq!(info.market_cap, Some(Decimal::from_str("54570.77").unwrap()));
        assert_eq!(
            info.total_supply,
            Some(Decimal::from_str("999593117.56").unwrap())
        );
        assert_eq!(
            info.circulating_supply,
            Some(Decimal::from_str("999593117.56").unwrap())
        );
    }

    #[tokio::test]
    async fn test_out_of_range_supply_drops_only_that_field() {
        let body = r#"{
            "success": true,
            "data": {
                "market_cap": 1.5e-30,
                "total_supply": 1e30,
                "circulating_supply": 54570.12345678901234567890123
            }
        }"#;
        let server = create_mock_server(200, body).await;

        let info = provider(&server).fetch_supply_info(ADDRESS).await.unwrap();

        assert!(info.market_cap.is_none());
        assert!(info.total_supply.is_none());
        assert_eq!(
            info.circulating_supply.map(|c| c.to_string()).as_deref(),
            Some("54570.12345678901234567890123")
        );
    }

    #[tokio::test]
    async fn test_missing_fields_are_absent() {
        let server = create_mock_server(200, r#"{"success": true, "data": {}}"#).await;

        let info = provider(&server).fetch_supply_info(ADDRESS).await.unwrap();

        assert_eq!(info, SupplyInfo::default());
    }

    #[tokio::test]
    async fn test_missing_data_object() {
        let server = create_mock_server(200, r#"{"success": false, "message": "Not found"}"#).await;

        let err = provider(&server).fetch_supply_info(ADDRESS).await.unwrap_err();

        assert_eq!(err.provider, "birdeye");
        assert_eq!(err.cause, FetchCause::BadResponse);
        assert!(err.message.contains("missing data"));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = create_mock_server(429, "").await;

        let err = provider(&server).fetch_supply_info(ADDRESS).await.unwrap_err();

        assert_eq!(err.cause, FetchCause::RateLimited);
    }

    #[tokio::test]
    async fn test_unauthorized_is_bad_response() {
        let server = create_mock_server(401, r#"{"message": "Unauthorized"}"#).await;

        let err = provider(&server).fetch_supply_info(ADDRESS).await.unwrap_err();

        assert_eq!(err.cause, FetchCause::BadResponse);
        assert!(err.message.contains("401"));
    }

    #[tokio::test]
    async fn test_empty_body_is_bad_response() {
        let server = create_mock_server(200, "").await;

        let err = provider(&server).fetch_supply_info(ADDRESS).await.unwrap_err();

        assert_eq!(err.cause, FetchCause::BadResponse);
        assert_eq!(err.message, "received empty response");
    }
}
