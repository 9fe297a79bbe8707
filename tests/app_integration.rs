use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::fs;
use std::sync::Arc;
use tokenomics::core::config::AppConfig;
use tokenomics::server::{AppState, build_app};
use tower::ServiceExt;
use tracing::info;

const ADDRESS: &str = "TKN123";

mod test_utils {
    use super::ADDRESS;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub const MORALIS_BODY: &str = r#"{
        "name": "dogshit",
        "symbol": "dogshit",
        "usdPrice": 5.4638e-05,
        "usdPrice24hrPercentChange": -1.633,
        "usdPrice24h": 5.5545e-05
    }"#;

    pub const BIRDEYE_BODY: &str = r#"{
        "success": true,
        "data": {
            "market_cap": 54570.77,
            "total_supply": 999593117.56,
            "circulating_supply": 999593117.56
        }
    }"#;

    pub async fn create_moralis_mock_server(status: u16, body: &str, calls: u64) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/token/mainnet/{ADDRESS}/price")))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .expect(calls)
            .mount(&mock_server)
            .await;
        mock_server
    }

    pub async fn create_birdeye_mock_server(status: u16, body: &str, calls: u64) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/defi/v3/token/market-data"))
            .and(query_param("address", ADDRESS))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .expect(calls)
            .mount(&mock_server)
            .await;
        mock_server
    }

    pub fn config_yaml(moralis_uri: &str, birdeye_uri: &str) -> String {
        format!(
            r#"
        asset_address: "{ADDRESS}"
        providers:
          moralis:
            base_url: {moralis_uri}
            api_key: "moralis-key"
          birdeye:
            base_url: {birdeye_uri}
            api_key: "birdeye-key"
        cache:
          ttl_seconds: 300
          persist: false
        fetch_timeout_secs: 5
    "#
        )
    }
}

fn build_test_app(config: &AppConfig) -> axum::Router {
    let cache = tokenomics::build_cache(config).unwrap();
    let aggregator = tokenomics::build_aggregator(config, cache).unwrap();
    let state = Arc::new(AppState {
        aggregator,
        asset_address: config.asset_address.clone(),
    });
    build_app(state, &config.server.cors_origins)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[test_log::test(tokio::test)]
async fn test_tokenomics_endpoint_serves_cached_record() {
    let moralis = test_utils::create_moralis_mock_server(200, test_utils::MORALIS_BODY, 1).await;
    let birdeye = test_utils::create_birdeye_mock_server(200, test_utils::BIRDEYE_BODY, 1).await;
    let config: AppConfig =
        serde_yaml::from_str(&test_utils::config_yaml(&moralis.uri(), &birdeye.uri())).unwrap();
    let app = build_test_app(&config);

    let (status, first) = get_json(&app, "/api/v1/tokenomics").await;
    info!(?first, "First response");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["message"], "Market data retrieved successfully");

    let data = &first["data"];
    assert_eq!(data["address"], ADDRESS);
    assert_eq!(data["token_name"], "dogshit");
    assert_eq!(data["token_symbol"], "dogshit");
    assert_eq!(data["price_usd"], "0.000054638");
    assert_eq!(data["price_change_percentage_24h"], "-1.633");
    assert_eq!(data["volume_24h"], "0.000055545");
    assert_eq!(data["market_cap"], "54570.77");
    assert_eq!(data["total_supply"], "999593117.56");
    assert_eq!(data["circulating_supply"], "999593117.56");
    assert_eq!(data["data_sources"]["price"], "available");
    assert_eq!(data["data_sources"]["supply"], "available");

    // Served from cache: the mocks only allow one call each
    let (status, second) = get_json(&app, "/api/v1/tokenomics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);

    let (status, cache_status) = get_json(&app, "/cache/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_status["namespace"], "tokenomics");
    assert_eq!(cache_status["identifier"], ADDRESS);
    assert_eq!(
        cache_status["cache_key"],
        tokenomics::core::cache::derive_key(ADDRESS).to_string()
    );
    assert_eq!(cache_status["ttl_seconds"], 300);
    assert!(cache_status["remaining_ttl_seconds"].as_u64().unwrap() <= 300);
    assert_eq!(cache_status["cache_performance"]["hits"], 1);
    assert_eq!(cache_status["cache_performance"]["misses"], 1);
}

#[test_log::test(tokio::test)]
async fn test_single_provider_outage_returns_partial_record() {
    let moralis = test_utils::create_moralis_mock_server(200, test_utils::MORALIS_BODY, 1).await;
    let birdeye = test_utils::create_birdeye_mock_server(500, "Server Error", 1).await;
    let config: AppConfig =
        serde_yaml::from_str(&test_utils::config_yaml(&moralis.uri(), &birdeye.uri())).unwrap();
    let app = build_test_app(&config);

    let (status, body) = get_json(&app, "/api/v1/tokenomics").await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["price_usd"], "0.000054638");
    assert!(data["market_cap"].is_null());
    assert!(data["total_supply"].is_null());
    assert!(data["circulating_supply"].is_null());
    assert_eq!(data["data_sources"]["supply"], "failed");
}

#[test_log::test(tokio::test)]
async fn test_total_outage_maps_to_service_unavailable() {
    let moralis = test_utils::create_moralis_mock_server(429, "", 2).await;
    let birdeye = test_utils::create_birdeye_mock_server(200, r#"{"success": false}"#, 2).await;
    let config: AppConfig =
        serde_yaml::from_str(&test_utils::config_yaml(&moralis.uri(), &birdeye.uri())).unwrap();
    let app = build_test_app(&config);

    let (status, body) = get_json(&app, "/api/v1/tokenomics").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("moralis fetch failed (rate limited)"));
    assert!(detail.contains("birdeye fetch failed (bad response)"));

    // Nothing was cached, so the next request goes upstream again
    let (status, _) = get_json(&app, "/api/v1/tokenomics").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (_, cache_status) = get_json(&app, "/cache/status").await;
    assert!(cache_status["remaining_ttl_seconds"].is_null());
    assert_eq!(cache_status["cache_performance"]["upstream_failures"], 2);
}

#[test_log::test(tokio::test)]
async fn test_health_endpoint() {
    let config: AppConfig = serde_yaml::from_str(&test_utils::config_yaml(
        "http://127.0.0.1:9",
        "http://127.0.0.1:9",
    ))
    .unwrap();
    let app = build_test_app(&config);

    let (status, body) = get_json(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[test_log::test(tokio::test)]
async fn test_fetch_command_with_mock_providers() {
    let moralis = test_utils::create_moralis_mock_server(200, test_utils::MORALIS_BODY, 1).await;
    let birdeye = test_utils::create_birdeye_mock_server(200, test_utils::BIRDEYE_BODY, 1).await;

    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_path = config_file.path();
    fs::write(
        config_path,
        test_utils::config_yaml(&moralis.uri(), &birdeye.uri()),
    )
    .expect("Failed to write config file");

    let result = tokenomics::run_command(
        tokenomics::AppCommand::Fetch {
            address: None,
            json: true,
        },
        Some(config_path.to_str().unwrap()),
    )
    .await;
    assert!(
        result.is_ok(),
        "Fetch command failed with: {:?}",
        result.err()
    );
}

#[test_log::test(tokio::test)]
async fn test_fetch_command_fails_when_all_providers_fail() {
    let moralis = test_utils::create_moralis_mock_server(500, "", 1).await;
    let birdeye = test_utils::create_birdeye_mock_server(500, "", 1).await;

    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    fs::write(
        config_file.path(),
        test_utils::config_yaml(&moralis.uri(), &birdeye.uri()),
    )
    .expect("Failed to write config file");

    let result = tokenomics::run_command(
        tokenomics::AppCommand::Fetch {
            address: None,
            json: true,
        },
        Some(config_file.path().to_str().unwrap()),
    )
    .await;

    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("all upstream providers are unavailable"));
}

#[test_log::test(tokio::test)]
async fn test_persistent_cache_survives_aggregator_rebuild() {
    let moralis = test_utils::create_moralis_mock_server(200, test_utils::MORALIS_BODY, 1).await;
    let birdeye = test_utils::create_birdeye_mock_server(200, test_utils::BIRDEYE_BODY, 1).await;
    let data_dir = tempfile::tempdir().unwrap();

    let mut config: AppConfig =
        serde_yaml::from_str(&test_utils::config_yaml(&moralis.uri(), &birdeye.uri())).unwrap();
    config.cache.persist = true;
    config.data_path = Some(data_dir.path().to_string_lossy().into_owned());

    let cache = tokenomics::build_cache(&config).unwrap();
    let first = tokenomics::build_aggregator(&config, Arc::clone(&cache)).unwrap();
    let record = first.get_tokenomics(ADDRESS).await.unwrap();

    // A fresh aggregator over the persisted collection answers without going upstream
    let second = tokenomics::build_aggregator(&config, cache).unwrap();
    assert_eq!(second.get_tokenomics(ADDRESS).await.unwrap(), record);
    assert_eq!(second.stats().hits, 1);
}
