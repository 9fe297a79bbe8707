//! Tokenomics data model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Price-side data returned by the price provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceInfo {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub price_usd: Option<Decimal>,
    pub price_change_percentage_24h: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
}

/// Supply-side data returned by the market data provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplyInfo {
    pub market_cap: Option<Decimal>,
    pub total_supply: Option<Decimal>,
    pub circulating_supply: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Available,
    Failed,
}

impl SourceStatus {
    fn from_presence<T>(value: &Option<T>) -> Self {
        if value.is_some() {
            SourceStatus::Available
        } else {
            SourceStatus::Failed
        }
    }
}

impl Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceStatus::Available => write!(f, "available"),
            SourceStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Tells a field that is `None` because its provider failed apart from one
/// the provider itself reported as null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSources {
    pub price: SourceStatus,
    pub supply: SourceStatus,
}

impl DataSources {
    pub fn is_complete(&self) -> bool {
        self.price == SourceStatus::Available && self.supply == SourceStatus::Available
    }
}

/// The merged record handed to callers and stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenomicsRecord {
    pub address: String,
    pub token_name: Option<String>,
    pub token_symbol: Option<String>,
    pub price_usd: Option<Decimal>,
    pub price_change_percentage_24h: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub total_supply: Option<Decimal>,
    pub circulating_supply: Option<Decimal>,
    pub data_sources: DataSources,
    pub fetched_at: DateTime<Utc>,
}

impl TokenomicsRecord {
    /// Builds a record from whichever halves were fetched. A missing half
    /// leaves its fields empty.
    pub fn merge(
        address: &str,
        price: Option<PriceInfo>,
        supply: Option<SupplyInfo>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let data_sources = DataSources {
            price: SourceStatus::from_presence(&price),
            supply: SourceStatus::from_presence(&supply),
        };
        let price = price.unwrap_or_default();
        let supply = supply.unwrap_or_default();

        Self {
            address: address.to_string(),
            token_name: price.name,
            token_symbol: price.symbol,
            price_usd: price.price_usd,
            price_change_percentage_24h: price.price_change_percentage_24h,
            volume_24h: price.volume_24h,
            market_cap: supply.market_cap,
            total_supply: supply.total_supply,
            circulating_supply: supply.circulating_supply,
            data_sources,
            fetched_at,
        }
    }
}
