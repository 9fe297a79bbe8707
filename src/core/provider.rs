//! Provider abstractions for the two upstream feeds

use crate::core::error::FetchError;
use crate::core::token::{PriceInfo, SupplyInfo};
use async_trait::async_trait;

#[async_trait]
pub trait PriceInfoProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_price_info(&self, address: &str) -> Result<PriceInfo, FetchError>;
}

#[async_trait]
pub trait SupplyInfoProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_supply_info(&self, address: &str) -> Result<SupplyInfo, FetchError>;
}
