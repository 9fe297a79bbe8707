//! Core business logic abstractions

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod log;
pub mod provider;
pub mod token;

// Re-export main types for cleaner imports
pub use aggregator::{Aggregator, AggregatorSettings, CacheStatsSnapshot};
pub use error::{AggregatorError, FetchCause, FetchError};
pub use provider::{PriceInfoProvider, SupplyInfoProvider};
pub use token::{DataSources, PriceInfo, SourceStatus, SupplyInfo, TokenomicsRecord};
