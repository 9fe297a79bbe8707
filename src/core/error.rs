//! Error taxonomy for fetchers and the aggregator

use std::fmt::Display;
use thiserror::Error;

/// Why a single provider fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchCause {
    Timeout,
    Network,
    BadResponse,
    RateLimited,
}

impl Display for FetchCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                FetchCause::Timeout => "timeout",
                FetchCause::Network => "network",
                FetchCause::BadResponse => "bad response",
                FetchCause::RateLimited => "rate limited",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{provider} fetch failed ({cause}): {message}")]
pub struct FetchError {
    pub provider: String,
    pub cause: FetchCause,
    pub message: String,
}

impl FetchError {
    pub fn new(provider: &str, cause: FetchCause, message: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            cause,
            message: message.into(),
        }
    }
}

/// Failures surfaced to callers of the aggregator. Cache faults never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregatorError {
    #[error("asset address must not be empty")]
    InvalidAddress,
    #[error("all upstream providers are unavailable: {price}; {supply}")]
    UpstreamUnavailable {
        price: FetchError,
        supply: FetchError,
    },
    #[error("refresh task aborted: {0}")]
    TaskAborted(String),
}
