use crate::core::error::{FetchCause, FetchError};
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::{debug, warn};

pub const USER_AGENT: &str = concat!("tokenomics/", env!("CARGO_PKG_VERSION"));

/// Builds a client with a per-request timeout. Requests are never retried.
pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

fn classify(provider: &str, e: reqwest::Error) -> FetchError {
    let cause = if e.is_timeout() {
        FetchCause::Timeout
    } else if e.is_decode() {
        FetchCause::BadResponse
    } else {
        FetchCause::Network
    };
    FetchError::new(provider, cause, e.to_string())
}

/// Sends `request` once and decodes a JSON body, mapping every failure onto a [`FetchCause`].
pub async fn fetch_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> Result<T, FetchError> {
    let response = request.send().await.map_err(|e| classify(provider, e))?;
    let status = response.status();
    debug!(provider, %status, "Received provider response");

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::new(
            provider,
            FetchCause::RateLimited,
            format!("HTTP {status}"),
        ));
    }

    let body = response.text().await.map_err(|e| classify(provider, e))?;

    if !status.is_success() {
        return Err(FetchError::new(
            provider,
            FetchCause::BadResponse,
            format!("HTTP {status}: {body}"),
        ));
    }
    if body.trim().is_empty() {
        return Err(FetchError::new(
            provider,
            FetchCause::BadResponse,
            "received empty response",
        ));
    }

    serde_json::from_str(&body).map_err(|e| {
        FetchError::new(
            provider,
            FetchCause::BadResponse,
            format!("failed to parse response: {e}. Response: '{body}'"),
        )
    })
}

/// Parses a JSON number literal into a [`Decimal`] without rounding.
///
/// Literals that would need more than 28 fractional digits, or whose value
/// does not fit the 96-bit mantissa, have no exact representation and
/// yield `None`.
pub fn exact_decimal(literal: &str) -> Option<Decimal> {
    let (negative, unsigned) = match literal.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, literal),
    };
    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i64>().ok()?),
        None => (unsigned, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    let digits = format!("{int_part}{frac_part}");
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let without_trailing = digits.trim_end_matches('0');
    let trailing_zeros = (digits.len() - without_trailing.len()) as i64;
    let significant = without_trailing.trim_start_matches('0');
    if significant.is_empty() {
        return Some(Decimal::ZERO);
    }

    let mut value: i128 = significant.parse().ok()?;
    let mut scale = (frac_part.len() as i64)
        .checked_sub(exponent)?
        .checked_sub(trailing_zeros)?;
    if scale < 0 {
        let factor = 10i128.checked_pow(u32::try_from(scale.unsigned_abs()).ok()?)?;
        value = value.checked_mul(factor)?;
        scale = 0;
    }
    let scale = u32::try_from(scale).ok()?;
    let value = if negative { -value } else { value };

    Decimal::try_from_i128_with_scale(value, scale).ok()
}

/// `deserialize_with` hook for optional provider numbers. Reads the literal
/// text of the number, so nothing passes through `f64`. A number with no
/// exact decimal form is dropped with a warning instead of failing the
/// whole response.
pub fn deserialize_exact_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(number.and_then(|number| {
        let literal = number.to_string();
        let value = exact_decimal(&literal);
        if value.is_none() {
            warn!(value = %literal, "Dropping number outside the exact decimal range");
        }
        value
    }))
}
