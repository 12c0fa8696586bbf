// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Price sources, fallback resolution and the shared query rate limiter.

pub mod birdeye;
pub mod jupiter;
pub mod moralis;
pub mod rate_limit;
pub mod resolver;

pub use birdeye::BirdeyeSource;
pub use jupiter::JupiterSource;
pub use moralis::MoralisSource;
pub use rate_limit::{RateLimiter, RateLimiterClosed, DEFAULT_PRICE_PERMITS};
pub use resolver::{validate_asset_id, PriceResolution, PriceResolver};

use crate::error::PriceError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// A single external quote feed.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// `false` when a required credential is missing; the resolver skips the
    /// source instead of calling it.
    fn is_configured(&self) -> bool {
        true
    }

    /// Fetch the latest price. Sanity checks (positivity) are left to the
    /// resolver.
    async fn fetch(&self, asset_id: &str) -> Result<Decimal, PriceError>;
}

/// Read a price that may be encoded as a JSON string or number, including
/// scientific notation (`"1.5e-7"`).
pub(crate) fn decimal_from_json(value: &Value) -> Result<Decimal, PriceError> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Null => return Err(PriceError::NotListed),
        other => return Err(PriceError::Malformed(format!("price is not numeric: {}", other))),
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|e| PriceError::Malformed(format!("unparseable price {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn parses_strings_numbers_and_scientific() {
        assert_eq!(decimal_from_json(&json!("0.00123")).unwrap(), dec!(0.00123));
        assert_eq!(decimal_from_json(&json!(42.5)).unwrap(), dec!(42.5));
        assert_eq!(decimal_from_json(&json!("1.5e-7")).unwrap(), dec!(0.00000015));
    }

    #[test]
    fn rejects_non_numeric() {
        assert!(matches!(decimal_from_json(&Value::Null), Err(PriceError::NotListed)));
        assert!(matches!(
            decimal_from_json(&json!({"price": 1})),
            Err(PriceError::Malformed(_))
        ));
        assert!(matches!(decimal_from_json(&json!("n/a")), Err(PriceError::Malformed(_))));
    }
}
