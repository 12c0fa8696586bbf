// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Jupiter Price API v2 - primary aggregator, no key required.

use crate::error::PriceError;
use crate::pricing::{decimal_from_json, PriceSource};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_JUPITER_URL: &str = "https://api.jup.ag";

pub struct JupiterSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    vs_token: Option<String>,
}

impl JupiterSource {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        vs_token: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            vs_token,
        }
    }
}

#[async_trait]
impl PriceSource for JupiterSource {
    fn name(&self) -> &'static str {
        "jupiter"
    }

    async fn fetch(&self, asset_id: &str) -> Result<Decimal, PriceError> {
        let mut query = vec![("ids", asset_id)];
        if let Some(vs) = &self.vs_token {
            query.push(("vsToken", vs.as_str()));
        }

        let mut request = self
            .client
            .get(format!("{}/price/v2", self.base_url))
            .query(&query);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let body: Value = request.send().await?.error_for_status()?.json().await?;
        let price = parse_price(&body, asset_id)?;
        debug!(asset = %asset_id, %price, "Jupiter quote");
        Ok(price)
    }
}

/// `{"data": {"<mint>": {"id": "<mint>", "price": "0.0123"}}}`; unknown
/// mints come back as `null`.
fn parse_price(body: &Value, asset_id: &str) -> Result<Decimal, PriceError> {
    let data = body
        .get("data")
        .ok_or_else(|| PriceError::Malformed("missing data".to_string()))?;
    match data.get(asset_id) {
        None | Some(Value::Null) => Err(PriceError::NotListed),
        Some(entry) => decimal_from_json(entry.get("price").unwrap_or(&Value::Null)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn reads_price_for_requested_mint() {
        let body = json!({
            "data": { "MINT": { "id": "MINT", "type": "derivedPrice", "price": "0.0042" } },
            "timeTaken": 0.003
        });
        assert_eq!(parse_price(&body, "MINT").unwrap(), dec!(0.0042));
    }

    #[test]
    fn unknown_mint_is_not_listed() {
        let body = json!({ "data": { "MINT": null } });
        assert!(matches!(parse_price(&body, "MINT"), Err(PriceError::NotListed)));
        assert!(matches!(parse_price(&body, "OTHER"), Err(PriceError::NotListed)));
    }

    #[test]
    fn missing_data_is_malformed() {
        let body = json!({ "error": "rate limited" });
        assert!(matches!(parse_price(&body, "MINT"), Err(PriceError::Malformed(_))));
    }
}
