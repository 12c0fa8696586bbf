// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Moralis Solana gateway - last-resort source, needs `X-API-Key`.

use crate::error::PriceError;
use crate::pricing::{decimal_from_json, PriceSource};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;

pub const DEFAULT_MORALIS_URL: &str = "https://solana-gateway.moralis.io";

pub struct MoralisSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl MoralisSource {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }
}

#[async_trait]
impl PriceSource for MoralisSource {
    fn name(&self) -> &'static str {
        "moralis"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch(&self, asset_id: &str) -> Result<Decimal, PriceError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(PriceError::MissingCredential("moralis"))?;

        let body: Value = self
            .client
            .get(format!("{}/token/mainnet/{}/price", self.base_url, asset_id))
            .header("X-API-Key", key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        decimal_from_json(body.get("usdPrice").unwrap_or(&Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn usd_price_field() {
        let body = json!({ "tokenAddress": "MINT", "usdPrice": 0.0001, "exchangeName": "Raydium" });
        let price = decimal_from_json(body.get("usdPrice").unwrap()).unwrap();
        assert_eq!(price, dec!(0.0001));
    }

    #[test]
    fn without_key_is_unconfigured() {
        assert!(!MoralisSource::new(Client::new(), DEFAULT_MORALIS_URL, None).is_configured());
    }
}
