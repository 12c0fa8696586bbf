// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Birdeye public API - secondary aggregator, needs `X-API-KEY`.

use crate::error::PriceError;
use crate::pricing::{decimal_from_json, PriceSource};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_BIRDEYE_URL: &str = "https://public-api.birdeye.so";

pub struct BirdeyeSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl BirdeyeSource {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }
}

#[async_trait]
impl PriceSource for BirdeyeSource {
    fn name(&self) -> &'static str {
        "birdeye"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch(&self, asset_id: &str) -> Result<Decimal, PriceError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(PriceError::MissingCredential("birdeye"))?;

        let body: Value = self
            .client
            .get(format!("{}/defi/price", self.base_url))
            .query(&[("address", asset_id)])
            .header("X-API-KEY", key)
            .header("x-chain", "solana")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let price = parse_price(&body)?;
        debug!(asset = %asset_id, %price, "Birdeye quote");
        Ok(price)
    }
}

/// `{"success": true, "data": {"value": 0.0123, "updateUnixTime": ...}}`
fn parse_price(body: &Value) -> Result<Decimal, PriceError> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let msg = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("request unsuccessful");
        return Err(PriceError::Malformed(msg.to_string()));
    }
    let value = body
        .get("data")
        .and_then(|d| d.get("value"))
        .unwrap_or(&Value::Null);
    decimal_from_json(value)
}
