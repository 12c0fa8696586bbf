// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sell requests delegated to an external executor service.
//! Retries with escalating slippage before giving up.

use crate::error::LiquidationError;
use crate::liquidation::{LiquidationOutcome, Liquidator};
use crate::position::ExitReason;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Slippage ladder in basis points: normal, then the wider retry.
const SLIPPAGE_LADDER_BPS: [u32; 2] = [1500, 2500];

#[derive(Debug, Serialize)]
struct SellRequest<'a> {
    asset_id: &'a str,
    reason: ExitReason,
    slippage_bps: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum SellResponse {
    Sold { transaction: String },
    Empty,
    Failed { error: String },
}

pub struct HttpLiquidator {
    client: Client,
    endpoint: String,
}

impl HttpLiquidator {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base = base_url.into();
        Self {
            client,
            endpoint: format!("{}/liquidate", base.trim_end_matches('/')),
        }
    }

    async fn attempt(
        &self,
        asset_id: &str,
        reason: ExitReason,
        slippage_bps: u32,
    ) -> Result<LiquidationOutcome, LiquidationError> {
        let response: SellResponse = self
            .client
            .post(&self.endpoint)
            .json(&SellRequest {
                asset_id,
                reason,
                slippage_bps,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        interpret(response)
    }
}

fn interpret(response: SellResponse) -> Result<LiquidationOutcome, LiquidationError> {
    match response {
        SellResponse::Sold { transaction } => Ok(LiquidationOutcome::Sold {
            transaction_reference: transaction,
        }),
        SellResponse::Empty => Ok(LiquidationOutcome::NothingToSell),
        SellResponse::Failed { error } => Err(LiquidationError::Rejected(error)),
    }
}

#[async_trait]
impl Liquidator for HttpLiquidator {
    async fn liquidate_all(
        &self,
        asset_id: &str,
        reason: ExitReason,
    ) -> Result<LiquidationOutcome, LiquidationError> {
        let mut errors = Vec::new();
        for slippage_bps in SLIPPAGE_LADDER_BPS {
            match self.attempt(asset_id, reason, slippage_bps).await {
                Ok(outcome) => {
                    info!(asset = %asset_id, slippage_bps, "✅ Sell executed: {}", outcome);
                    return Ok(outcome);
                }
                Err(e) => {
                    warn!(asset = %asset_id, slippage_bps, "⚠️ Sell attempt failed: {}", e);
                    errors.push(format!("{}bps: {}", slippage_bps, e));
                }
            }
        }
        error!(asset = %asset_id, "❌ All sell attempts failed");
        Err(LiquidationError::Rejected(errors.join("; ")))
    }
}
