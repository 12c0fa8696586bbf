// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Paper liquidator: logs the sell it would have sent.

use crate::error::LiquidationError;
use crate::liquidation::{LiquidationOutcome, Liquidator};
use crate::position::ExitReason;
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunLiquidator;

#[async_trait]
impl Liquidator for DryRunLiquidator {
    async fn liquidate_all(
        &self,
        asset_id: &str,
        reason: ExitReason,
    ) -> Result<LiquidationOutcome, LiquidationError> {
        info!(asset = %asset_id, %reason, "🧪 DRY RUN: would sell entire position");
        Ok(LiquidationOutcome::Sold {
            transaction_reference: format!("dry-run-{}", asset_id),
        })
    }
}
