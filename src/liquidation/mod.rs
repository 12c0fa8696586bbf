// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Liquidation boundary - the monitor hands off here and never retries.

pub mod dry_run;
pub mod http;

pub use dry_run::DryRunLiquidator;
pub use http::HttpLiquidator;

use crate::error::LiquidationError;
use crate::position::ExitReason;
use async_trait::async_trait;
use std::fmt;

/// Successful end of a liquidation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiquidationOutcome {
    Sold { transaction_reference: String },
    /// No balance was left; counts as success.
    NothingToSell,
}

impl fmt::Display for LiquidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiquidationOutcome::Sold {
                transaction_reference,
            } => write!(f, "sold ({})", transaction_reference),
            LiquidationOutcome::NothingToSell => f.write_str("nothing to sell"),
        }
    }
}

/// Sells the whole holding of an asset.
#[async_trait]
pub trait Liquidator: Send + Sync {
    async fn liquidate_all(
        &self,
        asset_id: &str,
        reason: ExitReason,
    ) -> Result<LiquidationOutcome, LiquidationError>;
}
