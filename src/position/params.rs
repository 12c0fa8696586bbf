// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Immutable per-position thresholds.

use crate::error::MonitorError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::time::Instant;

/// Supply assumed when a position is opened by market cap instead of price.
pub const DEFAULT_ASSUMED_SUPPLY: u64 = 1_000_000_000;

/// Default maximum holding time (30 minutes).
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(1800);

/// Exit parameters applied to an entry price.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionParams {
    /// Take-profit price as a multiple of entry (must be > 1).
    pub take_profit_multiplier: Decimal,
    /// Stop-loss price as a multiple of entry (must be in (0, 1)).
    pub stop_loss_multiplier: Decimal,
    /// Maximum holding duration.
    pub max_duration: Duration,
}

impl Default for PositionParams {
    fn default() -> Self {
        Self {
            take_profit_multiplier: Decimal::new(12, 1),
            stop_loss_multiplier: Decimal::new(9, 1),
            max_duration: DEFAULT_MAX_DURATION,
        }
    }
}

/// One monitored position. Never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionConfig {
    pub asset_id: String,
    pub entry_price: Decimal,
    pub take_profit_price: Decimal,
    pub stop_loss_price: Decimal,
    /// Monotonic start, used for every elapsed-time decision.
    pub start_time: Instant,
    /// Wall-clock start, for display only.
    pub opened_at: DateTime<Utc>,
    pub max_duration: Duration,
}

impl PositionConfig {
    /// Derive thresholds from `entry_price`, rejecting anything that breaks
    /// `stop_loss < entry < take_profit`.
    pub fn new(
        asset_id: impl Into<String>,
        entry_price: Decimal,
        params: &PositionParams,
        start_time: Instant,
    ) -> Result<Self, MonitorError> {
        let asset_id = asset_id.into();
        let invalid = |reason: String| MonitorError::InvalidPosition {
            asset: asset_id.clone(),
            reason,
        };

        if asset_id.trim().is_empty() {
            return Err(invalid("asset id is empty".to_string()));
        }
        if entry_price <= Decimal::ZERO {
            return Err(invalid(format!("entry price {} is not positive", entry_price)));
        }
        if params.max_duration.is_zero() {
            return Err(invalid("max duration is zero".to_string()));
        }
        if params.stop_loss_multiplier <= Decimal::ZERO {
            return Err(invalid(format!(
                "stop-loss multiplier {} is not positive",
                params.stop_loss_multiplier
            )));
        }

        let (Some(take_profit_price), Some(stop_loss_price)) = (
            entry_price.checked_mul(params.take_profit_multiplier),
            entry_price.checked_mul(params.stop_loss_multiplier),
        ) else {
            return Err(invalid(format!(
                "thresholds overflow for entry price {}",
                entry_price
            )));
        };

        if !(stop_loss_price < entry_price && entry_price < take_profit_price) {
            return Err(invalid(format!(
                "thresholds out of order: sl={} entry={} tp={}",
                stop_loss_price, entry_price, take_profit_price
            )));
        }

        Ok(Self {
            asset_id,
            entry_price,
            take_profit_price,
            stop_loss_price,
            start_time,
            opened_at: Utc::now(),
            max_duration: params.max_duration,
        })
    }

    /// Open a position from an entry market cap, pricing it over `supply`.
    pub fn from_market_cap(
        asset_id: impl Into<String>,
        entry_market_cap: Decimal,
        supply: Decimal,
        params: &PositionParams,
        start_time: Instant,
    ) -> Result<Self, MonitorError> {
        let asset_id = asset_id.into();
        if supply <= Decimal::ZERO {
            return Err(MonitorError::InvalidPosition {
                asset: asset_id,
                reason: format!("assumed supply {} is not positive", supply),
            });
        }
        let Some(entry_price) = entry_market_cap.checked_div(supply) else {
            return Err(MonitorError::InvalidPosition {
                asset: asset_id,
                reason: format!("market cap {} over supply {} overflows", entry_market_cap, supply),
            });
        };
        Self::new(asset_id, entry_price, params, start_time)
    }

    /// Time held so far, measured against a monotonic `now`.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start_time)
    }
}
