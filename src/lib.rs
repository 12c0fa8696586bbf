// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Position exit engine: watches open positions and liquidates them on
//! take-profit, stop-loss, time limit, or loss of price data.

pub mod config;
pub mod error;
pub mod liquidation;
pub mod monitor;
pub mod position;
pub mod pricing;
pub mod telegram;

pub use config::{Config, MonitorSettings};
pub use error::{ConfigurationError, LiquidationError, MonitorError, PriceError};
pub use monitor::{MonitorEvent, MonitorExit, MonitorSupervisor};
pub use position::{ExitReason, PositionConfig, PositionParams};
pub use pricing::{PriceResolver, PriceSource, RateLimiter};
