// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Monitor lifecycle events broadcast by the supervisor.

use crate::liquidation::LiquidationOutcome;
use crate::position::ExitReason;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::any::Any;
use std::fmt;

/// How a monitor ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorExit {
    Liquidated {
        reason: ExitReason,
        outcome: LiquidationOutcome,
    },
    /// The liquidator was called and failed; not retried.
    LiquidationFailed { reason: ExitReason, error: String },
    /// Configuration fault or panic; no liquidation was attempted.
    Faulted { error: String },
    /// Stopped on request before any exit triggered.
    Cancelled,
}

impl MonitorExit {
    pub fn reason(&self) -> Option<ExitReason> {
        match self {
            MonitorExit::Liquidated { reason, .. } | MonitorExit::LiquidationFailed { reason, .. } => {
                Some(*reason)
            }
            MonitorExit::Faulted { .. } | MonitorExit::Cancelled => None,
        }
    }
}

impl fmt::Display for MonitorExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorExit::Liquidated { reason, outcome } => write!(f, "{} exit, {}", reason, outcome),
            MonitorExit::LiquidationFailed { reason, error } => {
                write!(f, "{} exit, liquidation FAILED: {}", reason, error)
            }
            MonitorExit::Faulted { error } => write!(f, "fault: {}", error),
            MonitorExit::Cancelled => f.write_str("stopped on request"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    Started {
        asset_id: String,
        entry_price: Decimal,
        take_profit_price: Decimal,
        stop_loss_price: Decimal,
        opened_at: DateTime<Utc>,
    },
    Stopped {
        asset_id: String,
        exit: MonitorExit,
    },
}

impl MonitorEvent {
    pub fn asset_id(&self) -> &str {
        match self {
            MonitorEvent::Started { asset_id, .. } | MonitorEvent::Stopped { asset_id, .. } => asset_id,
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
