// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Error types shared across the exit engine.

use thiserror::Error;

/// Failure of a single price source. Always recoverable by falling back.
#[derive(Debug, Error)]
pub enum PriceError {
    /// Transport-level failure (DNS, connect, TLS, body read).
    #[error("http error: {0}")]
    Http(String),

    /// Non-success status, including quota exhaustion (429).
    #[error("unexpected status {0}")]
    Status(u16),

    /// Payload did not have the expected shape.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The source has no quote for this asset.
    #[error("asset not listed")]
    NotListed,

    /// The source needs a credential that was never configured.
    #[error("missing credential for {0}")]
    MissingCredential(&'static str),
}

impl From<reqwest::Error> for PriceError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => PriceError::Status(status.as_u16()),
            None => PriceError::Http(e.to_string()),
        }
    }
}

/// Misconfiguration detected while resolving a price. Fatal for the monitor
/// that hit it and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("no price sources configured")]
    NoSources,

    #[error("no price source has its credential configured (checked: {0})")]
    MissingCredentials(String),

    #[error("invalid asset identifier {asset:?}: {reason}")]
    InvalidAsset { asset: String, reason: &'static str },
}

/// Errors surfaced by the supervisor control surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// A monitor for this asset is already registered.
    #[error("already monitoring {0}")]
    AlreadyMonitoring(String),

    /// Thresholds or parameters violate `stop_loss < entry < take_profit`.
    #[error("invalid position for {asset}: {reason}")]
    InvalidPosition { asset: String, reason: String },

    /// `stop_all` already tore the supervisor down.
    #[error("supervisor is shut down")]
    ShutDown,
}

/// Failure reported by a liquidator adapter.
#[derive(Debug, Error)]
pub enum LiquidationError {
    #[error("liquidation request failed: {0}")]
    Request(String),

    #[error("liquidation rejected: {0}")]
    Rejected(String),

    #[error("liquidation timed out after {0}s")]
    Timeout(u64),
}

impl From<reqwest::Error> for LiquidationError {
    fn from(e: reqwest::Error) -> Self {
        LiquidationError::Request(e.to_string())
    }
}
