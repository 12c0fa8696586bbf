// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Ordered fallback across price sources.

use crate::config::MonitorSettings;
use crate::error::{ConfigurationError, PriceError};
use crate::pricing::{PriceSource, RateLimiter};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest asset identifier accepted (base58 mints are 32-44 chars).
const MAX_ASSET_ID_LEN: usize = 64;

/// Result of one resolution pass over all sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceResolution {
    Resolved { price: Decimal, source: &'static str },
    /// Every source failed or returned an unusable price.
    Unavailable,
}

/// Tries each configured source in priority order, each call gated by the
/// shared rate limiter and bounded by `timeout`.
pub struct PriceResolver {
    sources: Vec<Arc<dyn PriceSource>>,
    limiter: RateLimiter,
    timeout: Duration,
}

impl PriceResolver {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>, limiter: RateLimiter, timeout: Duration) -> Self {
        Self {
            sources,
            limiter,
            timeout,
        }
    }

    /// Build with a fresh limiter sized and timed from `settings`.
    pub fn with_settings(sources: Vec<Arc<dyn PriceSource>>, settings: &MonitorSettings) -> Self {
        Self::new(
            sources,
            RateLimiter::new(settings.rate_limit_permits),
            settings.price_timeout,
        )
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Resolve a price for `asset_id`.
    ///
    /// Expected failures collapse into [`PriceResolution::Unavailable`]; only
    /// misconfiguration is returned as an error.
    pub async fn resolve(&self, asset_id: &str) -> Result<PriceResolution, ConfigurationError> {
        validate_asset_id(asset_id)?;

        if self.sources.is_empty() {
            return Err(ConfigurationError::NoSources);
        }

        let mut attempted = 0usize;
        for source in &self.sources {
            if !source.is_configured() {
                debug!(source = source.name(), "Skipping price source without credential");
                continue;
            }
            attempted += 1;

            let call = tokio::time::timeout(self.timeout, source.fetch(asset_id));
            let outcome = match self.limiter.run(call).await {
                Ok(outcome) => outcome,
                Err(closed) => {
                    debug!(asset = %asset_id, "Price lookup skipped: {}", closed);
                    return Ok(PriceResolution::Unavailable);
                }
            };

            match outcome {
                Ok(Ok(price)) if price > Decimal::ZERO => {
                    return Ok(PriceResolution::Resolved {
                        price,
                        source: source.name(),
                    });
                }
                Ok(Ok(price)) => {
                    warn!(asset = %asset_id, source = source.name(), %price, "Ignoring non-positive price");
                }
                Ok(Err(PriceError::MissingCredential(name))) => {
                    attempted -= 1;
                    debug!(asset = %asset_id, source = name, "Price source reported missing credential");
                }
                Ok(Err(e)) => {
                    warn!(asset = %asset_id, source = source.name(), "Price source failed: {}", e);
                }
                Err(_) => {
                    warn!(
                        asset = %asset_id,
                        source = source.name(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Price source timed out"
                    );
                }
            }
        }

        if attempted == 0 {
            return Err(ConfigurationError::MissingCredentials(
                self.source_names().join(", "),
            ));
        }

        Ok(PriceResolution::Unavailable)
    }
}

/// Reject identifiers no source could possibly quote.
pub fn validate_asset_id(asset_id: &str) -> Result<(), ConfigurationError> {
    let invalid = |reason| ConfigurationError::InvalidAsset {
        asset: asset_id.to_string(),
        reason,
    };
    if asset_id.is_empty() {
        return Err(invalid("empty"));
    }
    if asset_id.len() > MAX_ASSET_ID_LEN {
        return Err(invalid("too long"));
    }
    if !asset_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid("contains non-alphanumeric characters"));
    }
    Ok(())
}
