// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Per-position polling loop.
//!
//! Each iteration checks the time limit, resolves a price, and either sleeps
//! (poll interval after a good price, backoff after a failed one) or hands the
//! position to the liquidator. Every sleep and lookup races the monitor's
//! cancellation token.

use crate::config::MonitorSettings;
use crate::error::{ConfigurationError, LiquidationError};
use crate::liquidation::Liquidator;
use crate::monitor::backoff::Backoff;
use crate::monitor::clock::Clock;
use crate::monitor::events::{panic_message, MonitorExit};
use crate::monitor::state::MonitorState;
use crate::position::{evaluate, ExitReason, PositionConfig, TriggerDecision};
use crate::pricing::{PriceResolution, PriceResolver};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

enum Step {
    /// Price in band; wait the poll interval.
    Hold,
    /// Lookup failed; wait this backoff delay instead of the poll interval.
    Retry(Duration),
    Exit(ExitReason),
    Fault(ConfigurationError),
    Cancelled,
}

pub struct PositionMonitor {
    config: Arc<PositionConfig>,
    resolver: Arc<PriceResolver>,
    liquidator: Arc<dyn Liquidator>,
    clock: Arc<dyn Clock>,
    settings: MonitorSettings,
    state: Arc<MonitorState>,
    cancel: CancellationToken,
    backoff: Backoff,
}

impl PositionMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<PositionConfig>,
        resolver: Arc<PriceResolver>,
        liquidator: Arc<dyn Liquidator>,
        clock: Arc<dyn Clock>,
        settings: MonitorSettings,
        state: Arc<MonitorState>,
        cancel: CancellationToken,
    ) -> Self {
        let backoff = Backoff::new(settings.backoff_floor, settings.backoff_ceiling);
        Self {
            config,
            resolver,
            liquidator,
            clock,
            settings,
            state,
            cancel,
            backoff,
        }
    }

    /// Run until an exit, a fault, or cancellation.
    pub async fn run(mut self) -> MonitorExit {
        info!(
            asset = %self.config.asset_id,
            entry = %self.config.entry_price,
            tp = %self.config.take_profit_price,
            sl = %self.config.stop_loss_price,
            max_secs = self.config.max_duration.as_secs(),
            "📊 Monitoring position"
        );

        loop {
            if self.cancel.is_cancelled() {
                return MonitorExit::Cancelled;
            }

            let pause = match self.step().await {
                Step::Hold => self.settings.poll_interval,
                Step::Retry(delay) => delay,
                Step::Exit(reason) => return self.liquidate(reason).await,
                Step::Fault(err) => {
                    error!(
                        asset = %self.config.asset_id,
                        "🚫 Configuration fault, monitor giving up without liquidation: {}", err
                    );
                    return MonitorExit::Faulted {
                        error: err.to_string(),
                    };
                }
                Step::Cancelled => return MonitorExit::Cancelled,
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return MonitorExit::Cancelled,
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    async fn step(&mut self) -> Step {
        let asset = self.config.asset_id.as_str();

        let elapsed = self.config.elapsed(self.clock.now());
        if elapsed > self.config.max_duration {
            info!(asset = %asset, elapsed_secs = elapsed.as_secs(), "⏰ Max hold time exceeded");
            return Step::Exit(ExitReason::TimeExpired);
        }

        let lookup = AssertUnwindSafe(self.resolver.resolve(asset)).catch_unwind();
        let lookup = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Step::Cancelled,
            result = lookup => result,
        };

        match lookup {
            Err(panic) => {
                error!(
                    asset = %asset,
                    "💥 Price lookup panicked, retrying next tick: {}",
                    panic_message(panic.as_ref())
                );
                Step::Hold
            }
            Ok(Err(err)) => Step::Fault(err),
            Ok(Ok(PriceResolution::Resolved { price, source })) => {
                self.backoff.reset();
                self.state.set_retry_count(0);

                let elapsed = self.config.elapsed(self.clock.now());
                match evaluate(price, &self.config, elapsed) {
                    TriggerDecision::Hold => {
                        debug!(asset = %asset, %price, source, "Holding");
                        Step::Hold
                    }
                    TriggerDecision::Exit(reason) => {
                        info!(asset = %asset, %price, source, %reason, "🔔 Exit triggered");
                        Step::Exit(reason)
                    }
                }
            }
            Ok(Ok(PriceResolution::Unavailable)) => {
                let delay = self.backoff.record_failure();
                let retries = self.backoff.failures();
                self.state.set_retry_count(retries);

                if retries >= self.settings.max_retries {
                    warn!(asset = %asset, retries, "⚠️ No price after max retries, forcing exit");
                    Step::Exit(ExitReason::DataUnavailable)
                } else {
                    warn!(
                        asset = %asset,
                        retries,
                        delay_ms = delay.as_millis() as u64,
                        "Price unavailable, backing off"
                    );
                    Step::Retry(delay)
                }
            }
        }
    }

    /// Hand off to the liquidator exactly once. Not cancellable: a stop
    /// request arriving now waits for the sell to finish.
    async fn liquidate(&self, reason: ExitReason) -> MonitorExit {
        let asset = self.config.asset_id.as_str();

        if !self.state.begin_liquidation() {
            info!(asset = %asset, %reason, "Stop claimed the monitor first, skipping liquidation");
            return MonitorExit::Cancelled;
        }

        info!(asset = %asset, %reason, "🔴 Liquidating position");

        let timeout = self.settings.liquidation_timeout;
        let call = AssertUnwindSafe(self.liquidator.liquidate_all(asset, reason)).catch_unwind();

        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(Ok(outcome))) => {
                info!(asset = %asset, %reason, "✅ Liquidation complete: {}", outcome);
                MonitorExit::Liquidated { reason, outcome }
            }
            Ok(Ok(Err(e))) => {
                error!(asset = %asset, %reason, "❌ LIQUIDATION FAILED: {}", e);
                MonitorExit::LiquidationFailed {
                    reason,
                    error: e.to_string(),
                }
            }
            Ok(Err(panic)) => {
                let msg = panic_message(panic.as_ref());
                error!(asset = %asset, %reason, "❌ LIQUIDATION PANICKED: {}", msg);
                MonitorExit::LiquidationFailed { reason, error: msg }
            }
            Err(_) => {
                let e = LiquidationError::Timeout(timeout.as_secs());
                error!(asset = %asset, %reason, "❌ LIQUIDATION FAILED: {}", e);
                MonitorExit::LiquidationFailed {
                    reason,
                    error: e.to_string(),
                }
            }
        }
    }
}
