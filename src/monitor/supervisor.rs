// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Registry of running position monitors.
//!
//! At most one monitor runs per asset. Entries are inserted only by `start`
//! and removed by `stop`, `stop_all`, or the monitor's own exit, always under
//! the registry write lock. Each entry carries a generation id so a finishing
//! task never removes a newer monitor for the same asset.

use crate::config::MonitorSettings;
use crate::error::MonitorError;
use crate::liquidation::Liquidator;
use crate::monitor::clock::{Clock, TokioClock};
use crate::monitor::events::{panic_message, MonitorEvent, MonitorExit};
use crate::monitor::position_monitor::PositionMonitor;
use crate::monitor::state::{MonitorPhase, MonitorState};
use crate::position::{PositionConfig, PositionParams};
use crate::pricing::{validate_asset_id, PriceResolver};
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct Entry {
    id: u64,
    config: Arc<PositionConfig>,
    state: Arc<MonitorState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Point-in-time view of one registered monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionStatus {
    pub asset_id: String,
    pub entry_price: Decimal,
    pub take_profit_price: Decimal,
    pub stop_loss_price: Decimal,
    pub phase: MonitorPhase,
    pub retry_count: u32,
    pub opened_at: DateTime<Utc>,
    pub elapsed: Duration,
}

struct Inner {
    registry: RwLock<HashMap<String, Entry>>,
    resolver: Arc<PriceResolver>,
    liquidator: Arc<dyn Liquidator>,
    clock: Arc<dyn Clock>,
    settings: MonitorSettings,
    /// Parent of every monitor's token.
    shutdown: CancellationToken,
    /// Cancelled once `stop_all` has awaited every task.
    drained: CancellationToken,
    closing: AtomicBool,
    next_id: AtomicU64,
    events: broadcast::Sender<MonitorEvent>,
}

/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct MonitorSupervisor {
    inner: Arc<Inner>,
}

impl MonitorSupervisor {
    pub fn new(
        resolver: Arc<PriceResolver>,
        liquidator: Arc<dyn Liquidator>,
        settings: MonitorSettings,
    ) -> Self {
        Self::with_clock(resolver, liquidator, settings, Arc::new(TokioClock))
    }

    pub fn with_clock(
        resolver: Arc<PriceResolver>,
        liquidator: Arc<dyn Liquidator>,
        settings: MonitorSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(HashMap::new()),
                resolver,
                liquidator,
                clock,
                settings,
                shutdown: CancellationToken::new(),
                drained: CancellationToken::new(),
                closing: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
                events,
            }),
        }
    }

    /// Derive a position from `entry_price` and `params`, starting now.
    pub async fn start_monitoring(
        &self,
        asset_id: &str,
        entry_price: Decimal,
        params: &PositionParams,
    ) -> Result<(), MonitorError> {
        let config = PositionConfig::new(asset_id, entry_price, params, self.inner.clock.now())?;
        self.start(config).await
    }

    /// Register `config` and spawn its monitor.
    pub async fn start(&self, config: PositionConfig) -> Result<(), MonitorError> {
        let asset = config.asset_id.clone();

        if let Err(e) = validate_asset_id(&asset) {
            warn!(asset = %asset, "Refusing to monitor: {}", e);
            return Err(MonitorError::InvalidPosition {
                asset,
                reason: e.to_string(),
            });
        }

        if self.is_shut_down() {
            warn!(asset = %asset, "Supervisor is shut down, not starting monitor");
            return Err(MonitorError::ShutDown);
        }

        let mut registry = self.inner.registry.write().await;

        // stop_all may have drained while we waited for the lock.
        if self.is_shut_down() {
            warn!(asset = %asset, "Supervisor is shut down, not starting monitor");
            return Err(MonitorError::ShutDown);
        }
        if registry.contains_key(&asset) {
            warn!(asset = %asset, "⚠️ Already monitoring, ignoring duplicate start");
            return Err(MonitorError::AlreadyMonitoring(asset));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let config = Arc::new(config);
        let state = Arc::new(MonitorState::new());
        let cancel = self.inner.shutdown.child_token();

        let monitor = PositionMonitor::new(
            config.clone(),
            self.inner.resolver.clone(),
            self.inner.liquidator.clone(),
            self.inner.clock.clone(),
            self.inner.settings.clone(),
            state.clone(),
            cancel.clone(),
        );

        let supervisor = self.clone();
        let task_asset = asset.clone();
        let task_state = state.clone();
        let task = tokio::spawn(async move {
            let exit = match AssertUnwindSafe(monitor.run()).catch_unwind().await {
                Ok(exit) => exit,
                Err(panic) => MonitorExit::Faulted {
                    error: format!("monitor panicked: {}", panic_message(panic.as_ref())),
                },
            };
            supervisor.finish(&task_asset, id, &task_state, exit).await;
        });

        let _ = self.inner.events.send(MonitorEvent::Started {
            asset_id: asset.clone(),
            entry_price: config.entry_price,
            take_profit_price: config.take_profit_price,
            stop_loss_price: config.stop_loss_price,
            opened_at: config.opened_at,
        });

        registry.insert(
            asset,
            Entry {
                id,
                config,
                state,
                cancel,
                task,
            },
        );

        Ok(())
    }

    /// Stop monitoring `asset_id`. Returns `false` if nothing was registered.
    ///
    /// A monitor that is already liquidating is left to finish its sell; the
    /// request is recorded and the entry is removed when the sell returns.
    pub async fn stop(&self, asset_id: &str) -> bool {
        let mut registry = self.inner.registry.write().await;

        let Some(entry) = registry.get(asset_id) else {
            info!(asset = %asset_id, "Stop requested for unmonitored asset, nothing to do");
            return false;
        };

        if !entry.state.claim_stop() {
            entry.cancel.cancel();
            info!(
                asset = %asset_id,
                phase = %entry.state.phase(),
                "Stop requested mid-liquidation, monitor will exit after the sell"
            );
            return true;
        }

        let Some(entry) = registry.remove(asset_id) else {
            return false;
        };
        let emptied = registry.is_empty();
        drop(registry);

        entry.cancel.cancel();
        info!(asset = %asset_id, "🛑 Stopping monitor");
        if let Err(e) = entry.task.await {
            error!(asset = %asset_id, "Monitor task did not exit cleanly: {}", e);
        }

        if emptied && self.inner.settings.stop_all_when_empty {
            info!("Registry empty, shutting down supervisor");
            self.stop_all().await;
        }
        true
    }

    /// Cancel every monitor, close the rate limiter, and wait for all tasks
    /// to exit. Further `start` calls fail with [`MonitorError::ShutDown`].
    pub async fn stop_all(&self) {
        if self.inner.closing.swap(true, Ordering::SeqCst) {
            self.inner.drained.cancelled().await;
            return;
        }

        let entries: Vec<(String, Entry)> = {
            let mut registry = self.inner.registry.write().await;
            registry.drain().collect()
        };

        info!(count = entries.len(), "🛑 Stopping all monitors");

        for (_, entry) in &entries {
            // Mid-liquidation monitors keep their phase and finish the sell.
            entry.state.claim_stop();
        }
        self.inner.shutdown.cancel();
        self.inner.resolver.limiter().close();

        for (asset, entry) in entries {
            if let Err(e) = entry.task.await {
                error!(asset = %asset, "Monitor task did not exit cleanly: {}", e);
            }
        }

        self.inner.drained.cancel();
        info!("✅ All monitors stopped");
    }

    /// Resolves once `stop_all` has completed.
    pub async fn wait_for_shutdown(&self) {
        self.inner.drained.cancelled().await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.closing.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.events.subscribe()
    }

    pub async fn is_monitoring(&self, asset_id: &str) -> bool {
        self.inner.registry.read().await.contains_key(asset_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.registry.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.registry.read().await.is_empty()
    }

    /// Registered monitors, sorted by asset id.
    pub async fn snapshot(&self) -> Vec<PositionStatus> {
        let now = self.inner.clock.now();
        let registry = self.inner.registry.read().await;
        let mut statuses: Vec<PositionStatus> = registry
            .values()
            .map(|e| PositionStatus {
                asset_id: e.config.asset_id.clone(),
                entry_price: e.config.entry_price,
                take_profit_price: e.config.take_profit_price,
                stop_loss_price: e.config.stop_loss_price,
                phase: e.state.phase(),
                retry_count: e.state.retry_count(),
                opened_at: e.config.opened_at,
                elapsed: e.config.elapsed(now),
            })
            .collect();
        statuses.sort_by(|a, b| a.asset_id.cmp(&b.asset_id));
        statuses
    }

    /// Called from the monitor's own task once `run` returns.
    async fn finish(&self, asset: &str, id: u64, state: &MonitorState, exit: MonitorExit) {
        let emptied = {
            let mut registry = self.inner.registry.write().await;
            let ours = registry.get(asset).is_some_and(|e| e.id == id);
            if ours {
                registry.remove(asset);
            }
            ours && registry.is_empty()
        };
        state.mark_stopped();

        match &exit {
            MonitorExit::Liquidated { .. } | MonitorExit::Cancelled => {
                info!(asset = %asset, "⏹️ Monitor stopped: {}", exit)
            }
            MonitorExit::LiquidationFailed { .. } | MonitorExit::Faulted { .. } => {
                error!(asset = %asset, "⏹️ Monitor stopped: {}", exit)
            }
        }

        let _ = self.inner.events.send(MonitorEvent::Stopped {
            asset_id: asset.to_string(),
            exit,
        });

        if emptied && self.inner.settings.stop_all_when_empty {
            info!("Registry empty, shutting down supervisor");
            self.stop_all().await;
        }
    }
}
