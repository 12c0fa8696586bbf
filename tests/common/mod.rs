// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tentwenty_bot::config::MonitorSettings;
use tentwenty_bot::error::{LiquidationError, PriceError};
use tentwenty_bot::liquidation::{LiquidationOutcome, Liquidator};
use tentwenty_bot::monitor::{MonitorEvent, MonitorExit, MonitorSupervisor};
use tentwenty_bot::position::ExitReason;
use tentwenty_bot::pricing::{PriceResolver, PriceSource, RateLimiter};
use tokio::sync::{broadcast, Notify};

/// One scripted answer from a price source.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Price(Decimal),
    Fail,
    Panic,
    /// Never answers; only a timeout or cancellation ends the call.
    Hang,
}

/// Plays `replies` in order, then repeats the last one forever.
pub struct ScriptedSource {
    name: &'static str,
    replies: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(name: &'static str, replies: Vec<Reply>) -> Arc<Self> {
        assert!(!replies.is_empty(), "script needs at least one reply");
        Arc::new(Self {
            name,
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn prices(values: &[Decimal]) -> Arc<Self> {
        Self::new("scripted", values.iter().copied().map(Reply::Price).collect())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Reply {
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            *replies.front().unwrap()
        }
    }
}

#[async_trait]
impl PriceSource for ScriptedSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, _asset_id: &str) -> Result<Decimal, PriceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_reply() {
            Reply::Price(p) => Ok(p),
            Reply::Fail => Err(PriceError::Status(503)),
            Reply::Panic => panic!("scripted source exploded"),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Source that never has a credential.
pub struct UnkeyedSource;

#[async_trait]
impl PriceSource for UnkeyedSource {
    fn name(&self) -> &'static str {
        "unkeyed"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn fetch(&self, _asset_id: &str) -> Result<Decimal, PriceError> {
        Err(PriceError::MissingCredential("unkeyed"))
    }
}

/// Holds each call for `latency` and records the highest concurrency seen.
pub struct ConcurrencyGauge {
    latency: Duration,
    price: Decimal,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn new(latency: Duration, price: Decimal) -> Arc<Self> {
        Arc::new(Self {
            latency,
            price,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for ConcurrencyGauge {
    fn name(&self) -> &'static str {
        "gauge"
    }

    async fn fetch(&self, _asset_id: &str) -> Result<Decimal, PriceError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.price)
    }
}

/// Records every liquidation request.
pub struct RecordingLiquidator {
    calls: Mutex<Vec<(String, ExitReason)>>,
    fail: bool,
    latency: Duration,
    pub entered: Notify,
}

impl RecordingLiquidator {
    pub fn new() -> Arc<Self> {
        Self::build(false, Duration::ZERO)
    }

    pub fn failing() -> Arc<Self> {
        Self::build(true, Duration::ZERO)
    }

    pub fn slow(latency: Duration) -> Arc<Self> {
        Self::build(false, latency)
    }

    fn build(fail: bool, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail,
            latency,
            entered: Notify::new(),
        })
    }

    pub fn calls(&self) -> Vec<(String, ExitReason)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Liquidator for RecordingLiquidator {
    async fn liquidate_all(
        &self,
        asset_id: &str,
        reason: ExitReason,
    ) -> Result<LiquidationOutcome, LiquidationError> {
        self.calls.lock().unwrap().push((asset_id.to_string(), reason));
        self.entered.notify_one();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail {
            Err(LiquidationError::Rejected("no route".into()))
        } else {
            Ok(LiquidationOutcome::Sold {
                transaction_reference: format!("tx-{}", asset_id),
            })
        }
    }
}

pub fn resolver(sources: Vec<Arc<dyn PriceSource>>, settings: &MonitorSettings) -> Arc<PriceResolver> {
    Arc::new(PriceResolver::new(
        sources,
        RateLimiter::new(settings.rate_limit_permits),
        settings.price_timeout,
    ))
}

pub fn supervisor(
    source: Arc<dyn PriceSource>,
    liquidator: Arc<RecordingLiquidator>,
    settings: MonitorSettings,
) -> MonitorSupervisor {
    MonitorSupervisor::new(resolver(vec![source], &settings), liquidator, settings)
}

/// Wait for the terminal event of `asset`.
pub async fn stopped(events: &mut broadcast::Receiver<MonitorEvent>, asset: &str) -> MonitorExit {
    loop {
        match events.recv().await {
            Ok(event) if event.asset_id() != asset => continue,
            Ok(MonitorEvent::Stopped { exit, .. }) => return exit,
            Ok(MonitorEvent::Started { .. }) => continue,
            Err(e) => panic!("event stream ended before {} stopped: {}", asset, e),
        }
    }
}
