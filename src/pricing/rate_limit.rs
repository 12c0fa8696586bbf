// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Process-wide cap on concurrent outbound price queries.
//!
//! Permits are only ever held inside [`RateLimiter::run`], so a permit is
//! returned when the guarded future completes, fails, or is dropped mid-flight.

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Default number of concurrent price queries (free-tier aggregator quota).
pub const DEFAULT_PRICE_PERMITS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rate limiter closed")]
pub struct RateLimiterClosed;

/// Cloneable handle to a shared permit pool.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl RateLimiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a permit, drive `fut` to completion, then release the permit.
    ///
    /// Waiters are served in FIFO order.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, RateLimiterClosed>
    where
        F: Future,
    {
        let _permit = self.permits.acquire().await.map_err(|_| RateLimiterClosed)?;
        Ok(fut.await)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    /// Refuse all future acquisitions and wake current waiters with an error.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_PRICE_PERMITS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_capacity() {
        let limiter = RateLimiter::new(3);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            tasks.push(tokio::spawn(async move {
                limiter
                    .run(async {
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        current.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(limiter.available(), 3);
    }

    #[tokio::test]
    async fn releases_permit_when_guarded_call_fails() {
        let limiter = RateLimiter::new(1);
        let out: Result<Result<(), &str>, _> = limiter.run(async { Err("boom") }).await;
        assert_eq!(out.unwrap(), Err("boom"));
        assert_eq!(limiter.available(), 1);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn releases_permit_when_cancelled() {
        let limiter = RateLimiter::new(1);
        let held = limiter.clone();
        let task = tokio::spawn(async move {
            held.run(std::future::pending::<()>()).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(limiter.in_flight(), 1);

        task.abort();
        let _ = task.await;
        assert_eq!(limiter.available(), 1);

        let waited = tokio::time::timeout(Duration::from_secs(1), limiter.run(async { 7 })).await;
        assert_eq!(waited.unwrap().unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_waiter_does_not_leak() {
        let limiter = RateLimiter::new(1);
        let held = limiter.clone();
        let holder = tokio::spawn(async move {
            held.run(tokio::time::sleep(Duration::from_secs(5))).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(1)).await;

        let gave_up = tokio::time::timeout(Duration::from_secs(1), limiter.run(async {})).await;
        assert!(gave_up.is_err());

        holder.await.unwrap();
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test]
    async fn closed_limiter_rejects_callers() {
        let limiter = RateLimiter::new(2);
        limiter.close();
        assert!(limiter.is_closed());
        assert_eq!(limiter.run(async { 1 }).await, Err(RateLimiterClosed));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(RateLimiter::new(0).capacity(), 1);
        assert_eq!(RateLimiter::default().capacity(), DEFAULT_PRICE_PERMITS);
    }
}
