// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Exponential backoff between failed price lookups.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    next: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        let floor = floor.min(ceiling);
        Self {
            floor,
            ceiling,
            next: floor,
            failures: 0,
        }
    }

    /// Count a failure and return how long to wait before the next attempt.
    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = self.next;
        self.next = self
            .next
            .checked_mul(2)
            .map_or(self.ceiling, |d| d.min(self.ceiling));
        delay
    }

    /// Back to the floor after a successful lookup.
    pub fn reset(&mut self) {
        self.failures = 0;
        self.next = self.floor;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay the next failure would return.
    pub fn current_delay(&self) -> Duration {
        self.next
    }
}
