// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Lifecycle phase shared between a monitor task and the supervisor.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MonitorPhase {
    Active = 0,
    Liquidating = 1,
    Stopped = 2,
}

impl MonitorPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => MonitorPhase::Active,
            1 => MonitorPhase::Liquidating,
            _ => MonitorPhase::Stopped,
        }
    }
}

impl fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MonitorPhase::Active => "active",
            MonitorPhase::Liquidating => "liquidating",
            MonitorPhase::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Phase only moves forward: Active -> Liquidating -> Stopped, or
/// Active -> Stopped. Both exits from Active are compare-and-swap so a stop
/// request and a trigger cannot both win.
#[derive(Debug)]
pub struct MonitorState {
    phase: AtomicU8,
    retry_count: AtomicU32,
}

impl MonitorState {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(MonitorPhase::Active as u8),
            retry_count: AtomicU32::new(0),
        }
    }

    pub fn phase(&self) -> MonitorPhase {
        MonitorPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Claim the single liquidation slot. `false` if already liquidating or
    /// stopped.
    pub fn begin_liquidation(&self) -> bool {
        self.transition(MonitorPhase::Active, MonitorPhase::Liquidating)
    }

    /// Stop an Active monitor before it can liquidate. `false` once a
    /// liquidation is underway.
    pub fn claim_stop(&self) -> bool {
        self.transition(MonitorPhase::Active, MonitorPhase::Stopped)
    }

    pub fn mark_stopped(&self) {
        self.phase.store(MonitorPhase::Stopped as u8, Ordering::SeqCst);
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::Relaxed)
    }

    pub fn set_retry_count(&self, n: u32) {
        self.retry_count.store(n, Ordering::Relaxed);
    }

    fn transition(&self, from: MonitorPhase, to: MonitorPhase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liquidation_slot_is_taken_once() {
        let s = MonitorState::new();
        assert!(s.begin_liquidation());
        assert!(!s.begin_liquidation());
        assert!(!s.claim_stop());
        assert_eq!(s.phase(), MonitorPhase::Liquidating);
    }

    #[test]
    fn stopped_is_terminal() {
        let s = MonitorState::new();
        assert!(s.claim_stop());
        assert!(!s.begin_liquidation());
        assert!(!s.claim_stop());
        s.mark_stopped();
        assert_eq!(s.phase(), MonitorPhase::Stopped);
    }
}
