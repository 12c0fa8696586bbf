// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Position thresholds and exit triggers.

pub mod params;
pub mod trigger;

pub use params::{PositionConfig, PositionParams, DEFAULT_ASSUMED_SUPPLY, DEFAULT_MAX_DURATION};
pub use trigger::{evaluate, ExitReason, TriggerDecision};
