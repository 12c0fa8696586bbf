// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Position monitoring: per-asset polling loops and their supervisor.

pub mod backoff;
pub mod clock;
pub mod events;
pub mod position_monitor;
pub mod state;
pub mod supervisor;

pub use backoff::Backoff;
pub use clock::{Clock, TokioClock};
pub use events::{MonitorEvent, MonitorExit};
pub use position_monitor::PositionMonitor;
pub use state::{MonitorPhase, MonitorState};
pub use supervisor::{MonitorSupervisor, PositionStatus};
