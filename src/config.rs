// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration module - engine defaults and environment loading.

use crate::position::{PositionParams, DEFAULT_ASSUMED_SUPPLY, DEFAULT_MAX_DURATION};
use crate::pricing::birdeye::DEFAULT_BIRDEYE_URL;
use crate::pricing::jupiter::DEFAULT_JUPITER_URL;
use crate::pricing::moralis::DEFAULT_MORALIS_URL;
use crate::pricing::DEFAULT_PRICE_PERMITS;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

/// Engine timing and retry knobs. Every duration is a `Duration`; defaults
/// are listed on the `Default` impl and nowhere else.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    /// Sleep between successful price checks.
    pub poll_interval: Duration,
    /// Consecutive unavailable lookups before a forced exit.
    pub max_retries: u32,
    /// First backoff delay after a failed lookup.
    pub backoff_floor: Duration,
    /// Backoff never grows past this.
    pub backoff_ceiling: Duration,
    /// Per-source request timeout.
    pub price_timeout: Duration,
    /// Concurrent outbound price queries across all monitors.
    pub rate_limit_permits: usize,
    /// Upper bound on one liquidator call.
    pub liquidation_timeout: Duration,
    /// Tear the supervisor down once its last monitor stops.
    pub stop_all_when_empty: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_retries: 3,
            backoff_floor: Duration::from_secs(1),
            backoff_ceiling: Duration::from_secs(60),
            price_timeout: Duration::from_secs(10),
            rate_limit_permits: DEFAULT_PRICE_PERMITS,
            liquidation_timeout: Duration::from_secs(120),
            stop_all_when_empty: false,
        }
    }
}

/// Full process configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    // Price sources
    pub jupiter_url: String,
    pub jupiter_api_key: Option<String>,
    pub jupiter_vs_token: Option<String>,
    pub birdeye_url: String,
    pub birdeye_api_key: Option<String>,
    pub moralis_url: String,
    pub moralis_api_key: Option<String>,

    // Engine
    pub monitor: MonitorSettings,

    // Position defaults
    pub position: PositionParams,
    pub assumed_supply: Decimal,

    // Collaborators
    pub liquidator_url: Option<String>,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    // Logging
    pub log_file: Option<String>,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let defaults = MonitorSettings::default();
        let position_defaults = PositionParams::default();

        let backoff_floor = Duration::from_secs(parse_or(
            "BACKOFF_FLOOR_SECS",
            defaults.backoff_floor.as_secs(),
        )?);
        let backoff_ceiling = Duration::from_secs(parse_or(
            "BACKOFF_CEILING_SECS",
            defaults.backoff_ceiling.as_secs(),
        )?);
        if backoff_floor.is_zero() || backoff_ceiling < backoff_floor {
            return Err(format!(
                "invalid backoff range: floor {:?}, ceiling {:?}",
                backoff_floor, backoff_ceiling
            ));
        }

        let max_retries: u32 = parse_or("MAX_RETRIES", defaults.max_retries)?;
        if max_retries == 0 {
            return Err("MAX_RETRIES must be at least 1".to_string());
        }

        Ok(Self {
            // Price sources
            jupiter_url: env_var_or("JUPITER_API_URL", DEFAULT_JUPITER_URL),
            jupiter_api_key: env_opt("JUPITER_API_KEY"),
            jupiter_vs_token: env_opt("JUPITER_VS_TOKEN"),
            birdeye_url: env_var_or("BIRDEYE_API_URL", DEFAULT_BIRDEYE_URL),
            birdeye_api_key: env_opt("BIRDEYE_API_KEY"),
            moralis_url: env_var_or("MORALIS_API_URL", DEFAULT_MORALIS_URL),
            moralis_api_key: env_opt("MORALIS_API_KEY"),

            // Engine
            monitor: MonitorSettings {
                poll_interval: Duration::from_secs(parse_or(
                    "POLL_INTERVAL_SECS",
                    defaults.poll_interval.as_secs(),
                )?),
                max_retries,
                backoff_floor,
                backoff_ceiling,
                price_timeout: Duration::from_millis(parse_or(
                    "PRICE_TIMEOUT_MS",
                    defaults.price_timeout.as_millis() as u64,
                )?),
                rate_limit_permits: parse_or("PRICE_RATE_LIMIT", defaults.rate_limit_permits)?,
                liquidation_timeout: Duration::from_secs(parse_or(
                    "LIQUIDATION_TIMEOUT_SECS",
                    defaults.liquidation_timeout.as_secs(),
                )?),
                stop_all_when_empty: parse_or("STOP_ALL_WHEN_EMPTY", defaults.stop_all_when_empty)?,
            },

            // Position defaults
            position: PositionParams {
                take_profit_multiplier: parse_or(
                    "TAKE_PROFIT_MULTIPLIER",
                    position_defaults.take_profit_multiplier,
                )?,
                stop_loss_multiplier: parse_or(
                    "STOP_LOSS_MULTIPLIER",
                    position_defaults.stop_loss_multiplier,
                )?,
                max_duration: Duration::from_secs(parse_or(
                    "MAX_DURATION_SECS",
                    DEFAULT_MAX_DURATION.as_secs(),
                )?),
            },
            assumed_supply: parse_or("ASSUMED_SUPPLY", Decimal::from(DEFAULT_ASSUMED_SUPPLY))?,

            // Collaborators
            liquidator_url: env_opt("LIQUIDATOR_URL"),
            telegram_token: env_opt("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: env_opt("TELEGRAM_CHAT_ID"),

            // Logging
            log_file: env_opt("MONITOR_LOG_FILE"),
        })
    }
}

fn env_var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Unlike a silent fallback, a present-but-unparseable value is an error.
fn parse_or<T>(name: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid {} {:?}: {}", name, raw, e)),
        None => Ok(default),
    }
}
