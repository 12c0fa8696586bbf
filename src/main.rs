// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! tentwenty-bot - automatic take-profit / stop-loss exits for open positions

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tentwenty_bot::config::Config;
use tentwenty_bot::liquidation::{DryRunLiquidator, HttpLiquidator, Liquidator};
use tentwenty_bot::monitor::MonitorSupervisor;
use tentwenty_bot::position::PositionConfig;
use tentwenty_bot::pricing::{BirdeyeSource, JupiterSource, MoralisSource, PriceResolver, PriceSource};
use tentwenty_bot::telegram::{spawn_event_notifier, TelegramNotifier};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Upper bound on delivering the last notifications at shutdown.
const NOTIFIER_FLUSH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Parser)]
#[command(name = "tentwenty-bot", version, about = "Watches open positions and sells on TP/SL/timeout")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor one or more positions until they exit
    Watch {
        /// Positions as ASSET=ENTRY (entry is a price, or a market cap with --mcap)
        #[arg(required = true, value_parser = parse_position)]
        positions: Vec<(String, Decimal)>,

        /// Take-profit multiplier (overrides TAKE_PROFIT_MULTIPLIER)
        #[arg(long)]
        take_profit: Option<Decimal>,

        /// Stop-loss multiplier (overrides STOP_LOSS_MULTIPLIER)
        #[arg(long)]
        stop_loss: Option<Decimal>,

        /// Maximum holding time in seconds (overrides MAX_DURATION_SECS)
        #[arg(long)]
        max_duration: Option<u64>,

        /// Entries are market caps, priced over ASSUMED_SUPPLY
        #[arg(long)]
        mcap: bool,

        /// Exit once every position has stopped
        #[arg(long)]
        exit_when_idle: bool,

        /// Log sells instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
}

fn parse_position(raw: &str) -> Result<(String, Decimal), String> {
    let (asset, entry) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ASSET=ENTRY, got {:?}", raw))?;
    let entry: Decimal = entry
        .trim()
        .parse()
        .map_err(|e| format!("bad entry {:?}: {}", entry, e))?;
    Ok((asset.trim().to_string(), entry))
}

fn init_logging(log_file: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}

fn build_sources(config: &Config, client: &reqwest::Client) -> Vec<Arc<dyn PriceSource>> {
    vec![
        Arc::new(JupiterSource::new(
            client.clone(),
            config.jupiter_url.clone(),
            config.jupiter_api_key.clone(),
            config.jupiter_vs_token.clone(),
        )) as Arc<dyn PriceSource>,
        Arc::new(BirdeyeSource::new(
            client.clone(),
            config.birdeye_url.clone(),
            config.birdeye_api_key.clone(),
        )),
        Arc::new(MoralisSource::new(
            client.clone(),
            config.moralis_url.clone(),
            config.moralis_api_key.clone(),
        )),
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env().map_err(|e| anyhow!(e))?;

    init_logging(config.log_file.as_deref())?;

    match cli.command {
        Commands::Watch {
            positions,
            take_profit,
            stop_loss,
            max_duration,
            mcap,
            exit_when_idle,
            dry_run,
        } => {
            if let Some(tp) = take_profit {
                config.position.take_profit_multiplier = tp;
            }
            if let Some(sl) = stop_loss {
                config.position.stop_loss_multiplier = sl;
            }
            if let Some(secs) = max_duration {
                config.position.max_duration = Duration::from_secs(secs);
            }
            if exit_when_idle {
                config.monitor.stop_all_when_empty = true;
            }
            watch(config, positions, mcap, dry_run).await
        }
    }
}

async fn watch(
    config: Config,
    positions: Vec<(String, Decimal)>,
    mcap: bool,
    dry_run: bool,
) -> Result<()> {
    info!("🚀 tentwenty-bot starting...");

    // Per-call timeouts live in the resolver and liquidator.
    let client = reqwest::Client::builder()
        .connect_timeout(config.monitor.price_timeout)
        .build()
        .context("building HTTP client")?;

    let resolver = Arc::new(PriceResolver::with_settings(
        build_sources(&config, &client),
        &config.monitor,
    ));
    info!(
        "💱 Price sources: {} ({} concurrent queries)",
        resolver.source_names().join(" -> "),
        config.monitor.rate_limit_permits
    );

    let liquidator: Arc<dyn Liquidator> = match (&config.liquidator_url, dry_run) {
        (Some(url), false) => {
            info!("🔗 Liquidator: {}", url);
            Arc::new(HttpLiquidator::new(client.clone(), url.clone()))
        }
        (None, false) => {
            warn!("⚠️ LIQUIDATOR_URL not set, running in dry-run mode");
            Arc::new(DryRunLiquidator)
        }
        (_, true) => {
            info!("🧪 Dry-run mode");
            Arc::new(DryRunLiquidator)
        }
    };

    let supervisor = MonitorSupervisor::new(resolver, liquidator, config.monitor.clone());

    let notifier = TelegramNotifier::new(config.telegram_token.clone(), config.telegram_chat_id.clone());
    let notifier_task = notifier
        .is_enabled()
        .then(|| spawn_event_notifier(supervisor.subscribe(), notifier));

    let mut started = 0usize;
    for (asset, entry) in positions {
        let result = if mcap {
            match PositionConfig::from_market_cap(
                asset.as_str(),
                entry,
                config.assumed_supply,
                &config.position,
                tokio::time::Instant::now(),
            ) {
                Ok(position) => supervisor.start(position).await,
                Err(e) => Err(e),
            }
        } else {
            supervisor
                .start_monitoring(&asset, entry, &config.position)
                .await
        };

        match result {
            Ok(()) => started += 1,
            Err(e) => error!(asset = %asset, "Failed to start monitor: {}", e),
        }
    }

    if started == 0 {
        supervisor.stop_all().await;
        bail!("no position could be monitored");
    }

    info!("👀 Watching {} position(s)", started);

    let exit_when_idle = config.monitor.stop_all_when_empty;
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("🛑 Shutdown signal received, stopping monitors...");
            supervisor.stop_all().await;
        }
        _ = supervisor.wait_for_shutdown(), if exit_when_idle => {
            info!("All positions closed");
        }
    }

    // Closing the event channel lets the notifier finish its backlog.
    drop(supervisor);
    if let Some(task) = notifier_task {
        match tokio::time::timeout(NOTIFIER_FLUSH_TIMEOUT, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Telegram notifier task failed: {}", e),
            Err(_) => warn!("⚠️ Telegram notifier still busy after {:?}, exiting", NOTIFIER_FLUSH_TIMEOUT),
        }
    }

    info!("👋 Goodbye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_position_pairs() {
        let (asset, entry) = parse_position("So11111111111111111111111111111111111111112=0.0031").unwrap();
        assert_eq!(asset, "So11111111111111111111111111111111111111112");
        assert_eq!(entry, Decimal::new(31, 4));

        assert!(parse_position("MINT").is_err());
        assert!(parse_position("MINT=abc").is_err());
    }

    #[test]
    fn cli_accepts_watch_flags() {
        let cli = Cli::try_parse_from([
            "tentwenty-bot",
            "watch",
            "MINT=26000",
            "--mcap",
            "--take-profit",
            "1.35",
            "--exit-when-idle",
        ])
        .unwrap();
        let Commands::Watch {
            positions,
            take_profit,
            mcap,
            exit_when_idle,
            dry_run,
            ..
        } = cli.command;
        assert_eq!(positions, vec![("MINT".to_string(), Decimal::from(26000))]);
        assert_eq!(take_profit, Some(Decimal::new(135, 2)));
        assert!(mcap && exit_when_idle && !dry_run);
    }
}
