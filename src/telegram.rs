// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Telegram notifier module.

use crate::monitor::{MonitorEvent, MonitorExit};
use std::future::Future;
use teloxide::prelude::*;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Option<Bot>,
    chat_id: Option<ChatId>,
}

impl TelegramNotifier {
    pub fn new(token: Option<String>, chat_id: Option<String>) -> Self {
        info!(
            "📱 Initializing Telegram: token={}, chat_id={}",
            token.as_ref().map(|_| "SET").unwrap_or("NONE"),
            chat_id.as_ref().map(|_| "SET").unwrap_or("NONE")
        );

        let bot = token.map(Bot::new);
        let chat_id = chat_id.and_then(|id| match id.trim().parse::<i64>() {
            Ok(num) => Some(ChatId(num)),
            Err(_) => {
                warn!("TELEGRAM_CHAT_ID {:?} is not numeric, notifications disabled", id);
                None
            }
        });

        Self { bot, chat_id }
    }

    pub fn is_enabled(&self) -> bool {
        self.bot.is_some() && self.chat_id.is_some()
    }

    pub async fn send_message(&self, message: &str) {
        if let (Some(bot), Some(chat_id)) = (&self.bot, &self.chat_id) {
            let result = bot.send_message(*chat_id, message).await;
            match result {
                Ok(_) => info!("📤 Sent Telegram message"),
                Err(e) => error!("Failed to send Telegram message: {}", e),
            }
        }
    }
}

/// Render a monitor event as a chat message.
pub fn format_event(event: &MonitorEvent) -> String {
    let asset_id = event.asset_id();
    match event {
        MonitorEvent::Started {
            entry_price,
            take_profit_price,
            stop_loss_price,
            opened_at,
            ..
        } => format!(
            "📊 Monitoring {}\nEntry: {}\nTP: {}\nSL: {}\nOpened: {}",
            asset_id,
            entry_price,
            take_profit_price,
            stop_loss_price,
            opened_at.format("%H:%M:%S UTC")
        ),
        MonitorEvent::Stopped { exit, .. } => match exit {
            MonitorExit::Liquidated { reason, outcome } => {
                format!("✅ SOLD {} ({})\n{}", asset_id, reason, outcome)
            }
            MonitorExit::LiquidationFailed { reason, error } => format!(
                "❌ SELL FAILED {} ({})\n{}\nManual action required",
                asset_id, reason, error
            ),
            MonitorExit::Faulted { error } => {
                format!("🚫 Monitor for {} stopped without selling\n{}", asset_id, error)
            }
            MonitorExit::Cancelled => format!("⏹️ Stopped monitoring {}", asset_id),
        },
    }
}

/// Forward supervisor events to Telegram until the channel closes.
pub fn spawn_event_notifier(
    events: broadcast::Receiver<MonitorEvent>,
    notifier: TelegramNotifier,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        forward_events(events, |text| {
            let notifier = notifier.clone();
            async move { notifier.send_message(&text).await }
        })
        .await
    })
}

/// Deliver every event's message in order. Returns once all senders are
/// dropped and the backlog is drained.
pub async fn forward_events<F, Fut>(mut events: broadcast::Receiver<MonitorEvent>, mut deliver: F)
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        match events.recv().await {
            Ok(event) => deliver(format_event(&event)).await,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Telegram notifier fell behind, dropped events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liquidation::LiquidationOutcome;
    use crate::position::ExitReason;

    #[test]
    fn formats_terminal_events() {
        let sold = MonitorEvent::Stopped {
            asset_id: "MINT".into(),
            exit: MonitorExit::Liquidated {
                reason: ExitReason::TakeProfit,
                outcome: LiquidationOutcome::Sold {
                    transaction_reference: "sig".into(),
                },
            },
        };
        let text = format_event(&sold);
        assert!(text.starts_with("✅ SOLD MINT (take-profit)"));
        assert!(text.contains("sig"));

        let failed = MonitorEvent::Stopped {
            asset_id: "MINT".into(),
            exit: MonitorExit::LiquidationFailed {
                reason: ExitReason::StopLoss,
                error: "rpc down".into(),
            },
        };
        assert!(format_event(&failed).contains("Manual action required"));
    }

    fn sold(asset: &str) -> MonitorEvent {
        MonitorEvent::Stopped {
            asset_id: asset.into(),
            exit: MonitorExit::Liquidated {
                reason: ExitReason::StopLoss,
                outcome: LiquidationOutcome::NothingToSell,
            },
        }
    }

    #[tokio::test]
    async fn forwarder_drains_backlog_after_senders_drop() {
        let (tx, rx) = broadcast::channel(16);
        tx.send(sold("AAA")).unwrap();
        tx.send(sold("BBB")).unwrap();
        drop(tx);

        let mut delivered = Vec::new();
        forward_events(rx, |text| {
            delivered.push(text);
            async {}
        })
        .await;

        assert_eq!(delivered.len(), 2);
        assert!(delivered[0].starts_with("✅ SOLD AAA (stop-loss)"));
        assert!(delivered[1].starts_with("✅ SOLD BBB (stop-loss)"));
    }

    #[tokio::test]
    async fn notifier_task_ends_when_channel_closes() {
        let (tx, rx) = broadcast::channel(16);
        let task = spawn_event_notifier(rx, TelegramNotifier::new(None, None));
        tx.send(sold("AAA")).unwrap();
        drop(tx);

        tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .expect("notifier should finish once the sender is gone")
            .unwrap();
    }

    #[test]
    fn bad_chat_id_disables_notifier() {
        let n = TelegramNotifier::new(Some("123:abc".into()), Some("not-a-number".into()));
        assert!(!n.is_enabled());
        assert!(!TelegramNotifier::new(None, None).is_enabled());
    }
}
