//! # Alert Evaluation and Push Channel (C6 §4.6.4)
//!
//! Every mutation's post-image is checked against its low-stock and
//! reorder thresholds with no intervening read (spec §5 "stock
//! concurrency") — the caller passes the exact document `update_stock`
//! already returned. A per-item cooldown suppresses repeat alerts; the
//! push side is a per-tenant `tokio::sync::broadcast` channel, the same
//! fan-out primitive the teacher's hub server uses for connected clients,
//! minus the WebSocket framing (that belongs to `apps/api-server`).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use ts_rs::TS;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, std::hash::Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AlertKind {
    LowStock,
    Reorder,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockAlert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub item_code: String,
    pub current_quantity: i64,
    pub threshold: i64,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
}

struct CooldownKey {
    item_code: String,
    kind: AlertKind,
}

/// Suppresses repeat alerts for the same `(item_code, kind)` within a
/// configured window. Held per tenant alongside the broadcast sender.
struct Cooldowns {
    window: Duration,
    last_fired: HashMap<(String, AlertKind), Instant>,
}

impl Cooldowns {
    fn new(window: Duration) -> Self {
        Cooldowns { window, last_fired: HashMap::new() }
    }

    fn should_fire(&mut self, key: CooldownKey) -> bool {
        let map_key = (key.item_code, key.kind);
        let now = Instant::now();
        match self.last_fired.get(&map_key) {
            Some(last) if now.duration_since(*last) < self.window => false,
            _ => {
                self.last_fired.insert(map_key, now);
                true
            }
        }
    }
}

/// One tenant's alert fan-out: a broadcast sender clients subscribe to via
/// the per-tenant stream endpoint, plus the cooldown state for this
/// tenant's items. Disconnected receivers are dropped silently — there is
/// no replay, per spec.
pub struct AlertHub {
    sender: broadcast::Sender<StockAlert>,
    cooldowns: Mutex<Cooldowns>,
}

impl AlertHub {
    pub fn new(cooldown_seconds: u64) -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        AlertHub { sender, cooldowns: Mutex::new(Cooldowns::new(Duration::from_secs(cooldown_seconds))) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StockAlert> {
        self.sender.subscribe()
    }

    /// Evaluates `current` against `minimum`/`reorder_point` and pushes an
    /// alert to connected subscribers if a threshold is crossed and its
    /// cooldown has elapsed. Low-stock takes precedence over reorder when
    /// both thresholds are crossed simultaneously, since it is the more
    /// urgent condition.
    pub fn evaluate(&self, item_code: &str, current: i64, minimum: i64, reorder_point: i64) {
        let (kind, threshold) = if current <= minimum {
            (AlertKind::LowStock, minimum)
        } else if current <= reorder_point {
            (AlertKind::Reorder, reorder_point)
        } else {
            return;
        };

        let should_fire = {
            let mut cooldowns = self.cooldowns.lock().unwrap();
            cooldowns.should_fire(CooldownKey { item_code: item_code.to_string(), kind })
        };
        if !should_fire {
            return;
        }

        let alert = StockAlert { kind, item_code: item_code.to_string(), current_quantity: current, threshold, timestamp: Utc::now() };
        // A send error just means no subscriber is currently connected;
        // the spec says disconnections silently drop with no replay.
        let _ = self.sender.send(alert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_low_stock_when_at_or_below_minimum() {
        let hub = AlertHub::new(60);
        let mut rx = hub.subscribe();
        hub.evaluate("SKU-1", 5, 10, 20);
        let alert = rx.try_recv().unwrap();
        assert_eq!(alert.kind, AlertKind::LowStock);
    }

    #[test]
    fn does_not_fire_above_both_thresholds() {
        let hub = AlertHub::new(60);
        let mut rx = hub.subscribe();
        hub.evaluate("SKU-1", 100, 10, 20);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn cooldown_suppresses_repeat_alert_for_same_item_and_kind() {
        let hub = AlertHub::new(3600);
        let mut rx = hub.subscribe();
        hub.evaluate("SKU-1", 5, 10, 20);
        hub.evaluate("SKU-1", 4, 10, 20);
        assert_eq!(rx.len(), 1);
    }
}
