//! # Snapshot Scheduler (C6 §4.6.3)
//!
//! A tenant-configurable cron-like schedule (daily/weekly/monthly at a
//! given time) that snapshots every stock document in one or more stores.
//! Concurrent executions of the same tenant within the same hour are
//! suppressed by an in-process lock keyed by `(tenant, hour)` — this is a
//! best-effort guard against a single process double-firing, not a
//! distributed lock; multiple process instances each still only fire once
//! per their own clock, and duplicate snapshots are harmless (the
//! retention TTL reaps them the same as any other).

use std::collections::HashSet;
use std::sync::Mutex;

use bson::{doc, Document};
use chrono::{Timelike, Utc};
use futures_util::stream::TryStreamExt;
use pos_storage::StorageGateway;
use tracing::{info, warn};

use crate::error::StockResult;
use crate::types::{StockSnapshot, StockSnapshotEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleFrequency {
    Daily,
    Weekly { day_of_week: u32 },
    Monthly { day_of_month: u32 },
}

#[derive(Debug, Clone)]
pub struct SnapshotSchedule {
    pub tenant_id: String,
    pub frequency: ScheduleFrequency,
    pub hour: u32,
    pub minute: u32,
    /// Target store codes, or `["all"]` to enumerate every store.
    pub stores: Vec<String>,
    pub retention_days: i64,
}

/// Suppresses more than one snapshot run per `(tenant_id, hour-of-day)`
/// within a single process. Not shared across processes — each instance
/// enforces its own once-per-hour guard.
#[derive(Default)]
pub struct SnapshotGate {
    fired: Mutex<HashSet<(String, u32)>>,
}

impl SnapshotGate {
    pub fn new() -> Self {
        SnapshotGate::default()
    }

    /// Returns `true` if this call should proceed (the tenant hasn't
    /// fired this hour yet in this process).
    fn try_claim(&self, tenant_id: &str, hour: u32) -> bool {
        let mut fired = self.fired.lock().unwrap();
        fired.insert((tenant_id.to_string(), hour))
    }

    /// Clears claims for hours other than the current one, bounding
    /// memory use across long-running processes.
    pub fn reset_for_new_hour(&self, current_hour: u32) {
        let mut fired = self.fired.lock().unwrap();
        fired.retain(|(_, hour)| *hour == current_hour);
    }
}

/// Runs the snapshot for `schedule` if the process-local gate allows it
/// this hour, snapshotting every stock document in its target store(s).
pub async fn run_scheduled_snapshot(
    storage: &StorageGateway,
    gate: &SnapshotGate,
    schedule: &SnapshotSchedule,
) -> StockResult<Option<StockSnapshot>> {
    let now = Utc::now();
    if !gate.try_claim(&schedule.tenant_id, now.hour() as u32) {
        warn!(tenant_id = %schedule.tenant_id, "snapshot already ran this hour, skipping");
        return Ok(None);
    }
    snapshot_now(storage, schedule).await.map(Some)
}

/// Takes a snapshot immediately, bypassing the hourly gate — used by the
/// admin CLI's manual trigger.
pub async fn snapshot_now(storage: &StorageGateway, schedule: &SnapshotSchedule) -> StockResult<StockSnapshot> {
    let store_filter = if schedule.stores.iter().any(|s| s == "all") {
        doc! {}
    } else {
        doc! { "store_code": { "$in": schedule.stores.clone() } }
    };

    let mut cursor = storage.db().collection::<Document>("stocks").find(store_filter).await.map_err(pos_storage::StorageError::from)?;
    let mut entries = Vec::new();
    while let Some(raw) = cursor.try_next().await.map_err(pos_storage::StorageError::from)? {
        let item_code = raw.get_str("item_code").unwrap_or_default().to_string();
        let quantity = raw.get_i64("current_quantity").unwrap_or(0);
        entries.push(StockSnapshotEntry { item_code, quantity });
    }

    let snapshot = StockSnapshot {
        tenant_id: storage.tenant_id().to_string(),
        store_code: schedule.stores.join(","),
        entries,
        generate_date_time: Utc::now(),
    };
    let snapshot_doc = bson::to_document(&snapshot).map_err(|e| pos_storage::StorageError::Internal(e.to_string()))?;
    storage.create("stock_snapshots", snapshot_doc).await?;
    info!(tenant_id = %schedule.tenant_id, entries = snapshot.entries.len(), "stock snapshot generated");
    Ok(snapshot)
}

/// Re-creates the snapshot collection's TTL index when a tenant changes
/// its schedule's `retention_days` (spec §4.6.3's closing sentence).
pub async fn apply_retention_change(storage: &StorageGateway, retention_days: i64) -> StockResult<()> {
    storage.recreate_snapshot_ttl(retention_days).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_allows_one_claim_per_tenant_per_hour() {
        let gate = SnapshotGate::new();
        assert!(gate.try_claim("A1234", 9));
        assert!(!gate.try_claim("A1234", 9));
        assert!(gate.try_claim("A1234", 10));
    }

    #[test]
    fn gate_tracks_tenants_independently() {
        let gate = SnapshotGate::new();
        assert!(gate.try_claim("A1234", 9));
        assert!(gate.try_claim("B5678", 9));
    }
}
