//! # Collection Registry
//!
//! Declares, per service collection, the indexes the storage gateway must
//! create on first tenant registration (spec §4.1): unique indexes on
//! natural keys, compound indexes for range queries, and TTL indexes on
//! collections with a retention policy (snapshots, delivery-status).

use bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel};
use tracing::{debug, info};

use crate::error::StorageResult;

/// One index this crate needs the gateway to maintain.
pub struct IndexSpec {
    pub collection: &'static str,
    pub keys: bson::Document,
    pub unique: bool,
    /// TTL in seconds, applied to the index's first key (must be a date field).
    pub ttl_seconds: Option<i64>,
}

/// All indexes declared by the core subsystems, created idempotently the
/// first time a tenant's logical database is touched.
pub fn registry() -> Vec<IndexSpec> {
    vec![
        IndexSpec {
            collection: "terminals",
            keys: doc! { "store_code": 1, "terminal_no": 1 },
            unique: true,
            ttl_seconds: None,
        },
        IndexSpec {
            collection: "terminal_counters",
            keys: doc! { "terminal_id": 1, "counter_type": 1 },
            unique: true,
            ttl_seconds: None,
        },
        IndexSpec {
            collection: "carts",
            keys: doc! { "cart_id": 1 },
            unique: true,
            ttl_seconds: None,
        },
        IndexSpec {
            collection: "transaction_logs",
            keys: doc! { "terminal_id": 1, "transaction_no": 1 },
            unique: true,
            ttl_seconds: None,
        },
        IndexSpec {
            collection: "transaction_logs",
            keys: doc! { "business_date": 1, "store_code": 1 },
            unique: false,
            ttl_seconds: None,
        },
        IndexSpec {
            collection: "transaction_status",
            keys: doc! { "terminal_id": 1, "transaction_no": 1 },
            unique: true,
            ttl_seconds: None,
        },
        IndexSpec {
            collection: "journal_entries",
            keys: doc! { "terminal_id": 1, "transaction_no": 1 },
            unique: true,
            ttl_seconds: None,
        },
        IndexSpec {
            collection: "journal_entries",
            keys: doc! { "business_date": 1, "store_code": 1, "generate_date_time": 1 },
            unique: false,
            ttl_seconds: None,
        },
        IndexSpec {
            collection: "carts",
            keys: doc! { "status": 1, "updated_at": 1 },
            unique: false,
            ttl_seconds: None,
        },
        IndexSpec {
            collection: "cart_locks",
            // `_id` carries the uniqueness (one lease document per
            // cart_id); this index only expires abandoned leases.
            keys: doc! { "leased_at": 1 },
            unique: false,
            ttl_seconds: Some(30),
        },
        IndexSpec {
            collection: "stocks",
            keys: doc! { "store_code": 1, "item_code": 1 },
            unique: true,
            ttl_seconds: None,
        },
        IndexSpec {
            collection: "stock_updates",
            keys: doc! { "store_code": 1, "item_code": 1, "timestamp": -1 },
            unique: false,
            ttl_seconds: None,
        },
        IndexSpec {
            collection: "stock_snapshots",
            keys: doc! { "generate_date_time": 1 },
            unique: false,
            // Default retention; re-created with the schedule's value when
            // a tenant changes it (spec §4.6.3).
            ttl_seconds: Some(30 * 24 * 3600),
        },
    ]
}

/// Delivery-status indexes live in the cross-tenant `commons` namespace,
/// not per-tenant, since subscribers and republishers address events by
/// `event_id` alone.
pub fn commons_registry() -> Vec<IndexSpec> {
    vec![
        IndexSpec {
            collection: "delivery_status",
            keys: doc! { "event_id": 1 },
            unique: true,
            ttl_seconds: None,
        },
        IndexSpec {
            collection: "delivery_status",
            keys: doc! { "published_at": 1 },
            unique: false,
            ttl_seconds: Some(14 * 24 * 3600),
        },
        IndexSpec {
            collection: "subscriber_dedupe",
            // Uniqueness of the (service, event_id) claim is carried by
            // `_id` itself (`"{service}:{event_id}"`); this index only
            // exists to expire stale claims.
            keys: doc! { "claimed_at": 1 },
            unique: false,
            // Window larger than the republisher's window (spec §9).
            ttl_seconds: Some(7 * 24 * 3600),
        },
        IndexSpec {
            collection: "accounts",
            // Login accounts are cross-tenant objects (an account names
            // the one tenant it belongs to, or `is_superuser` for every
            // tenant), so they live in `commons` alongside delivery
            // status rather than in a per-tenant database.
            keys: doc! { "username": 1 },
            unique: true,
            ttl_seconds: None,
        },
    ]
}

/// Creates every index in `specs` on `db`, idempotently (mongodb's
/// `create_index` is a no-op when an equivalent index already exists).
pub async fn ensure_indexes(db: &Database, specs: &[IndexSpec]) -> StorageResult<()> {
    for spec in specs {
        let mut opts = IndexOptions::builder().unique(spec.unique);
        if let Some(ttl) = spec.ttl_seconds {
            opts = opts.expire_after(Some(std::time::Duration::from_secs(ttl as u64)));
        }
        let model = IndexModel::builder().keys(spec.keys.clone()).options(opts.build()).build();
        debug!(collection = spec.collection, "ensuring index");
        db.collection::<bson::Document>(spec.collection).create_index(model).await?;
    }
    info!(count = specs.len(), "collection indexes ensured");
    Ok(())
}

/// Re-creates the TTL index on `stock_snapshots` with a new retention
/// value (spec §4.6.3: "when the retention value changes the TTL index is
/// re-created").
pub async fn recreate_snapshot_ttl(db: &Database, retention_days: i64) -> StorageResult<()> {
    let coll = db.collection::<bson::Document>("stock_snapshots");
    let _ = coll.drop_index("generate_date_time_1").await;
    let opts = IndexOptions::builder()
        .expire_after(Some(std::time::Duration::from_secs((retention_days * 24 * 3600) as u64)))
        .build();
    let model = IndexModel::builder().keys(doc! { "generate_date_time": 1 }).options(opts).build();
    coll.create_index(model).await?;
    Ok(())
}
