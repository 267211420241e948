//! # pos-stock: Stock Ledger, Snapshot Scheduler, Alert Channel (C6)

pub mod alerts;
pub mod error;
pub mod ledger;
pub mod scheduler;
pub mod types;

pub use alerts::{AlertHub, AlertKind, StockAlert};
pub use error::{StockError, StockResult};
pub use ledger::{process_transaction, update_stock};
pub use scheduler::{apply_retention_change, run_scheduled_snapshot, snapshot_now, ScheduleFrequency, SnapshotGate, SnapshotSchedule};
pub use types::{sign_and_kind_for, Stock, StockEventKind, StockSnapshot, StockSnapshotEntry, StockUpdate};
