//! # pos-storage: Tenant-Scoped Storage Gateway (C1)
//!
//! One logical database per tenant over the `mongodb` driver, plus a
//! shared `commons` namespace for cross-tenant delivery-status records.
//! Everything above this crate (terminal counters, the cart engine, the
//! event pipeline, the stock ledger) talks to storage only through
//! [`StorageGateway`] — no other crate imports `mongodb` directly.

pub mod collections;
pub mod error;
pub mod gateway;

pub use collections::IndexSpec;
pub use error::{StorageError, StorageResult};
pub use gateway::StorageGateway;
