//! # pos-cart: Cart Engine (C4)
//!
//! Wraps `pos_core::Cart`'s pure pricing pipeline and state machine with
//! the I/O this system's cart lifecycle needs: tenant-scoped storage
//! (`pos-storage`), the terminal counter service and master-data cache
//! (`pos-terminal`), and the guaranteed-delivery event pipeline
//! (`pos-events`). [`engine::CartEngine`] is the single entry point `apps/api-server`
//! drives; everything else in this crate is a collaborator it orchestrates.

pub mod engine;
pub mod error;
pub mod locking;
pub mod payment;
pub mod repository;
pub mod void_return;

pub use engine::{CartEngine, CartEngineConfig, NewLineItem, NewPayment};
pub use error::{CartError, CartResult};
pub use locking::{CartLockGuard, CartLocks, InProcessCartLocks, LeaseCartLocks};
pub use payment::{PaymentRegistry, PaymentStrategy};
pub use pos_core::PaymentCapabilities;
