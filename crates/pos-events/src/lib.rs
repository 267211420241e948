//! # pos-events: Guaranteed-Delivery Event Pipeline (C5)
//!
//! Three parts, each independently testable:
//! - [`delivery::Publisher`] writes a `DeliveryStatus` document before
//!   touching the bus and never fails the caller on a bus error.
//! - [`dedupe::claim_once`] gives subscribers idempotent-by-`event_id`
//!   processing.
//! - [`republisher::Republisher`] is the background sweep that re-drives
//!   the bus call for anything still short of `delivered`.

pub mod dedupe;
pub mod delivery;
pub mod error;
pub mod republisher;

pub use dedupe::claim_once;
pub use delivery::{DeliveryStatus, EventBus, OverallStatus, Publisher, RedisBus, ServiceDeliveryState, ServiceStatus};
pub use error::{EventError, EventResult};
pub use republisher::{Republisher, RepublisherConfig, RepublisherHandle};
