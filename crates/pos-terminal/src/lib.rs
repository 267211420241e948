//! # pos-terminal: Terminal Counter Service (C2) + Master-Data Cache (C3)
//!
//! `pos-cart` draws receipt/transaction numbers through [`counter::next`]
//! and resolves item/tax/payment/category codes through
//! [`cache::MasterDataCaches`]. Both depend only on traits
//! ([`counter::CounterBackend`], [`cache::MasterDataClient`]) so the cart
//! engine's tests can swap in in-memory doubles.

pub mod cache;
pub mod counter;
pub mod entities;
pub mod error;
pub mod repository;

pub use cache::{CategoryRecord, GrpcChannelPool, HttpMasterDataClient, ItemRecord, MasterDataCaches, MasterDataClient, PaymentMethodRecord, TaxRecord};
pub use counter::{next, next_receipt_and_transaction_no, CounterBackend, DEFAULT_END, DEFAULT_START};
pub use entities::{Store, Terminal, TerminalStatus};
pub use error::{TerminalError, TerminalResult};
pub use repository::{delete_terminal, list_terminals, load_terminal, load_terminal_by_id, save_terminal};
