//! Error types for the terminal counter service (C2) and the master-data
//! read-through cache (C3).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error(transparent)]
    Storage(#[from] pos_storage::StorageError),

    #[error("master-data lookup failed for {kind} '{code}': {reason}")]
    MasterDataLookup { kind: String, code: String, reason: String },

    #[error("master-data entry not found: {kind} '{code}'")]
    MasterDataNotFound { kind: String, code: String },

    #[error("terminal not found: {terminal_id}")]
    TerminalNotFound { terminal_id: String },

    #[error("terminal {terminal_id} is already in status {status}")]
    InvalidTerminalStatus { terminal_id: String, status: String },

    #[error("counter advance exhausted {attempts} optimistic-CAS retries for {terminal_id}/{counter_type}")]
    CounterContention { terminal_id: String, counter_type: String, attempts: u32 },
}

pub type TerminalResult<T> = Result<T, TerminalError>;
