//! # Terminal Counter Service (C2)
//!
//! Allocates receipt numbers and transaction numbers without gaps within a
//! cycle and without duplicates across concurrently-running service
//! instances. The correctness of `next` rests entirely on the backing
//! store executing the conditional increment atomically — a process-local
//! mutex cannot substitute, since more than one `pos-terminal` instance may
//! be handling requests for the same terminal at once.

use async_trait::async_trait;
use bson::doc;
use pos_storage::StorageGateway;

use crate::error::TerminalResult;

pub const DEFAULT_START: i64 = 1;
pub const DEFAULT_END: i64 = i64::MAX;

/// A counter type, e.g. `"receipt_no"` or `"transaction_no"`. Kept as a
/// plain string rather than an enum since stores may define their own
/// counter types (cash drawer sequence, shift number, ...).
pub type CounterType = str;

/// The conditional-increment primitive C2 is built on. `StorageGateway`
/// implements this against MongoDB's pipeline-update support; tests use an
/// in-memory implementation to exercise the rollover and contention
/// invariants without a live database.
#[async_trait]
pub trait CounterBackend: Send + Sync {
    async fn advance(
        &self,
        terminal_id: &str,
        counter_type: &str,
        start: i64,
        end: i64,
    ) -> TerminalResult<i64>;
}

#[async_trait]
impl CounterBackend for StorageGateway {
    async fn advance(
        &self,
        terminal_id: &str,
        counter_type: &str,
        start: i64,
        end: i64,
    ) -> TerminalResult<i64> {
        let filter = doc! { "terminal_id": terminal_id, "counter_type": counter_type };
        let value = self.advance_counter("terminal_counters", filter, "value", start, end).await?;
        Ok(value)
    }
}

/// Allocates the next value of `counter_type` for `terminal_id`, with the
/// conditional-reset semantics of spec §4.2: absent or `>= end` resets to
/// `start`, otherwise increments by 1.
pub async fn next<B: CounterBackend + ?Sized>(
    backend: &B,
    terminal_id: &str,
    counter_type: &str,
    start: i64,
    end: i64,
) -> TerminalResult<i64> {
    backend.advance(terminal_id, counter_type, start, end).await
}

/// Convenience wrapper for the two counters every finalized transaction
/// consumes (spec §4.4.5 step 1): `receipt_no` and `transaction_no`, both
/// drawn from the default `[1, MAX]` range.
pub async fn next_receipt_and_transaction_no<B: CounterBackend + ?Sized>(
    backend: &B,
    terminal_id: &str,
) -> TerminalResult<(i64, i64)> {
    let receipt_no = next(backend, terminal_id, "receipt_no", DEFAULT_START, DEFAULT_END).await?;
    let transaction_no = next(backend, terminal_id, "transaction_no", DEFAULT_START, DEFAULT_END).await?;
    Ok((receipt_no, transaction_no))
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory counter store used by tests to exercise the rollover and
    /// contention invariants without a live MongoDB connection. Not
    /// exported outside the test build: it is not a substitute backend for
    /// production, since it is process-local.
    #[derive(Default)]
    pub struct MemoryCounterStore {
        values: Mutex<HashMap<(String, String), i64>>,
    }

    #[async_trait]
    impl CounterBackend for MemoryCounterStore {
        async fn advance(
            &self,
            terminal_id: &str,
            counter_type: &str,
            start: i64,
            end: i64,
        ) -> TerminalResult<i64> {
            let mut values = self.values.lock().unwrap();
            let key = (terminal_id.to_string(), counter_type.to_string());
            let next_value = match values.get(&key) {
                None => start,
                Some(v) if *v >= end => start,
                Some(v) => v + 1,
            };
            values.insert(key, next_value);
            Ok(next_value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MemoryCounterStore;
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn rolls_over_at_bound() {
        let store = MemoryCounterStore::default();
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(next(&store, "t1", "receipt_no", 1, 5).await.unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 1]);
    }

    #[tokio::test]
    async fn counters_are_independent_per_type() {
        let store = MemoryCounterStore::default();
        next(&store, "t1", "receipt_no", 1, 100).await.unwrap();
        let transaction_no = next(&store, "t1", "transaction_no", 1, 100).await.unwrap();
        assert_eq!(transaction_no, 1);
    }

    #[tokio::test]
    async fn concurrent_callers_each_get_a_distinct_value_within_one_cycle() {
        let store = Arc::new(MemoryCounterStore::default());
        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                next(&*store, "t1", "receipt_no", 1, 20).await.unwrap()
            }));
        }
        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap());
        }
        results.sort_unstable();
        assert_eq!(results, (1..=20).collect::<Vec<_>>());
    }
}
