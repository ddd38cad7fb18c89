//! In-memory counter store for testing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tally_core::counters::{
    Category, CounterRecord, CounterStore, CounterStoreError, Counters, StoreFuture, UserId,
};

/// In-memory counter store.
///
/// Rows are kept ordered by user id. Reads and writes can be made to fail
/// independently to exercise error paths.
///
/// # Example
///
/// ```
/// use tally_testing::InMemoryCounterStore;
/// use tally_core::counters::{Category, CounterStore, UserId};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryCounterStore::new();
/// let after = store.increment(&UserId::new("1"), Category::Coke, 5).await.unwrap();
/// assert_eq!(after.coke, 5);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryCounterStore {
    rows: Arc<Mutex<BTreeMap<UserId, Counters>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryCounterStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with records.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = CounterRecord>) -> Self {
        let rows = records.into_iter().map(|r| (r.user_id, r.counters)).collect();
        Self {
            rows: Arc::new(Mutex::new(rows)),
            ..Self::default()
        }
    }

    /// Make every subsequent read fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or_default()
    }

    /// Whether no rows are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<T>(
        &self,
        f: impl FnOnce(&BTreeMap<UserId, Counters>) -> T,
    ) -> Result<T, CounterStoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CounterStoreError::DatabaseError("read failure injected".to_string()));
        }
        let rows = self.rows.lock().map_err(|_| poisoned())?;
        Ok(f(&rows))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<UserId, Counters>) -> T,
    ) -> Result<T, CounterStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CounterStoreError::DatabaseError("write failure injected".to_string()));
        }
        let mut rows = self.rows.lock().map_err(|_| poisoned())?;
        Ok(f(&mut rows))
    }
}

fn poisoned() -> CounterStoreError {
    CounterStoreError::DatabaseError("Mutex lock failed".to_string())
}

impl CounterStore for InMemoryCounterStore {
    fn increment(&self, user_id: &UserId, category: Category, delta: i64) -> StoreFuture<'_, Counters> {
        let result = self
            .write(|rows| -> Result<Counters, CounterStoreError> {
                let counters = rows.entry(user_id.clone()).or_default();
                let updated = counters.checked_add(category, delta).ok_or_else(|| CounterStoreError::Overflow {
                    user_id: user_id.clone(),
                    category,
                })?;
                *counters = updated;
                Ok(updated)
            })
            .and_then(|result| result);
        Box::pin(async move { result })
    }

    fn set_all(&self, user_id: &UserId, counters: Counters) -> StoreFuture<'_, ()> {
        let result = self.write(|rows| {
            rows.insert(user_id.clone(), counters);
        });
        Box::pin(async move { result })
    }

    fn get(&self, user_id: &UserId) -> StoreFuture<'_, Counters> {
        let result = self.read(|rows| rows.get(user_id).copied().unwrap_or_default());
        Box::pin(async move { result })
    }

    fn top(&self, limit: usize) -> StoreFuture<'_, Vec<CounterRecord>> {
        let result = self.read(|rows| {
            let mut records: Vec<CounterRecord> =
                rows.iter().map(|(u, c)| CounterRecord::new(u.clone(), *c)).collect();
            // Stable sort keeps user-id order among ties
            records.sort_by(|a, b| b.total().cmp(&a.total()));
            records.truncate(limit);
            records
        });
        Box::pin(async move { result })
    }

    fn sum_all(&self) -> StoreFuture<'_, Counters> {
        let result = self.read(|rows| rows.values().copied().sum());
        Box::pin(async move { result })
    }

    fn all(&self) -> StoreFuture<'_, Vec<CounterRecord>> {
        let result = self.read(|rows| rows.iter().map(|(u, c)| CounterRecord::new(u.clone(), *c)).collect());
        Box::pin(async move { result })
    }

    fn wipe_all(&self) -> StoreFuture<'_, u64> {
        let result = self.write(|rows| {
            let removed = u64::try_from(rows.len()).unwrap_or(u64::MAX);
            rows.clear();
            removed
        });
        Box::pin(async move { result })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        let result = self.read(|_| ());
        Box::pin(async move { result })
    }
}
