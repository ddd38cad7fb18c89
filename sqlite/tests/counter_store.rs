//! Integration tests for the `SQLite` counter store, against in-memory databases.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use futures::future::join_all;
use proptest::prelude::*;
use tally_core::counters::{Category, CounterRecord, CounterStore, CounterStoreError, Counters, UserId};
use tally_sqlite::SqliteCounterStore;
use tally_testing::properties;

async fn store() -> SqliteCounterStore {
    // One connection: every connection to :memory: is its own database
    let store = SqliteCounterStore::connect("sqlite::memory:", 1).await.unwrap();
    store.migrate().await.unwrap();
    store
}

fn user(id: &str) -> UserId {
    UserId::new(id)
}

#[tokio::test]
async fn test_never_written_user_reads_as_zero() {
    let store = store().await;
    assert_eq!(store.get(&user("1")).await.unwrap(), Counters::ZERO);
    assert!(store.all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_increment_creates_then_adds() {
    let store = store().await;

    let first = store.increment(&user("1"), Category::Coke, 5).await.unwrap();
    assert_eq!(first, Counters::new(5, 0, 0));

    let second = store.increment(&user("1"), Category::Coke, 3).await.unwrap();
    assert_eq!(second, Counters::new(8, 0, 0));

    let other = store.increment(&user("1"), Category::Weed, -2).await.unwrap();
    assert_eq!(other, Counters::new(8, 0, -2));
    assert_eq!(store.get(&user("1")).await.unwrap(), other);
}

#[tokio::test]
async fn test_set_all_overwrites_every_category() {
    let store = store().await;
    store.increment(&user("1"), Category::Meth, 40).await.unwrap();

    store.set_all(&user("1"), Counters::new(1, 2, 3)).await.unwrap();
    assert_eq!(store.get(&user("1")).await.unwrap(), Counters::new(1, 2, 3));

    store.set_all(&user("2"), Counters::ZERO).await.unwrap();
    assert_eq!(store.get(&user("2")).await.unwrap(), Counters::ZERO);
}

#[tokio::test]
async fn test_top_ranks_by_total_and_limits() {
    let store = store().await;
    store.set_all(&user("a"), Counters::new(8, 0, 0)).await.unwrap();
    store.set_all(&user("b"), Counters::new(12, 1, 2)).await.unwrap();
    store.set_all(&user("c"), Counters::new(0, 0, 1)).await.unwrap();

    let top = store.top(2).await.unwrap();
    assert_eq!(
        top,
        vec![
            CounterRecord::new(user("b"), Counters::new(12, 1, 2)),
            CounterRecord::new(user("a"), Counters::new(8, 0, 0)),
        ]
    );
    assert!(store.top(0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sum_all_over_every_row() {
    let store = store().await;
    assert_eq!(store.sum_all().await.unwrap(), Counters::ZERO);

    store.set_all(&user("a"), Counters::new(8, 0, 0)).await.unwrap();
    store.set_all(&user("b"), Counters::new(12, 1, 2)).await.unwrap();
    assert_eq!(store.sum_all().await.unwrap(), Counters::new(20, 1, 2));
}

#[tokio::test]
async fn test_overflowing_increment_is_refused_without_writing() {
    let store = store().await;
    store.increment(&user("1"), Category::Coke, i64::MAX).await.unwrap();

    let refused = store.increment(&user("1"), Category::Coke, 1).await;
    assert!(matches!(
        refused,
        Err(CounterStoreError::Overflow { category: Category::Coke, .. })
    ));

    // The row stays readable everywhere
    let expected = Counters::new(i64::MAX, 0, 0);
    assert_eq!(store.get(&user("1")).await.unwrap(), expected);
    assert_eq!(store.top(10).await.unwrap(), vec![CounterRecord::new(user("1"), expected)]);
    assert_eq!(store.all().await.unwrap().len(), 1);

    // Other categories of the same row still accept writes
    assert_eq!(
        store.increment(&user("1"), Category::Meth, 1).await.unwrap(),
        Counters::new(i64::MAX, 1, 0)
    );
    assert_eq!(
        store.increment(&user("1"), Category::Coke, -1).await.unwrap(),
        Counters::new(i64::MAX - 1, 1, 0)
    );
}

#[tokio::test]
async fn test_negative_overflow_is_refused() {
    let store = store().await;
    store.increment(&user("1"), Category::Weed, i64::MIN).await.unwrap();

    assert!(matches!(
        store.increment(&user("1"), Category::Weed, -1).await,
        Err(CounterStoreError::Overflow { category: Category::Weed, .. })
    ));
    assert_eq!(store.get(&user("1")).await.unwrap(), Counters::new(0, 0, i64::MIN));

    store.increment(&user("2"), Category::Weed, -5).await.unwrap();
    assert!(store.increment(&user("2"), Category::Weed, i64::MIN).await.is_err());
    assert_eq!(
        store.increment(&user("2"), Category::Weed, i64::MIN + 5).await.unwrap(),
        Counters::new(0, 0, i64::MIN)
    );
}

#[tokio::test]
async fn test_sum_all_clamps_instead_of_failing() {
    let store = store().await;
    store.set_all(&user("a"), Counters::new(i64::MAX, i64::MIN, 0)).await.unwrap();
    store.set_all(&user("b"), Counters::new(1, -1, 7)).await.unwrap();

    assert_eq!(store.sum_all().await.unwrap(), Counters::new(i64::MAX, i64::MIN, 7));

    store.set_all(&user("c"), Counters::new(-1, 1, 0)).await.unwrap();
    assert_eq!(store.sum_all().await.unwrap(), Counters::new(i64::MAX, i64::MIN, 7));
}

#[tokio::test]
async fn test_wipe_removes_everything() {
    let store = store().await;
    store.set_all(&user("a"), Counters::new(8, 0, 0)).await.unwrap();
    store.set_all(&user("b"), Counters::new(0, 0, 0)).await.unwrap();

    assert_eq!(store.wipe_all().await.unwrap(), 2);
    assert!(store.all().await.unwrap().is_empty());
    assert_eq!(store.wipe_all().await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_increments_all_land() {
    let store = store().await;
    let target = user("412298573618618368");

    let results = join_all((0..50).map(|_| store.increment(&target, Category::Meth, 2))).await;
    assert!(results.iter().all(Result::is_ok));

    assert_eq!(store.get(&target).await.unwrap().meth, 100);
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let store = store().await;
    store.migrate().await.unwrap();
    store.ping().await.unwrap();
}

#[tokio::test]
async fn test_ping_fails_once_the_pool_is_closed() {
    let store = store().await;
    store.close().await;
    assert!(matches!(store.ping().await, Err(CounterStoreError::DatabaseError(_))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_all_returns_what_was_set(rows in proptest::collection::btree_map(properties::user_id(), properties::counters(), 0..12)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let stored = runtime.block_on(async {
            let store = store().await;
            for (user_id, counters) in &rows {
                store.set_all(user_id, *counters).await.unwrap();
            }
            store.all().await.unwrap()
        });

        let expected: Vec<CounterRecord> = rows.into_iter().map(|(u, c)| CounterRecord::new(u, c)).collect();
        prop_assert_eq!(stored, expected);
    }
}
