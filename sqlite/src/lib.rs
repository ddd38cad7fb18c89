//! `SQLite` counter store for Tally.
//!
//! This crate provides the durable implementation of the `CounterStore` trait
//! from `tally-core`:
//!
//! - One row per user, created lazily on first write
//! - Increments applied by a single upsert, so concurrent writers never lose updates
//! - Embedded migrations
//!
//! # Example
//!
//! ```no_run
//! use tally_sqlite::SqliteCounterStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteCounterStore::connect("sqlite://tally.db?mode=rwc", 5).await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::str::FromStr;
use tally_core::counters::{
    Category, CounterRecord, CounterStore, CounterStoreError, Counters, StoreFuture, UserId,
};

/// `SQLite` counter store.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct SqliteCounterStore {
    pool: SqlitePool,
}

impl SqliteCounterStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `url`, creating the database file if missing.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the URL is invalid or the database cannot be opened.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, CounterStoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| CounterStoreError::DatabaseError(format!("Invalid database URL: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| CounterStoreError::DatabaseError(format!("Failed to connect: {e}")))?;

        tracing::info!(max_connections, "Connected to counter database");
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns error if migrations fail.
    pub async fn migrate(&self) -> Result<(), CounterStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CounterStoreError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Upsert that adds to one column and returns the row after the addition.
///
/// The update only applies while the stored value lies within `?3..=?4`, the
/// range in which adding the delta cannot overflow. Outside it no row is
/// returned and nothing is written.
const fn increment_sql(category: Category) -> &'static str {
    match category {
        Category::Coke => {
            r"
            INSERT INTO counters (user_id, coke) VALUES (?1, ?2)
            ON CONFLICT(user_id) DO UPDATE SET coke = coke + excluded.coke
            WHERE coke BETWEEN ?3 AND ?4
            RETURNING coke, meth, weed
            "
        },
        Category::Meth => {
            r"
            INSERT INTO counters (user_id, meth) VALUES (?1, ?2)
            ON CONFLICT(user_id) DO UPDATE SET meth = meth + excluded.meth
            WHERE meth BETWEEN ?3 AND ?4
            RETURNING coke, meth, weed
            "
        },
        Category::Weed => {
            r"
            INSERT INTO counters (user_id, weed) VALUES (?1, ?2)
            ON CONFLICT(user_id) DO UPDATE SET weed = weed + excluded.weed
            WHERE weed BETWEEN ?3 AND ?4
            RETURNING coke, meth, weed
            "
        },
    }
}

/// Stored values to which `delta` can be added without leaving the `i64` range.
const fn addable_range(delta: i64) -> (i64, i64) {
    let low = if delta < 0 { i64::MIN - delta } else { i64::MIN };
    let high = if delta > 0 { i64::MAX - delta } else { i64::MAX };
    (low, high)
}

fn db_error(context: &str, e: &sqlx::Error) -> CounterStoreError {
    CounterStoreError::DatabaseError(format!("{context}: {e}"))
}

fn counters_from_row(row: &SqliteRow, user_id: &UserId) -> Result<Counters, CounterStoreError> {
    let column = |name: &str| {
        row.try_get::<i64, _>(name).map_err(|e| CounterStoreError::CorruptRow {
            user_id: user_id.clone(),
            reason: format!("column {name}: {e}"),
        })
    };
    Ok(Counters::new(column("coke")?, column("meth")?, column("weed")?))
}

fn record_from_row(row: &SqliteRow) -> Result<CounterRecord, CounterStoreError> {
    let user_id: String = row
        .try_get("user_id")
        .map_err(|e| CounterStoreError::DatabaseError(format!("Unreadable user_id: {e}")))?;
    let user_id = UserId::new(user_id);
    let counters = counters_from_row(row, &user_id)?;
    Ok(CounterRecord::new(user_id, counters))
}

impl CounterStore for SqliteCounterStore {
    fn increment(&self, user_id: &UserId, category: Category, delta: i64) -> StoreFuture<'_, Counters> {
        let user_id = user_id.clone();
        Box::pin(async move {
            let (low, high) = addable_range(delta);
            let row = sqlx::query(increment_sql(category))
                .bind(user_id.as_str())
                .bind(delta)
                .bind(low)
                .bind(high)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to increment", &e))?;

            let Some(row) = row else {
                tracing::warn!(user = %user_id, category = %category, delta, "Refused overflowing increment");
                return Err(CounterStoreError::Overflow { user_id, category });
            };

            let counters = counters_from_row(&row, &user_id)?;
            metrics::counter!("counters.writes.total", "operation" => "increment").increment(1);
            tracing::debug!(user = %user_id, category = %category, delta, "Incremented counter");
            Ok(counters)
        })
    }

    fn set_all(&self, user_id: &UserId, counters: Counters) -> StoreFuture<'_, ()> {
        let user_id = user_id.clone();
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO counters (user_id, coke, meth, weed) VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(user_id) DO UPDATE SET
                    coke = excluded.coke,
                    meth = excluded.meth,
                    weed = excluded.weed
                ",
            )
            .bind(user_id.as_str())
            .bind(counters.coke)
            .bind(counters.meth)
            .bind(counters.weed)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to set counters", &e))?;

            metrics::counter!("counters.writes.total", "operation" => "set_all").increment(1);
            tracing::debug!(user = %user_id, ?counters, "Set counters");
            Ok(())
        })
    }

    fn get(&self, user_id: &UserId) -> StoreFuture<'_, Counters> {
        let user_id = user_id.clone();
        Box::pin(async move {
            let row = sqlx::query("SELECT coke, meth, weed FROM counters WHERE user_id = ?1")
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to get counters", &e))?;

            match row {
                Some(row) => counters_from_row(&row, &user_id),
                None => Ok(Counters::ZERO),
            }
        })
    }

    fn top(&self, limit: usize) -> StoreFuture<'_, Vec<CounterRecord>> {
        Box::pin(async move {
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let rows = sqlx::query(
                r"
                SELECT user_id, coke, meth, weed
                FROM counters
                ORDER BY (coke + meth + weed) DESC, user_id ASC
                LIMIT ?1
                ",
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load leaderboard", &e))?;

            rows.iter().map(record_from_row).collect()
        })
    }

    fn sum_all(&self) -> StoreFuture<'_, Counters> {
        Box::pin(async move {
            // SUM() aborts on integer overflow
            let rows = sqlx::query("SELECT user_id, coke, meth, weed FROM counters")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("Failed to sum counters", &e))?;

            rows.iter()
                .map(|row| record_from_row(row).map(|r| r.counters))
                .sum::<Result<Counters, CounterStoreError>>()
        })
    }

    fn all(&self) -> StoreFuture<'_, Vec<CounterRecord>> {
        Box::pin(async move {
            let rows = sqlx::query("SELECT user_id, coke, meth, weed FROM counters ORDER BY user_id ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("Failed to read counters", &e))?;

            rows.iter().map(record_from_row).collect()
        })
    }

    fn wipe_all(&self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let removed = sqlx::query("DELETE FROM counters")
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("Failed to wipe counters", &e))?
                .rows_affected();

            metrics::counter!("counters.wipes.total").increment(1);
            tracing::warn!(removed, "Wiped all counters");
            Ok(removed)
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("Ping failed", &e))?;
            Ok(())
        })
    }
}
