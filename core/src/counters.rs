//! Per-user counters and the storage abstraction behind them.
//!
//! A user who was never written has all-zero counters. Stores are free to keep
//! no row for such a user; readers never see the difference.
//!
//! # Implementations
//!
//! - `SqliteCounterStore` (in `tally-sqlite`): durable production store
//! - `InMemoryCounterStore` (in `tally-testing`): fast, deterministic testing

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use thiserror::Error;

/// Boxed future returned by [`CounterStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CounterStoreError>> + Send + 'a>>;

/// Error type for `UserId` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid user ID: {0}")]
pub struct ParseUserIdError(String);

/// Platform identifier of a chat member.
///
/// Treated as opaque: it may itself contain the codec separator, so nothing in
/// this crate splits or validates its inner structure.
///
/// # Examples
///
/// ```
/// use tally_core::counters::UserId;
///
/// let user = UserId::new("412298573618618368");
/// assert_eq!(user.mention(), "<@412298573618618368>");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create a new `UserId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the user ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Chat mention markup for this user.
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ParseUserIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseUserIdError("User ID cannot be empty".to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One of the three tracked counter categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Coke
    Coke,
    /// Meth
    Meth,
    /// Weed
    Weed,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Self; 3] = [Self::Coke, Self::Meth, Self::Weed];

    /// Stable lowercase tag, used in component identifiers and storage columns.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Coke => "coke",
            Self::Meth => "meth",
            Self::Weed => "weed",
        }
    }

    /// Human label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Coke => "Coke",
            Self::Meth => "Meth",
            Self::Weed => "Weed",
        }
    }

    /// Look a category up by its tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag() == tag)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The three counter values of one user.
///
/// Values are signed: increments are raw additions of whatever a member
/// typed, negative amounts included.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Counters {
    /// Coke counter
    pub coke: i64,
    /// Meth counter
    pub meth: i64,
    /// Weed counter
    pub weed: i64,
}

impl Counters {
    /// All counters at zero.
    pub const ZERO: Self = Self {
        coke: 0,
        meth: 0,
        weed: 0,
    };

    /// Create counters from the three values.
    #[must_use]
    pub const fn new(coke: i64, meth: i64, weed: i64) -> Self {
        Self { coke, meth, weed }
    }

    /// Value of one category.
    #[must_use]
    pub const fn get(&self, category: Category) -> i64 {
        match category {
            Category::Coke => self.coke,
            Category::Meth => self.meth,
            Category::Weed => self.weed,
        }
    }

    /// Counters with `delta` added to one category, or `None` when the
    /// result does not fit in an `i64`.
    #[must_use]
    pub const fn checked_add(self, category: Category, delta: i64) -> Option<Self> {
        let Self { coke, meth, weed } = self;
        match category {
            Category::Coke => match coke.checked_add(delta) {
                Some(coke) => Some(Self { coke, meth, weed }),
                None => None,
            },
            Category::Meth => match meth.checked_add(delta) {
                Some(meth) => Some(Self { coke, meth, weed }),
                None => None,
            },
            Category::Weed => match weed.checked_add(delta) {
                Some(weed) => Some(Self { coke, meth, weed }),
                None => None,
            },
        }
    }

    /// Sum of all three categories.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.coke.saturating_add(self.meth).saturating_add(self.weed)
    }

    /// Whether every category is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.coke == 0 && self.meth == 0 && self.weed == 0
    }
}

/// Sums clamp to the `i64` bounds per category.
///
/// Accumulation is exact, so the result does not depend on the order of the
/// rows, only the final value is clamped.
impl std::iter::Sum for Counters {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        let (coke, meth, weed) = iter.fold((0i128, 0i128, 0i128), |(c, m, w), next| {
            (c + i128::from(next.coke), m + i128::from(next.meth), w + i128::from(next.weed))
        });
        Self::new(clamp(coke), clamp(meth), clamp(weed))
    }
}

fn clamp(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

/// A stored user together with their counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    /// Owner of the counters
    pub user_id: UserId,
    /// Current values
    pub counters: Counters,
}

impl CounterRecord {
    /// Create a new record.
    #[must_use]
    pub const fn new(user_id: UserId, counters: Counters) -> Self {
        Self { user_id, counters }
    }

    /// Sum of the record's three counters.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.counters.total()
    }
}

/// Read-only aggregate: the top-ranked users plus category sums over everyone.
///
/// Computed fresh for every request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboard {
    /// Highest totals first
    pub top: Vec<CounterRecord>,
    /// Per-category sums across all stored users
    pub totals: Counters,
}

impl Leaderboard {
    /// Grand total across every category and user.
    #[must_use]
    pub const fn grand_total(&self) -> i64 {
        self.totals.total()
    }
}

/// Errors that can occur during counter store operations.
#[derive(Error, Debug)]
pub enum CounterStoreError {
    /// Database connection or query error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// The increment would take a counter outside the `i64` range.
    ///
    /// Nothing was written.
    #[error("Counter {category} of user {user_id} would overflow")]
    Overflow {
        /// The row's key
        user_id: UserId,
        /// The category that would overflow
        category: Category,
    },

    /// Stored data could not be decoded.
    #[error("Corrupt row for user {user_id}: {reason}")]
    CorruptRow {
        /// The row's key
        user_id: UserId,
        /// What was wrong with it
        reason: String,
    },
}

/// Durable mapping from user to counters.
///
/// Every write is committed before the returned future resolves.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// to enable trait object usage (`Arc<dyn CounterStore>`), which effects
/// capture when they are built by the reducer.
pub trait CounterStore: Send + Sync {
    /// Add `delta` to one category of `user_id`, creating the row if absent.
    ///
    /// Implementations must apply the addition atomically at the storage layer
    /// so two concurrent increments for the same user both land. There is no
    /// deduplication: a retried call applies twice.
    ///
    /// # Returns
    ///
    /// The user's counters after the addition.
    ///
    /// # Errors
    ///
    /// - `Overflow`: the result does not fit in an `i64`; the row is unchanged
    /// - `DatabaseError`: the write failed
    fn increment(&self, user_id: &UserId, category: Category, delta: i64) -> StoreFuture<'_, Counters>;

    /// Replace all three counters of `user_id`.
    ///
    /// Resetting a user is `set_all(user, Counters::ZERO)`.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: the write failed
    fn set_all(&self, user_id: &UserId, counters: Counters) -> StoreFuture<'_, ()>;

    /// Counters of `user_id`, zero when the user was never written.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: the read failed (absence is not an error)
    fn get(&self, user_id: &UserId) -> StoreFuture<'_, Counters>;

    /// Up to `limit` records ordered by total, highest first.
    ///
    /// Ties come back in an unspecified but stable order.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: the read failed
    fn top(&self, limit: usize) -> StoreFuture<'_, Vec<CounterRecord>>;

    /// Per-category sums across every stored record (zero when empty).
    ///
    /// Sums outside the `i64` range are clamped to its bounds.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: the read failed
    fn sum_all(&self) -> StoreFuture<'_, Counters>;

    /// Every stored record, ordered by user ID.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: the read failed
    fn all(&self) -> StoreFuture<'_, Vec<CounterRecord>>;

    /// Delete every record and return how many were removed.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: the delete failed
    fn wipe_all(&self) -> StoreFuture<'_, u64>;

    /// Cheapest round trip to the backing storage, for readiness checks.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: the storage did not answer
    fn ping(&self) -> StoreFuture<'_, ()>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_category_tags_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_tag(category.tag()), Some(category));
        }
        assert_eq!(Category::from_tag("wiet"), None);
        assert_eq!(Category::from_tag("COKE"), None);
    }

    #[test]
    fn test_add_allows_negative_values() {
        let counters = Counters::ZERO
            .checked_add(Category::Meth, 3)
            .and_then(|c| c.checked_add(Category::Meth, -10))
            .unwrap();
        assert_eq!(counters, Counters::new(0, -7, 0));
        assert_eq!(counters.total(), -7);
    }

    #[test]
    fn test_checked_add_refuses_overflow_both_ways() {
        let high = Counters::new(i64::MAX, 0, 0);
        assert_eq!(high.checked_add(Category::Coke, 1), None);
        assert_eq!(high.checked_add(Category::Meth, 1), Some(Counters::new(i64::MAX, 1, 0)));

        let low = Counters::new(0, 0, i64::MIN);
        assert_eq!(low.checked_add(Category::Weed, -1), None);
        assert_eq!(low.checked_add(Category::Weed, i64::MAX), Some(Counters::new(0, 0, -1)));
    }

    #[test]
    fn test_sum_of_counters() {
        let sum: Counters = [Counters::new(8, 0, 0), Counters::ZERO, Counters::new(12, 1, 2)]
            .into_iter()
            .sum();
        assert_eq!(sum, Counters::new(20, 1, 2));
        assert_eq!(sum.total(), 23);
    }

    #[test]
    fn test_sum_clamps_only_the_final_value() {
        let rows = [Counters::new(i64::MAX, i64::MIN, 0), Counters::new(1, -1, 5), Counters::new(-1, 1, 0)];
        assert_eq!(rows.into_iter().sum::<Counters>(), Counters::new(i64::MAX, i64::MIN, 5));

        let rows = [Counters::new(i64::MAX, 0, 0), Counters::new(1, 0, 0)];
        assert_eq!(rows.into_iter().sum::<Counters>(), Counters::new(i64::MAX, 0, 0));
    }

    #[test]
    fn test_user_id_from_str_rejects_empty() {
        assert!("".parse::<UserId>().is_err());
        assert_eq!("42".parse::<UserId>(), Ok(UserId::new("42")));
    }

    proptest! {
        #[test]
        fn prop_increments_commute(deltas in proptest::collection::vec(-1_000i64..1_000, 0..32)) {
            let forward = deltas.iter().try_fold(Counters::ZERO, |c, d| c.checked_add(Category::Coke, *d));
            let backward = deltas.iter().rev().try_fold(Counters::ZERO, |c, d| c.checked_add(Category::Coke, *d));
            prop_assert_eq!(forward, backward);
            prop_assert_eq!(forward.map(|c| c.coke), Some(deltas.iter().sum::<i64>()));
        }
    }
}
