//! # Tally Testing
//!
//! Testing utilities and helpers for Tally.
//!
//! This crate provides:
//! - In-memory implementations of the environment traits
//! - A Given-When-Then harness for reducers
//! - Helpers that run effects and collect the actions they produce
//! - Property-based testing strategies for domain types
//!
//! ## Example
//!
//! ```ignore
//! use tally_testing::{InMemoryCounterStore, RecordingArchive, test_clock};
//! use tally_runtime::Store;
//!
//! #[tokio::test]
//! async fn test_panel() {
//!     let counters = Arc::new(InMemoryCounterStore::new());
//!     let env = BotEnvironment::new(counters.clone(), Arc::new(RecordingArchive::new()), test_clock(), gate);
//!     let store = Store::new(BotState::default(), InteractionReducer::new(), env);
//!     // ...
//! }
//! ```

use chrono::{DateTime, Utc};
use tally_core::environment::Clock;

mod archive_mocks;
mod counter_mocks;

pub use archive_mocks::RecordingArchive;
pub use counter_mocks::InMemoryCounterStore;
pub use reducer_test::{ReducerTest, assertions, run_effects};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    pub use super::{InMemoryCounterStore, RecordingArchive};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use tally_testing::mocks::FixedClock;
    /// use tally_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default())
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use tally_core::counters::{Category, Counters, UserId};

    /// Any of the three categories.
    pub fn category() -> impl Strategy<Value = Category> {
        prop::sample::select(Category::ALL.to_vec())
    }

    /// Snowflake-like numeric user identifiers.
    pub fn user_id() -> impl Strategy<Value = UserId> {
        "[1-9][0-9]{16,18}".prop_map(UserId::new)
    }

    /// Counter triples in a range that never saturates when summed.
    pub fn counters() -> impl Strategy<Value = Counters> {
        (-10_000i64..10_000, -10_000i64..10_000, -10_000i64..10_000)
            .prop_map(|(coke, meth, weed)| Counters::new(coke, meth, weed))
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
