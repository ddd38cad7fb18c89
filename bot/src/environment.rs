//! Injected dependencies of the interaction reducer.

use std::sync::Arc;
use std::time::Duration;
use tally_core::access::RoleGate;
use tally_core::backup::Archive;
use tally_core::counters::CounterStore;
use tally_core::environment::Clock;

/// Default number of members on the leaderboard.
pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;

/// Default limit on delivering a backup report.
pub const DEFAULT_BACKUP_TIMEOUT: Duration = Duration::from_millis(1500);

/// Environment for [`InteractionReducer`](crate::reducer::InteractionReducer).
///
/// Every collaborator sits behind a trait object so production wiring and
/// tests differ only in what is passed to [`BotEnvironment::new`].
#[derive(Clone)]
pub struct BotEnvironment {
    /// Counter persistence
    pub counters: Arc<dyn CounterStore>,
    /// Destination for pre-wipe reports
    pub archive: Arc<dyn Archive>,
    /// Timestamps for reports
    pub clock: Arc<dyn Clock>,
    /// Staff role check
    pub gate: RoleGate,
    /// Members shown on the leaderboard
    pub leaderboard_size: usize,
    /// How long a backup delivery may take before the wipe proceeds without it
    pub backup_timeout: Duration,
}

impl BotEnvironment {
    /// Create an environment with the default leaderboard size and backup timeout.
    #[must_use]
    pub fn new(
        counters: Arc<dyn CounterStore>,
        archive: Arc<dyn Archive>,
        clock: Arc<dyn Clock>,
        gate: RoleGate,
    ) -> Self {
        Self {
            counters,
            archive,
            clock,
            gate,
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
            backup_timeout: DEFAULT_BACKUP_TIMEOUT,
        }
    }

    /// Override the leaderboard size.
    #[must_use]
    pub fn with_leaderboard_size(mut self, size: usize) -> Self {
        self.leaderboard_size = size;
        self
    }

    /// Override the backup delivery timeout.
    #[must_use]
    pub fn with_backup_timeout(mut self, timeout: Duration) -> Self {
        self.backup_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for BotEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotEnvironment")
            .field("gate", &self.gate)
            .field("leaderboard_size", &self.leaderboard_size)
            .field("backup_timeout", &self.backup_timeout)
            .finish_non_exhaustive()
    }
}
