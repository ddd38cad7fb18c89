//! Snapshot taken before a full wipe, and where it is sent.
//!
//! Delivery is best effort. A failed delivery is reported to the caller, who
//! logs it and wipes anyway.

use crate::counters::CounterRecord;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Rendered when there is nothing to back up.
pub const EMPTY_REPORT: &str = "No data available.";

/// Title used for the archived report.
pub const REPORT_TITLE: &str = "Backup before full reset";

/// Errors from delivering a report to the archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The destination could not be reached.
    #[error("Archive unreachable: {0}")]
    Unreachable(String),

    /// The destination answered but refused the report.
    #[error("Archive rejected report ({status}): {body}")]
    Rejected {
        /// Status returned by the destination
        status: u16,
        /// Response body, for logging
        body: String,
    },
}

/// Plain-text snapshot of every record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackupReport {
    records: Vec<CounterRecord>,
    taken_at: DateTime<Utc>,
}

impl BackupReport {
    /// Create a report from a full read of the store.
    #[must_use]
    pub const fn new(records: Vec<CounterRecord>, taken_at: DateTime<Utc>) -> Self {
        Self { records, taken_at }
    }

    /// When the snapshot was taken.
    #[must_use]
    pub const fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Number of users in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot holds no users.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// One line per user: mention and the three counters.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| {
                format!(
                    "{} — C:{} M:{} W:{}",
                    r.user_id.mention(),
                    r.counters.coke,
                    r.counters.meth,
                    r.counters.weed
                )
            })
            .collect()
    }

    /// The whole report as text.
    #[must_use]
    pub fn render(&self) -> String {
        if self.records.is_empty() {
            return EMPTY_REPORT.to_string();
        }
        self.lines().join("\n")
    }

    /// The report split into pieces of at most `limit` characters, breaking
    /// only between lines.
    ///
    /// A single line longer than `limit` is kept whole in its own piece.
    #[must_use]
    pub fn chunks(&self, limit: usize) -> Vec<String> {
        if self.records.is_empty() {
            return vec![EMPTY_REPORT.to_string()];
        }

        let mut chunks = Vec::new();
        let mut current = String::new();
        for line in self.lines() {
            let needed = if current.is_empty() {
                line.chars().count()
            } else {
                current.chars().count() + 1 + line.chars().count()
            };
            if needed > limit && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(&line);
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

/// Destination for pre-wipe reports.
pub trait Archive: Send + Sync {
    /// Deliver a report.
    ///
    /// # Errors
    ///
    /// - `Unreachable`: the destination could not be contacted
    /// - `Rejected`: the destination refused the report
    fn deliver<'a>(
        &'a self,
        report: &'a BackupReport,
    ) -> Pin<Box<dyn Future<Output = Result<(), ArchiveError>> + Send + 'a>>;
}
