//! Recording archive for testing.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tally_core::backup::{Archive, ArchiveError, BackupReport};

/// Archive that keeps every delivered report in memory.
///
/// Can be switched to refuse deliveries, standing in for an unreachable
/// backup channel.
#[derive(Debug, Clone, Default)]
pub struct RecordingArchive {
    delivered: Arc<Mutex<Vec<BackupReport>>>,
    offline: Arc<AtomicBool>,
}

impl RecordingArchive {
    /// Create an archive that accepts every report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an archive that refuses every report.
    #[must_use]
    pub fn offline() -> Self {
        let archive = Self::default();
        archive.set_offline(true);
        archive
    }

    /// Switch delivery failure on or off.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Reports delivered so far, oldest first.
    #[must_use]
    pub fn delivered(&self) -> Vec<BackupReport> {
        self.delivered.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

impl Archive for RecordingArchive {
    fn deliver<'a>(
        &'a self,
        report: &'a BackupReport,
    ) -> Pin<Box<dyn Future<Output = Result<(), ArchiveError>> + Send + 'a>> {
        Box::pin(async move {
            if self.offline.load(Ordering::SeqCst) {
                return Err(ArchiveError::Unreachable("archive offline".to_string()));
            }
            self.delivered
                .lock()
                .map_err(|_| ArchiveError::Unreachable("Mutex lock failed".to_string()))?
                .push(report.clone());
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tally_core::DateTime;

    #[tokio::test]
    async fn test_records_until_offline() {
        let archive = RecordingArchive::new();
        let report = BackupReport::new(vec![], DateTime::default());

        archive.deliver(&report).await.unwrap();
        archive.set_offline(true);
        assert!(archive.deliver(&report).await.is_err());

        assert_eq!(archive.delivered(), vec![report]);
    }
}
