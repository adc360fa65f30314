// Local crates
use crate::parser::accumulator::ScanError;

// External crates
use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

/// Result of one modification check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Modification time matches the last attempted snapshot.
    Unchanged,
    /// The file changed; `content` is the full snapshot read just now.
    Changed {
        modified: SystemTime,
        content: String,
    },
    /// The file does not exist right now. Transient: poll again later.
    Missing,
}

/// Detects changes to a single log file by comparing modification
/// timestamps, and reads the whole file when it changed.
#[derive(Debug)]
pub struct FilePoller {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl FilePoller {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_modified: None,
        }
    }

    #[cfg(test)]
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// Check the file once.
    ///
    /// The cursor advances as soon as a changed snapshot is attempted, so a
    /// read error for a given modification is reported once and not retried
    /// until the file changes again. A missing file never moves the cursor.
    pub async fn check(&mut self) -> Result<PollOutcome, ScanError> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(PollOutcome::Missing),
            Err(e) => return Err(ScanError::from_io(&self.path, e)),
        };
        let modified = metadata
            .modified()
            .map_err(|e| ScanError::from_io(&self.path, e))?;

        if self.last_modified == Some(modified) {
            return Ok(PollOutcome::Unchanged);
        }

        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                self.last_modified = Some(modified);
                Ok(PollOutcome::Changed { modified, content })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(PollOutcome::Missing),
            Err(e) => {
                self.last_modified = Some(modified);
                Err(ScanError::from_io(&self.path, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, FileTimes};
    use std::path::Path;
    use std::time::Duration;

    fn set_mtime(path: &Path, mtime: SystemTime) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_times(FileTimes::new().set_modified(mtime)).unwrap();
    }

    #[tokio::test]
    async fn missing_then_changed_then_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nrMAC_stats.log");
        let mut poller = FilePoller::new(&path);

        assert_eq!(poller.check().await.unwrap(), PollOutcome::Missing);
        assert_eq!(poller.last_modified(), None);

        std::fs::write(&path, "UE RNTI a37f: average RSRP -75\n").unwrap();
        match poller.check().await.unwrap() {
            PollOutcome::Changed { content, modified } => {
                assert!(content.contains("a37f"));
                assert_eq!(poller.last_modified(), Some(modified));
            }
            other => panic!("expected change, got {other:?}"),
        }

        assert_eq!(poller.check().await.unwrap(), PollOutcome::Unchanged);
    }

    #[tokio::test]
    async fn new_modification_time_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nrMAC_stats.log");
        std::fs::write(&path, "first\n").unwrap();
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        set_mtime(&path, base);

        let mut poller = FilePoller::new(&path);
        assert!(matches!(poller.check().await.unwrap(), PollOutcome::Changed { .. }));

        std::fs::write(&path, "second\n").unwrap();
        set_mtime(&path, base + Duration::from_secs(1));
        match poller.check().await.unwrap() {
            PollOutcome::Changed { content, .. } => assert_eq!(content, "second\n"),
            other => panic!("expected change, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreadable_snapshot_errors_and_advances_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nrMAC_stats.log");
        std::fs::write(&path, b"UE RNTI \xff\xfe garbage\n").unwrap();
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        set_mtime(&path, mtime);

        let mut poller = FilePoller::new(&path);
        assert!(matches!(poller.check().await, Err(ScanError::Io { .. })));
        assert_eq!(poller.last_modified(), Some(mtime));

        // Same modification is not read again.
        assert_eq!(poller.check().await.unwrap(), PollOutcome::Unchanged);
    }

    #[tokio::test]
    async fn removed_file_is_missing_and_keeps_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nrMAC_stats.log");
        std::fs::write(&path, "x\n").unwrap();

        let mut poller = FilePoller::new(&path);
        poller.check().await.unwrap();
        let cursor = poller.last_modified();

        std::fs::remove_file(&path).unwrap();
        assert_eq!(poller.check().await.unwrap(), PollOutcome::Missing);
        assert_eq!(poller.last_modified(), cursor);
    }
}
