//! Age-based cleanup of stored documents.

use std::fs::DirEntry;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::config::RetentionConfig;
use crate::store::{is_document_file, is_staging_file};

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Removed, or already gone by the time we got to them
    pub deleted: usize,
    pub retained: usize,
    pub failed: usize,
}

/// Deletes documents whose modification time is older than the retention
/// window. Content and references are never looked at.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    config: RetentionConfig,
    roots: Vec<PathBuf>,
}

impl RetentionSweeper {
    pub fn new(config: RetentionConfig, roots: Vec<PathBuf>) -> Self {
        Self { config, roots }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Sweep against the current time. Blocking.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now())
    }

    /// Sweep as if the clock read `now`.
    pub fn sweep_at(&self, now: SystemTime) -> SweepReport {
        let cutoff = now
            .checked_sub(self.config.max_age())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut report = SweepReport::default();

        for root in &self.roots {
            let entries = match std::fs::read_dir(root) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("Skipping missing directory {}", root.display());
                    continue;
                }
                Err(e) => {
                    warn!("Cannot scan {}: {}", root.display(), e);
                    report.failed += 1;
                    continue;
                }
            };

            for entry in entries {
                match entry {
                    Ok(entry) => self.visit(&entry, cutoff, &mut report),
                    Err(e) => {
                        warn!("Cannot read entry in {}: {}", root.display(), e);
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            "Retention sweep: {} deleted, {} retained, {} failed",
            report.deleted, report.retained, report.failed
        );
        report
    }

    fn visit(&self, entry: &DirEntry, cutoff: SystemTime, report: &mut SweepReport) {
        let name = entry.file_name();
        let eligible = is_document_file(&name)
            || (self.config.include_staging && is_staging_file(&name));
        if !eligible || entry.file_type().is_ok_and(|t| !t.is_file()) {
            return;
        }

        let path = entry.path();
        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                report.deleted += 1;
                return;
            }
            Err(e) => {
                warn!("Cannot stat {}: {}", path.display(), e);
                report.failed += 1;
                return;
            }
        };

        if modified >= cutoff {
            report.retained += 1;
            return;
        }

        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted {} (age {:?})", path.display(), age(cutoff, modified));
                report.deleted += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => report.deleted += 1,
            Err(e) => {
                warn!("Failed to delete {}: {}", path.display(), e);
                report.failed += 1;
            }
        }
    }
}

fn age(cutoff: SystemTime, modified: SystemTime) -> Duration {
    cutoff.duration_since(modified).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn sweeper(roots: Vec<PathBuf>) -> RetentionSweeper {
        RetentionSweeper::new(RetentionConfig::default(), roots)
    }

    fn touch(path: &std::path::Path, age: Duration) {
        let file = File::create(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_old_deleted_new_retained() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("old.pdf");
        let new = dir.path().join("new.pdf");
        touch(&old, DAY * 2);
        touch(&new, Duration::from_secs(60));

        let report = sweeper(vec![dir.path().to_path_buf()]).sweep();

        assert_eq!(report, SweepReport { deleted: 1, retained: 1, failed: 0 });
        assert!(!old.exists());
        assert!(new.exists());
    }

    #[test]
    fn test_clock_moves_forward() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("doc.pdf");
        touch(&file, Duration::ZERO);
        let sweeper = sweeper(vec![dir.path().to_path_buf()]);

        assert_eq!(sweeper.sweep().retained, 1);
        assert_eq!(sweeper.sweep_at(SystemTime::now() + DAY * 2).deleted, 1);
        assert!(!file.exists());
    }

    #[test]
    fn test_missing_directory_is_skipped() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("present");
        std::fs::create_dir(&present).unwrap();
        touch(&present.join("a.pdf"), DAY * 3);

        let report = sweeper(vec![dir.path().join("absent"), present.clone()]).sweep();

        assert_eq!(report, SweepReport { deleted: 1, retained: 0, failed: 0 });
    }

    #[test]
    fn test_other_files_untouched() {
        let dir = TempDir::new().unwrap();
        let notes = dir.path().join("notes.txt");
        let nested = dir.path().join("nested.pdf");
        touch(&notes, DAY * 3);
        std::fs::create_dir(&nested).unwrap();

        let report = sweeper(vec![dir.path().to_path_buf()]).sweep();

        assert_eq!(report, SweepReport::default());
        assert!(notes.exists());
        assert!(nested.exists());
    }

    #[test]
    fn test_expired_directory_named_like_document_is_skipped() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested.pdf");
        std::fs::create_dir(&nested).unwrap();

        let report = sweeper(vec![dir.path().to_path_buf()])
            .sweep_at(SystemTime::now() + DAY * 3);

        assert_eq!(report, SweepReport::default());
        assert!(nested.is_dir());
    }

    #[test]
    fn test_staging_files() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("abc.pdf.part");
        touch(&staging, DAY * 2);
        let roots = vec![dir.path().to_path_buf()];

        let keep_staging = RetentionConfig {
            include_staging: false,
            ..RetentionConfig::default()
        };
        let report = RetentionSweeper::new(keep_staging, roots.clone()).sweep();
        assert_eq!(report, SweepReport::default());
        assert!(staging.exists());

        let report = sweeper(roots).sweep();
        assert_eq!(report.deleted, 1);
        assert!(!staging.exists());
    }

    #[test]
    fn test_zero_age_boundary_is_retained() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("doc.pdf");
        File::create(&file).unwrap();
        let modified = std::fs::metadata(&file).unwrap().modified().unwrap();

        // Exactly at the cutoff is not older than it.
        let report = sweeper(vec![dir.path().to_path_buf()]).sweep_at(modified + DAY);
        assert_eq!(report.retained, 1);
    }
}
