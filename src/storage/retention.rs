// src/storage/retention.rs
use std::time::{Duration, SystemTime};

use log::info;

use crate::core::timestamp::days;
use crate::storage::{Eviction, EvictionOutcome, FileRemover, VideoFileEntry, evict, format_bytes};

/// Age-based deletion, independent of disk usage.
pub struct RetentionPolicy {
    retention: Duration,
}

/// Outcome plus every entry the pass did not delete, in input order.
#[derive(Debug, Clone, Default)]
pub struct RetentionPass {
    pub outcome: EvictionOutcome,
    pub survivors: Vec<VideoFileEntry>,
}

impl RetentionPolicy {
    pub fn new(retention_days: u32) -> Self {
        Self {
            retention: days(retention_days),
        }
    }

    pub fn cutoff(&self, now: SystemTime) -> SystemTime {
        now.checked_sub(self.retention).unwrap_or(SystemTime::UNIX_EPOCH)
    }

    /// Strictly older than the cutoff is deleted; exactly at the cutoff is kept.
    pub fn is_expired(&self, entry: &VideoFileEntry, now: SystemTime) -> bool {
        entry.modified < self.cutoff(now)
    }

    pub fn apply(
        &self,
        entries: &[VideoFileEntry],
        now: SystemTime,
        remover: &dyn FileRemover,
    ) -> RetentionPass {
        let mut pass = RetentionPass::default();

        for entry in entries {
            if !self.is_expired(entry, now) {
                pass.survivors.push(entry.clone());
                continue;
            }

            // nicht löschbare Dateien bleiben Kandidaten für die Space-Policy
            if evict(entry, remover, "age", &mut pass.outcome) == Eviction::Failed {
                pass.survivors.push(entry.clone());
            }
        }

        if pass.outcome.files_deleted > 0 {
            info!(
                "[retention] removed {} files older than {} days ({})",
                pass.outcome.files_deleted,
                self.retention.as_secs() / 86_400,
                format_bytes(pass.outcome.bytes_freed)
            );
        } else {
            info!(
                "[retention] nothing older than {} days",
                self.retention.as_secs() / 86_400
            );
        }

        pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::RecordingRemover;
    use std::path::PathBuf;

    const DAY: u64 = 86_400;

    fn aged(name: &str, now: SystemTime, age_days: u64) -> VideoFileEntry {
        VideoFileEntry {
            path: PathBuf::from(name),
            size_bytes: age_days * 1000,
            modified: now - Duration::from_secs(age_days * DAY),
        }
    }

    #[test]
    fn deletes_only_files_past_retention() {
        let now = SystemTime::now();
        let entries = vec![
            aged("a.mp4", now, 20),
            aged("b.mp4", now, 10),
            aged("c.mp4", now, 5),
            aged("d.avi", now, 50),
        ];
        let remover = RecordingRemover::new();

        let pass = RetentionPolicy::new(15).apply(&entries, now, &remover);

        let mut removed = remover.removed();
        removed.sort();
        assert_eq!(removed, vec![PathBuf::from("a.mp4"), PathBuf::from("d.avi")]);
        assert_eq!(pass.outcome.files_deleted, 2);
        assert_eq!(pass.outcome.bytes_freed, 70_000);

        let survivors: Vec<_> = pass.survivors.iter().map(|e| e.path.clone()).collect();
        assert_eq!(survivors, vec![PathBuf::from("b.mp4"), PathBuf::from("c.mp4")]);
    }

    #[test]
    fn entry_exactly_at_cutoff_is_kept() {
        let now = SystemTime::now();
        let policy = RetentionPolicy::new(15);
        let at_cutoff = aged("edge.mp4", now, 15);
        let just_past = VideoFileEntry {
            modified: at_cutoff.modified - Duration::from_nanos(1_000),
            ..aged("past.mp4", now, 15)
        };

        assert!(!policy.is_expired(&at_cutoff, now));
        assert!(policy.is_expired(&just_past, now));
    }

    #[test]
    fn one_failure_does_not_stop_the_pass() {
        let now = SystemTime::now();
        let entries = vec![
            aged("a.mp4", now, 30),
            aged("b.mp4", now, 40),
            aged("c.mp4", now, 50),
        ];
        let remover = RecordingRemover::new().failing_on("b.mp4");

        let pass = RetentionPolicy::new(15).apply(&entries, now, &remover);

        assert_eq!(remover.attempted().len(), 3);
        assert_eq!(pass.outcome.files_deleted, 2);
        assert_eq!(pass.outcome.bytes_freed, 80_000);
        assert_eq!(pass.outcome.failed, vec![PathBuf::from("b.mp4")]);
        assert_eq!(pass.survivors.len(), 1);
    }

    #[test]
    fn vanished_file_counts_as_satisfied() {
        let now = SystemTime::now();
        let entries = vec![aged("gone.mp4", now, 30)];
        let remover = RecordingRemover::new().missing_on("gone.mp4");

        let pass = RetentionPolicy::new(15).apply(&entries, now, &remover);

        assert_eq!(pass.outcome.files_deleted, 0);
        assert_eq!(pass.outcome.already_gone, 1);
        assert!(pass.outcome.failed.is_empty());
        assert!(pass.survivors.is_empty());
    }
}
