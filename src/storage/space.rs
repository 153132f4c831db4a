// src/storage/space.rs
use log::{info, warn};

use crate::core::{StorageError, StorageResult};
use crate::storage::inventory::sort_oldest_first;
use crate::storage::{
    DiskUsage, Eviction, EvictionOutcome, FileRemover, VideoFileEntry, evict, format_bytes,
};

/// Usage-triggered deletion, oldest first, until usage drops under the limit.
pub struct SpacePolicy {
    limit_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpaceOutcome {
    pub eviction: EvictionOutcome,
    pub limit_percent: f64,
    pub usage_before_percent: f64,
    pub usage_after_percent: f64,
}

impl SpacePolicy {
    pub fn new(limit_percent: f64) -> Self {
        Self { limit_percent }
    }

    pub fn limit_percent(&self) -> f64 {
        self.limit_percent
    }

    /// used/total >= limit, kept in multiplied form so 600MB of 1GB at 60% is exact.
    fn over_limit(&self, used: u64, total: u64) -> bool {
        used as f64 * 100.0 >= self.limit_percent * total as f64
    }

    /// Runs against a running in-memory `used` figure; the filesystem is not
    /// re-measured between deletions. Only successful deletions lower it.
    pub fn apply(
        &self,
        entries: &[VideoFileEntry],
        usage: DiskUsage,
        remover: &dyn FileRemover,
    ) -> StorageResult<SpaceOutcome> {
        let total = usage.total_bytes;
        if total == 0 {
            return Err(StorageError::measurement(
                "<capacity>",
                "total capacity is zero",
            ));
        }

        let percent = |used: u64| used as f64 / total as f64 * 100.0;
        let mut used = usage.used_bytes;
        let mut outcome = SpaceOutcome {
            eviction: EvictionOutcome::default(),
            limit_percent: self.limit_percent,
            usage_before_percent: percent(used),
            usage_after_percent: percent(used),
        };

        if !self.over_limit(used, total) {
            info!(
                "[space] usage {:.1}% under limit {:.1}%",
                outcome.usage_before_percent, self.limit_percent
            );
            return Ok(outcome);
        }

        let mut candidates = entries.to_vec();
        sort_oldest_first(&mut candidates);

        for entry in &candidates {
            if !self.over_limit(used, total) {
                break;
            }
            if let Eviction::Deleted(size) = evict(entry, remover, "space", &mut outcome.eviction) {
                used = used.saturating_sub(size);
            }
        }

        outcome.usage_after_percent = percent(used);

        if self.over_limit(used, total) {
            warn!(
                "[space] still at {:.1}% (limit {:.1}%) after removing {} files",
                outcome.usage_after_percent, self.limit_percent, outcome.eviction.files_deleted
            );
        } else {
            info!(
                "[space] {:.1}% -> {:.1}%, removed {} files ({})",
                outcome.usage_before_percent,
                outcome.usage_after_percent,
                outcome.eviction.files_deleted,
                format_bytes(outcome.eviction.bytes_freed)
            );
        }

        Ok(outcome)
    }
}
