// src/storage/manager.rs
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime};

use crate::core::lock::{lock_rwlock_read, lock_rwlock_write};
use crate::core::logging::{ComponentLogger, LogContext};
use crate::core::{StorageError, StorageResult};
use crate::storage::config::gb_to_bytes;
use crate::storage::{
    CapacityProbe, DiskUsage, EvictionOutcome, FileInventory, FileRemover, FsRemover,
    RetentionPolicy, SimulatedCapacity, SpaceOutcome, SpacePolicy, StatvfsProbe,
    StoragePolicyConfig, format_bytes,
};

/// Result of one retention-then-space pass.
#[derive(Debug)]
pub struct StorageReport {
    pub scanned: usize,
    pub retention: EvictionOutcome,
    /// `None` when measuring capacity failed; see `space_error`.
    pub space: Option<SpaceOutcome>,
    pub space_error: Option<StorageError>,
    pub elapsed: Duration,
}

impl StorageReport {
    pub fn files_deleted(&self) -> usize {
        self.retention.files_deleted
            + self.space.as_ref().map_or(0, |s| s.eviction.files_deleted)
    }

    pub fn bytes_freed(&self) -> u64 {
        self.retention.bytes_freed + self.space.as_ref().map_or(0, |s| s.eviction.bytes_freed)
    }
}

pub struct StorageManager {
    inventory: FileInventory,
    config: RwLock<StoragePolicyConfig>,
    probe: Arc<dyn CapacityProbe>,
    remover: Box<dyn FileRemover>,
}

impl StorageManager {
    /// Refuses a directory that does not exist.
    pub fn new(dir: impl AsRef<Path>, config: StoragePolicyConfig) -> StorageResult<Self> {
        let dir = dir.as_ref();
        config.validate()?;
        if !dir.is_dir() {
            return Err(StorageError::DirectoryNotFound(dir.to_path_buf()));
        }

        Ok(Self {
            inventory: FileInventory::new(dir, &config.extensions),
            config: RwLock::new(config),
            probe: Arc::new(StatvfsProbe),
            remover: Box::new(FsRemover),
        })
    }

    pub fn with_probe(mut self, probe: Arc<dyn CapacityProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_remover(mut self, remover: Box<dyn FileRemover>) -> Self {
        self.remover = remover;
        self
    }

    pub fn dir(&self) -> &Path {
        self.inventory.dir()
    }

    pub fn config(&self) -> StoragePolicyConfig {
        lock_rwlock_read(&self.config, "storage.config").clone()
    }

    /// `None` switches back to the real disk size. Invalid sizes keep the previous value.
    pub fn set_simulated_total_capacity_gb(&self, gb: Option<f64>) -> StorageResult<()> {
        let bytes = gb.map(gb_to_bytes).transpose()?;
        lock_rwlock_write(&self.config, "storage.set_simulated").simulated_total_capacity = bytes;

        match bytes {
            Some(b) => self.info(&format!("simulated total capacity set to {}", format_bytes(b))),
            None => self.info("using real disk capacity"),
        }
        Ok(())
    }

    pub fn set_space_limit_percent(&self, percent: f64) -> StorageResult<()> {
        let mut next = self.config();
        next.space_limit_percent = percent;
        next.validate()?;
        *lock_rwlock_write(&self.config, "storage.set_limit") = next;
        Ok(())
    }

    pub fn set_retention_days(&self, days: u32) -> StorageResult<()> {
        let mut next = self.config();
        next.retention_days = days;
        next.validate()?;
        *lock_rwlock_write(&self.config, "storage.set_retention") = next;
        Ok(())
    }

    /// Effective usage: real "used", total replaced when a simulated size is set.
    pub fn measure(&self) -> StorageResult<DiskUsage> {
        match self.config().simulated_total_capacity {
            Some(total) => SimulatedCapacity::new(total, Arc::clone(&self.probe)).measure(self.dir()),
            None => self.probe.measure(self.dir()),
        }
    }

    pub fn run(&self) -> StorageResult<StorageReport> {
        self.run_at(SystemTime::now())
    }

    /// Retention runs to completion first; the space policy only sees what survived it.
    /// A failed capacity measurement ends the pass after retention and is reported.
    pub fn run_at(&self, now: SystemTime) -> StorageResult<StorageReport> {
        let started = Instant::now();
        let config = self.config();

        if !self.dir().is_dir() {
            return Err(StorageError::DirectoryNotFound(self.dir().to_path_buf()));
        }

        let entries = self.inventory.list()?;
        let scanned = entries.len();
        self.debug(&format!("scanned {} video files", scanned));

        let retention = RetentionPolicy::new(config.retention_days).apply(
            &entries,
            now,
            self.remover.as_ref(),
        );

        let (space, space_error) = match self.measure().and_then(|usage| {
            SpacePolicy::new(config.space_limit_percent).apply(
                &retention.survivors,
                usage,
                self.remover.as_ref(),
            )
        }) {
            Ok(outcome) => (Some(outcome), None),
            Err(e) => {
                self.warn(&format!("space pass skipped: {}", e));
                (None, Some(e))
            }
        };

        let report = StorageReport {
            scanned,
            retention: retention.outcome,
            space,
            space_error,
            elapsed: started.elapsed(),
        };

        self.info(&format!(
            "pass done: {} files deleted, {} freed in {:?}",
            report.files_deleted(),
            format_bytes(report.bytes_freed()),
            report.elapsed
        ));

        Ok(report)
    }

    /// Runs a pass immediately and then every `interval` until `running` is cleared.
    /// Returns the number of completed passes.
    pub fn run_periodic(&self, interval: Duration, running: &AtomicBool) -> usize {
        let mut passes = 0;

        while running.load(Ordering::Relaxed) {
            match self.run() {
                Ok(_) => passes += 1,
                Err(e) => self.error(&format!("pass failed: {}", e)),
            }

            let next = Instant::now() + interval;
            while running.load(Ordering::Relaxed) && Instant::now() < next {
                std::thread::sleep(Duration::from_millis(100).min(interval));
            }
        }

        self.info("periodic cleanup stopped");
        passes
    }
}

impl ComponentLogger for StorageManager {
    fn log_context(&self) -> LogContext {
        LogContext::new("Storage", &self.dir().display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::{FixedCapacity, RecordingRemover};
    use std::fs;
    use std::path::PathBuf;

    const DAY: u64 = 86_400;

    fn write_aged(dir: &Path, name: &str, len: usize, age_days: u64) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, vec![1u8; len]).unwrap();
        let f = fs::File::options().write(true).open(&p).unwrap();
        f.set_modified(SystemTime::now() - Duration::from_secs(age_days * DAY))
            .unwrap();
        p
    }

    #[test]
    fn refuses_missing_directory() {
        let err = StorageManager::new("/definitely/not/here", StoragePolicyConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::DirectoryNotFound(_)));
    }

    #[test]
    fn rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = StoragePolicyConfig {
            space_limit_percent: 0.0,
            ..Default::default()
        };
        let err = StorageManager::new(dir.path(), cfg).err().unwrap();
        assert!(matches!(err, StorageError::InvalidConfig(_)));
    }

    #[test]
    fn retention_victims_never_reach_space_policy() {
        let dir = tempfile::tempdir().unwrap();
        write_aged(dir.path(), "old.mp4", 100, 30);
        write_aged(dir.path(), "mid.mp4", 100, 5);
        write_aged(dir.path(), "new.mp4", 100, 1);

        let remover = RecordingRemover::new();
        let log = remover.clone();
        // 65% belegt: ein Survivor (100 Bytes) reicht, um unter 60% zu kommen
        let manager = StorageManager::new(dir.path(), StoragePolicyConfig::default())
            .unwrap()
            .with_probe(Arc::new(FixedCapacity::new(1_000, 650)))
            .with_remover(Box::new(remover));

        let report = manager.run().unwrap();

        assert_eq!(report.scanned, 3);
        assert_eq!(report.retention.files_deleted, 1);
        let space = report.space.unwrap();
        assert_eq!(space.eviction.files_deleted, 1);

        let attempted = log.attempted();
        assert_eq!(attempted.len(), 2);
        assert!(attempted[0].ends_with("old.mp4"));
        assert!(attempted[1].ends_with("mid.mp4"));
    }

    #[test]
    fn measurement_error_is_reported_after_retention() {
        let dir = tempfile::tempdir().unwrap();
        write_aged(dir.path(), "old.mp4", 10, 30);

        let manager = StorageManager::new(dir.path(), StoragePolicyConfig::default())
            .unwrap()
            .with_probe(Arc::new(FixedCapacity::new(0, 0)))
            .with_remover(Box::new(RecordingRemover::new()));

        let report = manager.run().unwrap();
        assert_eq!(report.retention.files_deleted, 1);
        assert!(report.space.is_none());
        assert!(matches!(
            report.space_error,
            Some(StorageError::MeasurementError { .. })
        ));
    }

    #[test]
    fn simulated_capacity_replaces_total_only() {
        let dir = tempfile::tempdir().unwrap();
        let manager = StorageManager::new(dir.path(), StoragePolicyConfig::default())
            .unwrap()
            .with_probe(Arc::new(FixedCapacity::new(500 * 1024, 300)));

        assert_eq!(manager.measure().unwrap().total_bytes, 500 * 1024);

        manager.set_simulated_total_capacity_gb(Some(2.0)).unwrap();
        let usage = manager.measure().unwrap();
        assert_eq!(usage.total_bytes, 2 * 1024 * 1024 * 1024);
        assert_eq!(usage.used_bytes, 300);

        assert!(manager.set_simulated_total_capacity_gb(Some(-1.0)).is_err());
        assert_eq!(
            manager.config().simulated_total_capacity,
            Some(2 * 1024 * 1024 * 1024)
        );

        manager.set_simulated_total_capacity_gb(None).unwrap();
        assert_eq!(manager.measure().unwrap().total_bytes, 500 * 1024);
    }

    #[test]
    fn setters_keep_previous_value_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = StorageManager::new(dir.path(), StoragePolicyConfig::default()).unwrap();

        assert!(manager.set_space_limit_percent(150.0).is_err());
        assert!(manager.set_retention_days(0).is_err());
        assert_eq!(manager.config().space_limit_percent, 60.0);
        assert_eq!(manager.config().retention_days, 15);

        manager.set_retention_days(7).unwrap();
        assert_eq!(manager.config().retention_days, 7);
    }

    #[test]
    fn periodic_stops_when_flag_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(
            StorageManager::new(dir.path(), StoragePolicyConfig::default())
                .unwrap()
                .with_probe(Arc::new(FixedCapacity::new(1_000, 0))),
        );
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let manager = manager.clone();
            let running = running.clone();
            std::thread::spawn(move || manager.run_periodic(Duration::from_secs(3600), &running))
        };

        std::thread::sleep(Duration::from_millis(200));
        running.store(false, Ordering::Relaxed);
        let passes = handle.join().unwrap();
        assert_eq!(passes, 1);
    }
}
