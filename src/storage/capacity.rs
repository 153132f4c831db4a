// src/storage/capacity.rs
use std::path::Path;
use std::sync::Arc;

use log::info;
use nix::sys::statvfs::statvfs;

use crate::core::{StorageError, StorageResult};
use crate::storage::format_bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

impl DiskUsage {
    pub fn free_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.used_bytes)
    }

    /// `None` when the total is zero.
    pub fn percent(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        Some(self.used_bytes as f64 / self.total_bytes as f64 * 100.0)
    }
}

pub trait CapacityProbe: Send + Sync {
    fn measure(&self, dir: &Path) -> StorageResult<DiskUsage>;
}

/// Real numbers for the filesystem holding `dir`, computed like `df`:
/// used = (blocks - free blocks) × fragment size.
pub struct StatvfsProbe;

impl CapacityProbe for StatvfsProbe {
    fn measure(&self, dir: &Path) -> StorageResult<DiskUsage> {
        let stat = statvfs(dir).map_err(|e| StorageError::measurement(dir, e.to_string()))?;

        let frsize = stat.fragment_size() as u64;
        let blocks = stat.blocks() as u64;
        let free = stat.blocks_free() as u64;

        Ok(DiskUsage {
            total_bytes: blocks * frsize,
            used_bytes: blocks.saturating_sub(free) * frsize,
        })
    }
}

/// Overrides the total with a fixed size; "used" still comes from `inner`.
pub struct SimulatedCapacity {
    total_bytes: u64,
    inner: Arc<dyn CapacityProbe>,
}

impl SimulatedCapacity {
    pub fn new(total_bytes: u64, inner: Arc<dyn CapacityProbe>) -> Self {
        Self { total_bytes, inner }
    }
}

impl CapacityProbe for SimulatedCapacity {
    fn measure(&self, dir: &Path) -> StorageResult<DiskUsage> {
        let real = self.inner.measure(dir)?;
        info!(
            "[storage] simulated total {} (real total {})",
            format_bytes(self.total_bytes),
            format_bytes(real.total_bytes)
        );
        Ok(DiskUsage {
            total_bytes: self.total_bytes,
            used_bytes: real.used_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::FixedCapacity;

    #[test]
    fn statvfs_reports_consistent_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let usage = StatvfsProbe.measure(dir.path()).unwrap();
        assert!(usage.total_bytes > 0);
        assert!(usage.used_bytes <= usage.total_bytes);
    }

    #[test]
    fn statvfs_on_missing_path_is_measurement_error() {
        let err = StatvfsProbe
            .measure(Path::new("/definitely/not/here"))
            .unwrap_err();
        assert!(matches!(err, StorageError::MeasurementError { .. }));
    }

    #[test]
    fn simulated_total_keeps_real_used() {
        let probe = SimulatedCapacity::new(1_000, Arc::new(FixedCapacity::new(50_000, 700)));
        let usage = probe.measure(Path::new("/")).unwrap();
        assert_eq!(usage.total_bytes, 1_000);
        assert_eq!(usage.used_bytes, 700);
        assert_eq!(usage.free_bytes(), 300);
    }

    #[test]
    fn percent_of_zero_total_is_none() {
        let usage = DiskUsage {
            total_bytes: 0,
            used_bytes: 10,
        };
        assert!(usage.percent().is_none());
    }
}
