// src/storage/mod.rs
//
// Speicherhygiene für das Ausgabeverzeichnis: erst Alter (Retention),
// dann Belegung (Space). Beide Policies löschen best-effort; ein einzelner
// Fehler bricht den Durchlauf nie ab.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::core::StorageError;

pub mod capacity;
pub mod config;
pub mod inventory;
pub mod listing;
pub mod manager;
pub mod retention;
pub mod space;

pub use capacity::{CapacityProbe, DiskUsage, SimulatedCapacity, StatvfsProbe};
pub use config::{DEFAULT_EXTENSIONS, GB_SCALE, StoragePolicyConfig};
pub use inventory::{FileInventory, VideoFileEntry};
pub use listing::{NameRange, list_filenames};
pub use manager::{StorageManager, StorageReport};
pub use retention::{RetentionPass, RetentionPolicy};
pub use space::{SpaceOutcome, SpacePolicy};

/// Files deleted and bytes freed by one policy invocation.
/// Only successful deletions count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionOutcome {
    pub files_deleted: usize,
    pub bytes_freed: u64,
    /// Already gone when we tried (raced by another deleter).
    pub already_gone: usize,
    pub failed: Vec<PathBuf>,
}

impl EvictionOutcome {
    pub fn is_empty(&self) -> bool {
        self.files_deleted == 0
    }
}

/// Deletion seam; the default goes straight to the filesystem.
pub trait FileRemover: Send + Sync {
    fn remove(&self, path: &Path) -> std::io::Result<()>;
}

pub struct FsRemover;

impl FileRemover for FsRemover {
    fn remove(&self, path: &Path) -> std::io::Result<()> {
        std::fs::remove_file(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Eviction {
    Deleted(u64),
    AlreadyGone,
    Failed,
}

/// Deletes one entry and books it into `outcome`.
pub(crate) fn evict(
    entry: &VideoFileEntry,
    remover: &dyn FileRemover,
    reason: &str,
    outcome: &mut EvictionOutcome,
) -> Eviction {
    match remover.remove(&entry.path) {
        Ok(()) => {
            outcome.files_deleted += 1;
            outcome.bytes_freed += entry.size_bytes;
            debug!(
                "[storage] deleted ({}) {:?} ({} bytes)",
                reason, entry.path, entry.size_bytes
            );
            Eviction::Deleted(entry.size_bytes)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            outcome.already_gone += 1;
            debug!("[storage] {:?} already gone", entry.path);
            Eviction::AlreadyGone
        }
        Err(source) => {
            let err = StorageError::DeleteFailure {
                path: entry.path.clone(),
                source,
            };
            warn!("[storage] {}", err);
            outcome.failed.push(entry.path.clone());
            Eviction::Failed
        }
    }
}

/// Human readable byte count for log lines.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2}GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1}KB", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}
