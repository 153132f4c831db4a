use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::debug;

use crate::core::{StorageError, StorageResult};

/// One scanned video file. Recomputed on every scan, never updated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFileEntry {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

/// Flat (non-recursive) listing of video files in one directory.
#[derive(Debug, Clone)]
pub struct FileInventory {
    dir: PathBuf,
    extensions: Vec<String>,
}

impl FileInventory {
    pub fn new(dir: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            dir: dir.into(),
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_video(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_ascii_lowercase();
                self.extensions.iter().any(|x| *x == e)
            })
            .unwrap_or(false)
    }

    /// Entries sorted oldest first, ties broken by path.
    /// Files that vanish mid-scan are skipped.
    pub fn list(&self) -> StorageResult<Vec<VideoFileEntry>> {
        if !self.dir.is_dir() {
            return Err(StorageError::DirectoryNotFound(self.dir.clone()));
        }

        let entries = fs::read_dir(&self.dir)
            .map_err(|e| StorageError::io(format!("reading {:?}", self.dir), e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("[inventory] skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            if !self.is_video(&path) {
                continue;
            }

            // metadata kann fehlschlagen, wenn die Datei gerade gelöscht wurde
            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    debug!("[inventory] {:?} vanished during scan: {}", path, e);
                    continue;
                }
            };
            if !meta.is_file() {
                continue;
            }

            let modified = match meta.modified() {
                Ok(t) => t,
                Err(e) => {
                    debug!("[inventory] no mtime for {:?}: {}", path, e);
                    continue;
                }
            };

            files.push(VideoFileEntry {
                path,
                size_bytes: meta.len(),
                modified,
            });
        }

        sort_oldest_first(&mut files);
        Ok(files)
    }
}

pub fn sort_oldest_first(entries: &mut [VideoFileEntry]) {
    entries.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
}
