// src/storage/listing.rs
//
// Filtering by filename range only works because recordings are named with a
// sortable, timestamp-first pattern.
use std::fs;
use std::path::Path;

use crate::core::{StorageError, StorageResult};

/// Inclusive lexical range over filenames. Either bound may be open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl NameRange {
    pub fn new(start: Option<String>, end: Option<String>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, name: &str) -> bool {
        if let Some(start) = &self.start {
            if name < start.as_str() {
                return false;
            }
        }
        if let Some(end) = &self.end {
            if name > end.as_str() {
                return false;
            }
        }
        true
    }
}

/// Sorted names of the regular files directly inside `dir` that fall in `range`.
pub fn list_filenames(dir: &Path, range: &NameRange) -> StorageResult<Vec<String>> {
    if !dir.is_dir() {
        return Err(StorageError::DirectoryNotFound(dir.to_path_buf()));
    }

    let entries = fs::read_dir(dir).map_err(|e| StorageError::io(format!("reading {:?}", dir), e))?;

    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| range.contains(n))
        .collect();

    names.sort();
    Ok(names)
}
