use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};

use crate::core::lock::lock_mutex;
use crate::core::{StorageError, StorageResult};
use crate::ring::Frame;
use crate::sink::{SinkParams, VideoSink, VideoWriter};
use crate::source::{FrameSource, SourceRead};
use crate::storage::{CapacityProbe, DiskUsage, FileRemover};

#[derive(Default)]
struct SinkState {
    params: HashMap<PathBuf, SinkParams>,
    written: HashMap<PathBuf, Vec<u64>>,
    opened: usize,
    closed: usize,
    fail_next_open: bool,
    fail_write_at: Option<usize>,
}

/// In-memory sink that records the sequence numbers it was handed.
#[derive(Clone, Default)]
pub struct MockSink {
    state: Arc<Mutex<SinkState>>,
    create_files: bool,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also creates an empty file at the output path on open.
    pub fn creating_files(mut self) -> Self {
        self.create_files = true;
        self
    }

    pub fn fail_next_open(&self) {
        lock_mutex(&self.state, "mock_sink").fail_next_open = true;
    }

    /// The write after `n` successful writes fails.
    pub fn fail_write_at(&self, n: usize) {
        lock_mutex(&self.state, "mock_sink").fail_write_at = Some(n);
    }

    pub fn written(&self, path: &Path) -> Vec<u64> {
        lock_mutex(&self.state, "mock_sink")
            .written
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn params(&self, path: &Path) -> Option<SinkParams> {
        lock_mutex(&self.state, "mock_sink").params.get(path).copied()
    }

    pub fn opened_count(&self) -> usize {
        lock_mutex(&self.state, "mock_sink").opened
    }

    pub fn closed_count(&self) -> usize {
        lock_mutex(&self.state, "mock_sink").closed
    }
}

impl VideoSink for MockSink {
    fn open(&self, path: &Path, params: SinkParams) -> Result<Box<dyn VideoWriter>> {
        let mut state = lock_mutex(&self.state, "mock_sink.open");
        if state.fail_next_open {
            state.fail_next_open = false;
            return Err(anyhow!("mock open failure"));
        }

        if self.create_files {
            fs::File::create(path)?;
        }

        state.opened += 1;
        state.params.insert(path.to_path_buf(), params);
        state.written.insert(path.to_path_buf(), Vec::new());

        Ok(Box::new(MockWriter {
            path: path.to_path_buf(),
            state: self.state.clone(),
            closed: false,
        }))
    }
}

struct MockWriter {
    path: PathBuf,
    state: Arc<Mutex<SinkState>>,
    closed: bool,
}

impl VideoWriter for MockWriter {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        let mut state = lock_mutex(&self.state, "mock_writer.write");
        let fail_at = state.fail_write_at;
        let written = state.written.entry(self.path.clone()).or_default();
        if fail_at == Some(written.len()) {
            return Err(anyhow!("mock write failure"));
        }
        written.push(frame.seq);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            lock_mutex(&self.state, "mock_writer.close").closed += 1;
        }
        Ok(())
    }
}

/// Yields one uniformly filled frame per tag, then ends or errors.
pub struct MockSource {
    width: u32,
    height: u32,
    tags: Range<u8>,
    fail_at_end: bool,
}

impl MockSource {
    pub fn from_tags(width: u32, height: u32, tags: Range<u8>) -> Self {
        Self {
            width,
            height,
            tags,
            fail_at_end: false,
        }
    }

    /// Returns a read error instead of end-of-stream once the tags run out.
    pub fn failing(mut self) -> Self {
        self.fail_at_end = true;
        self
    }
}

impl FrameSource for MockSource {
    fn next_frame(&mut self) -> Result<SourceRead> {
        match self.tags.next() {
            Some(tag) => {
                let len = Frame::expected_len(self.width, self.height);
                Ok(SourceRead::Frame(Frame::new(
                    self.width,
                    self.height,
                    vec![tag; len],
                )))
            }
            None if self.fail_at_end => Err(anyhow!("mock read failure")),
            None => Ok(SourceRead::EndOfStream),
        }
    }

    fn describe(&self) -> String {
        format!("mock {}x{}", self.width, self.height)
    }
}

#[derive(Default)]
struct RemoverState {
    attempted: Vec<PathBuf>,
    removed: Vec<PathBuf>,
}

/// Records delete attempts without touching the filesystem.
/// Files are matched by file name.
#[derive(Clone, Default)]
pub struct RecordingRemover {
    state: Arc<Mutex<RemoverState>>,
    failing: HashSet<String>,
    missing: HashSet<String>,
}

impl RecordingRemover {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deleting `name` fails with permission denied.
    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Deleting `name` reports not-found.
    pub fn missing_on(mut self, name: &str) -> Self {
        self.missing.insert(name.to_string());
        self
    }

    pub fn attempted(&self) -> Vec<PathBuf> {
        lock_mutex(&self.state, "remover").attempted.clone()
    }

    pub fn removed(&self) -> Vec<PathBuf> {
        lock_mutex(&self.state, "remover").removed.clone()
    }
}

impl FileRemover for RecordingRemover {
    fn remove(&self, path: &Path) -> io::Result<()> {
        let mut state = lock_mutex(&self.state, "remover.remove");
        state.attempted.push(path.to_path_buf());

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if self.failing.contains(&name) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "mock denied"));
        }
        if self.missing.contains(&name) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "mock missing"));
        }

        state.removed.push(path.to_path_buf());
        Ok(())
    }
}

/// Constant capacity numbers, whatever the directory.
pub struct FixedCapacity {
    usage: DiskUsage,
}

impl FixedCapacity {
    pub fn new(total_bytes: u64, used_bytes: u64) -> Self {
        Self {
            usage: DiskUsage {
                total_bytes,
                used_bytes,
            },
        }
    }
}

impl CapacityProbe for FixedCapacity {
    fn measure(&self, _dir: &Path) -> StorageResult<DiskUsage> {
        Ok(self.usage)
    }
}

/// "Used" is the sum of the regular files directly in the directory,
/// so repeated passes see their own deletions.
pub struct DirUsageProbe {
    total_bytes: u64,
}

impl DirUsageProbe {
    pub fn new(total_bytes: u64) -> Self {
        Self { total_bytes }
    }
}

impl CapacityProbe for DirUsageProbe {
    fn measure(&self, dir: &Path) -> StorageResult<DiskUsage> {
        let entries =
            fs::read_dir(dir).map_err(|e| StorageError::io(format!("reading {:?}", dir), e))?;

        let used_bytes = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum();

        Ok(DiskUsage {
            total_bytes: self.total_bytes,
            used_bytes,
        })
    }
}
