// src/recorder/recorder.rs

use std::fs::create_dir_all;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use chrono::{DateTime, Local};

use crate::core::lock::{lock_mutex, lock_rwlock_read, lock_rwlock_write};
use crate::core::logging::{ComponentLogger, LogContext};
use crate::core::timestamp::format_utc_ns;
use crate::core::{ConfigError, RecorderError, RecorderResult};
use crate::recorder::config::RecordingConfig;
use crate::recorder::naming::{timestamp_stem, unique_output_path};
use crate::ring::{Frame, FrameRing, RingStats, Snapshot};
use crate::sink::{SinkParams, VideoSink};
use crate::source::{FrameSource, SourceRead};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Flushing,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct FlushReport {
    pub path: PathBuf,
    pub frames_written: usize,
    pub first_seq: u64,
    pub last_seq: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct RecorderStats {
    pub state: RecorderState,
    pub frames_ingested: u64,
    pub flushes_ok: u64,
    pub flushes_failed: u64,
    pub ring: RingStats,
}

/// Keeps the last `fps × window_seconds` frames and writes them out on demand.
///
/// Ingestion and flushing run on different threads against the same
/// instance (`Arc<Recorder>`). A flush only holds the ring lock while it
/// copies the snapshot; encoding happens afterwards, so ingestion never
/// waits on the sink. Concurrent flushes are serialized.
pub struct Recorder {
    config: RwLock<RecordingConfig>,
    ring: FrameRing,
    sink: Box<dyn VideoSink>,
    flush_lock: Mutex<()>,
    flushing: AtomicBool,
    stopped: AtomicBool,
    frames_ingested: AtomicU64,
    flushes_ok: AtomicU64,
    flushes_failed: AtomicU64,
}

/// Marks the recorder as flushing for the lifetime of the guard.
struct FlushingGuard<'a>(&'a AtomicBool);

impl<'a> FlushingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for FlushingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Recorder {
    pub fn new(config: RecordingConfig, sink: Box<dyn VideoSink>) -> Self {
        let ring = FrameRing::new(config.capacity());
        let recorder = Self {
            config: RwLock::new(config),
            ring,
            sink,
            flush_lock: Mutex::new(()),
            flushing: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            frames_ingested: AtomicU64::new(0),
            flushes_ok: AtomicU64::new(0),
            flushes_failed: AtomicU64::new(0),
        };
        recorder.info(&format!(
            "created, window {} frames",
            recorder.ring.capacity()
        ));
        recorder
    }

    pub fn config(&self) -> RecordingConfig {
        lock_rwlock_read(&self.config, "recorder.config").clone()
    }

    pub fn set_location(&self, location: &str) -> Result<(), ConfigError> {
        lock_rwlock_write(&self.config, "recorder.set_location").set_location(location)
    }

    pub fn set_source_address(&self, address: &str) -> Result<(), ConfigError> {
        lock_rwlock_write(&self.config, "recorder.set_source_address").set_source_address(address)
    }

    pub fn set_cam_height(&self, height: u32) -> Result<(), ConfigError> {
        lock_rwlock_write(&self.config, "recorder.set_cam_height").set_cam_height(height)
    }

    pub fn set_cam_width(&self, width: u32) -> Result<(), ConfigError> {
        lock_rwlock_write(&self.config, "recorder.set_cam_width").set_cam_width(width)
    }

    pub fn set_output_path(&self, path: impl Into<PathBuf>) -> Result<(), ConfigError> {
        lock_rwlock_write(&self.config, "recorder.set_output_path").set_output_path(path)
    }

    pub fn ring(&self) -> &FrameRing {
        &self.ring
    }

    pub fn state(&self) -> RecorderState {
        if self.stopped.load(Ordering::SeqCst) {
            RecorderState::Stopped
        } else if self.flushing.load(Ordering::SeqCst) {
            RecorderState::Flushing
        } else {
            RecorderState::Idle
        }
    }

    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            state: self.state(),
            frames_ingested: self.frames_ingested.load(Ordering::Relaxed),
            flushes_ok: self.flushes_ok.load(Ordering::Relaxed),
            flushes_failed: self.flushes_failed.load(Ordering::Relaxed),
            ring: self.ring.stats(),
        }
    }

    /// Pushes one frame into the window. Refused (`None`) once `Stopped`.
    pub fn ingest(&self, frame: Frame) -> Option<u64> {
        if self.stopped.load(Ordering::SeqCst) {
            self.debug("frame dropped, recorder stopped");
            return None;
        }
        self.frames_ingested.fetch_add(1, Ordering::Relaxed);
        self.ring.push(frame)
    }

    /// Pulls frames from `source` until it fails, ends, or `running` is cleared.
    /// Either way the recorder ends up `Stopped`; a stopped recorder can still
    /// flush what it holds.
    pub fn run_ingest(
        &self,
        source: &mut dyn FrameSource,
        running: &AtomicBool,
    ) -> RecorderResult<u64> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(RecorderError::Stopped);
        }

        self.info(&format!("ingesting from {}", source.describe()));
        let mut frames: u64 = 0;

        let result = loop {
            if !running.load(Ordering::Relaxed) {
                break Ok(frames);
            }

            match source.next_frame() {
                Ok(SourceRead::Frame(frame)) => {
                    self.ingest(frame);
                    frames += 1;
                    if frames % 1000 == 0 {
                        self.trace_ring(&self.ring.stats());
                    }
                }
                Ok(SourceRead::EndOfStream) => {
                    break Err(RecorderError::frame_read(frames, anyhow!("end of stream")));
                }
                Err(e) => break Err(RecorderError::frame_read(frames, e)),
            }
        };

        self.stopped.store(true, Ordering::SeqCst);
        match &result {
            Ok(n) => self.info(&format!("ingestion stopped after {} frames", n)),
            Err(e) => self.error(&format!("ingestion stopped: {}", e)),
        }
        result
    }

    /// Writes the current window to `<output_path>/<timestamp>.<ext>`.
    pub fn flush(&self) -> RecorderResult<FlushReport> {
        self.flush_at(Local::now())
    }

    /// Like [`flush`](Self::flush) with an explicit naming timestamp.
    pub fn flush_at(&self, when: DateTime<Local>) -> RecorderResult<FlushReport> {
        let _serial = lock_mutex(&self.flush_lock, "recorder.flush");
        let _flushing = FlushingGuard::enter(&self.flushing);

        let result = self.write_snapshot(when);
        match &result {
            Ok(report) => {
                self.flushes_ok.fetch_add(1, Ordering::Relaxed);
                self.info(&format!(
                    "saved {} frames (seq {}..={}) to {:?} in {:.2?}",
                    report.frames_written,
                    report.first_seq,
                    report.last_seq,
                    report.path,
                    report.elapsed
                ));
            }
            Err(RecorderError::NothingToFlush) => {
                self.warn("flush requested but the window is empty");
            }
            Err(e) => {
                self.flushes_failed.fetch_add(1, Ordering::Relaxed);
                self.error(&format!("flush failed: {}", e));
            }
        }
        result
    }

    fn write_snapshot(&self, when: DateTime<Local>) -> RecorderResult<FlushReport> {
        let started = Instant::now();
        let snapshot: Snapshot = self.ring.snapshot();
        if snapshot.is_empty() {
            return Err(RecorderError::NothingToFlush);
        }
        self.debug(&format!(
            "snapshot of {} frames taken at {}",
            snapshot.len(),
            format_utc_ns(snapshot.taken_utc_ns())
        ));

        let cfg = self.config();
        let dir = cfg.output_path();
        create_dir_all(dir).map_err(|e| RecorderError::sink_open(dir.clone(), e))?;

        let stem = timestamp_stem(&when, cfg.filename_pattern());
        let path = unique_output_path(dir, &stem, cfg.extension());
        let params = SinkParams {
            fps: cfg.fps(),
            width: cfg.cam_width(),
            height: cfg.cam_height(),
        };

        let mut writer = self
            .sink
            .open(&path, params)
            .map_err(|e| RecorderError::sink_open(path.clone(), e))?;

        let mut written = 0usize;
        let mut write_err = None;
        for frame in &snapshot {
            if let Err(e) = writer.write(frame) {
                write_err = Some(e);
                break;
            }
            written += 1;
        }

        // close läuft immer, auch nach einem Schreibfehler
        let closed = writer.close();

        if let Some(e) = write_err {
            if let Err(close_err) = closed {
                self.warn(&format!("close after write error failed: {}", close_err));
            }
            return Err(RecorderError::sink_write(path, written, e));
        }
        if let Err(e) = closed {
            return Err(RecorderError::sink_write(path, written, e));
        }

        Ok(FlushReport {
            path,
            frames_written: written,
            first_seq: snapshot.first_seq().unwrap_or_default(),
            last_seq: snapshot.last_seq().unwrap_or_default(),
            elapsed: started.elapsed(),
        })
    }
}

impl ComponentLogger for Recorder {
    fn log_context(&self) -> LogContext {
        let cfg = lock_rwlock_read(&self.config, "recorder.log_context");
        LogContext::new("Recorder", cfg.source_address()).with_location(cfg.location())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::{MockSink, MockSource};
    use chrono::TimeZone;

    fn recorder(dir: &std::path::Path, sink: MockSink) -> Recorder {
        let cfg = RecordingConfig::with_window("Casa", "127.0.0.1", 2, 2, dir, 2, 2).unwrap();
        Recorder::new(cfg, Box::new(sink))
    }

    fn frame(tag: u8) -> Frame {
        Frame::new(2, 2, vec![tag; 12])
    }

    #[test]
    fn flush_after_full_window_writes_capture_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MockSink::new();
        let rec = recorder(dir.path(), sink.clone());

        for i in 0..4 {
            rec.ingest(frame(i));
        }

        let report = rec.flush().unwrap();
        assert_eq!(report.frames_written, 4);
        assert_eq!((report.first_seq, report.last_seq), (1, 4));

        let written = sink.written(&report.path);
        assert_eq!(written, vec![1, 2, 3, 4]);
        assert_eq!(sink.closed_count(), 1);
        assert_eq!(rec.state(), RecorderState::Idle);
    }

    #[test]
    fn flush_uses_configured_resolution_and_fps() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MockSink::new();
        let rec = recorder(dir.path(), sink.clone());
        rec.ingest(frame(0));
        rec.set_cam_width(4).unwrap();

        let report = rec.flush().unwrap();
        let params = sink.params(&report.path).unwrap();
        assert_eq!(params, SinkParams { fps: 2, width: 4, height: 2 });
    }

    #[test]
    fn empty_window_does_not_open_sink() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MockSink::new();
        let rec = recorder(dir.path(), sink.clone());

        assert!(matches!(rec.flush(), Err(RecorderError::NothingToFlush)));
        assert_eq!(sink.opened_count(), 0);
    }

    #[test]
    fn open_failure_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MockSink::new();
        sink.fail_next_open();
        let rec = recorder(dir.path(), sink.clone());
        rec.ingest(frame(7));

        let err = rec.flush().unwrap_err();
        assert!(matches!(err, RecorderError::SinkOpenFailure { .. }));
        assert!(err.is_recoverable());
        assert_eq!(rec.state(), RecorderState::Idle);

        rec.ingest(frame(8));
        let report = rec.flush().unwrap();
        assert_eq!(sink.written(&report.path), vec![1, 2]);
        assert_eq!(rec.stats().flushes_failed, 1);
        assert_eq!(rec.stats().flushes_ok, 1);
    }

    #[test]
    fn write_failure_still_closes_writer() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MockSink::new();
        sink.fail_write_at(2);
        let rec = recorder(dir.path(), sink.clone());
        for i in 0..4 {
            rec.ingest(frame(i));
        }

        match rec.flush() {
            Err(RecorderError::SinkWriteFailure { written, .. }) => assert_eq!(written, 2),
            other => panic!("unexpected: {:?}", other.map(|r| r.path)),
        }
        assert_eq!(sink.closed_count(), 1);
        assert_eq!(rec.state(), RecorderState::Idle);
    }

    #[test]
    fn same_second_flushes_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MockSink::new().creating_files();
        let rec = recorder(dir.path(), sink.clone());
        rec.ingest(frame(1));

        let when = Local.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let a = rec.flush_at(when).unwrap();
        let b = rec.flush_at(when).unwrap();

        assert_ne!(a.path, b.path);
        assert_eq!(a.path.file_name().unwrap(), "2025_06_01_12_00_00.mp4");
        assert_eq!(b.path.file_name().unwrap(), "2025_06_01_12_00_00_1.mp4");
    }

    #[test]
    fn source_end_stops_ingestion_but_allows_flush() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MockSink::new();
        let rec = recorder(dir.path(), sink.clone());
        let running = AtomicBool::new(true);

        let mut source = MockSource::from_tags(2, 2, 0..6);
        let err = rec.run_ingest(&mut source, &running).unwrap_err();
        assert!(matches!(err, RecorderError::FrameReadFailure { frames: 6, .. }));
        assert_eq!(rec.state(), RecorderState::Stopped);

        let report = rec.flush().unwrap();
        assert_eq!(sink.written(&report.path), vec![3, 4, 5, 6]);
        assert_eq!(rec.state(), RecorderState::Stopped);

        assert!(matches!(
            rec.run_ingest(&mut source, &running),
            Err(RecorderError::Stopped)
        ));
    }

    #[test]
    fn ingest_is_refused_once_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let rec = recorder(dir.path(), MockSink::new());
        let running = AtomicBool::new(true);

        let mut source = MockSource::from_tags(2, 2, 0..3);
        assert!(rec.run_ingest(&mut source, &running).is_err());
        assert_eq!(rec.state(), RecorderState::Stopped);
        let before = rec.stats();

        assert_eq!(rec.ingest(frame(9)), None);

        let after = rec.stats();
        assert_eq!(after.ring.len, before.ring.len);
        assert_eq!(after.ring.head_seq, before.ring.head_seq);
        assert_eq!(after.frames_ingested, 3);
        assert_eq!(rec.state(), RecorderState::Stopped);
    }

    #[test]
    fn read_error_maps_to_frame_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let rec = recorder(dir.path(), MockSink::new());
        let running = AtomicBool::new(true);

        let mut source = MockSource::from_tags(2, 2, 0..3).failing();
        let err = rec.run_ingest(&mut source, &running).unwrap_err();
        assert!(matches!(err, RecorderError::FrameReadFailure { frames: 3, .. }));
        assert_eq!(rec.stats().frames_ingested, 3);
    }

    #[test]
    fn invalid_setter_keeps_prior_value() {
        let dir = tempfile::tempdir().unwrap();
        let rec = recorder(dir.path(), MockSink::new());

        assert!(rec.set_location("").is_err());
        assert!(rec.set_cam_height(0).is_err());
        assert_eq!(rec.config().location(), "Casa");
        assert_eq!(rec.config().cam_height(), 2);
    }
}
