// src/sink/mod.rs
use std::path::Path;

use crate::ring::Frame;

pub mod ffmpeg;

pub use ffmpeg::FfmpegSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkParams {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

/// Factory for per-flush writers.
pub trait VideoSink: Send + Sync {
    fn open(&self, path: &Path, params: SinkParams) -> anyhow::Result<Box<dyn VideoWriter>>;
}

pub trait VideoWriter: Send {
    fn write(&mut self, frame: &Frame) -> anyhow::Result<()>;

    /// Finalizes the file. Must be safe to call more than once.
    fn close(&mut self) -> anyhow::Result<()>;
}
