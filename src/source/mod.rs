// src/source/mod.rs
use crate::ring::Frame;

pub mod ffmpeg;
pub mod pattern;

pub use ffmpeg::FfmpegSource;
pub use pattern::PatternSource;

pub enum SourceRead {
    Frame(Frame),
    EndOfStream,
}

/// Delivers frames at the stream's nominal rate; called once per ingestion cycle.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> anyhow::Result<SourceRead>;

    fn describe(&self) -> String {
        "source".to_string()
    }
}
