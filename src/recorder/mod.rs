// src/recorder/mod.rs

pub mod config;
pub mod naming;
pub mod recorder;
pub mod trigger;

pub use config::RecordingConfig;
pub use recorder::{FlushReport, Recorder, RecorderState, RecorderStats};
pub use trigger::{FlushRequests, FlushTally, FlushTrigger, flush_channel};
