// src/lib.rs
pub mod api;
pub mod config;
pub mod core;
pub mod recorder;
pub mod ring;
pub mod sink;
pub mod source;
pub mod storage;
pub mod testing;

// Re-export die wichtigsten Typen
pub use core::{ComponentLogger, LogContext, RecorderError, StorageError};
pub use recorder::{FlushTrigger, Recorder, RecordingConfig, flush_channel};
pub use ring::{Frame, FrameRing};
pub use storage::{StorageManager, StoragePolicyConfig};
pub use core::timestamp::utc_ns_now;
