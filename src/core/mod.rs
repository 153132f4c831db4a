pub mod error;
pub mod lock;
pub mod logging;
pub mod timestamp;

pub use error::{ConfigError, RecorderError, RecorderResult, StorageError, StorageResult};
pub use logging::{ComponentLogger, LogContext};
pub use timestamp::*;
