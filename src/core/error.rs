use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

pub type RecorderResult<T> = Result<T, RecorderError>;
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("frame source '{address}' unavailable: {source}")]
    SourceUnavailable {
        address: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("frame read failed after {frames} frames: {source}")]
    FrameReadFailure {
        frames: u64,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("cannot open video sink for {path:?}: {source}")]
    SinkOpenFailure {
        path: PathBuf,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("writing {path:?} failed after {written} frames: {source}")]
    SinkWriteFailure {
        path: PathBuf,
        written: usize,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
    #[error("ring buffer is empty, nothing to flush")]
    NothingToFlush,
    #[error("ingestion already stopped")]
    Stopped,
}

impl RecorderError {
    pub fn source_unavailable(address: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::SourceUnavailable {
            address: address.into(),
            source: source.into().into(),
        }
    }

    pub fn frame_read(frames: u64, source: impl Into<anyhow::Error>) -> Self {
        Self::FrameReadFailure {
            frames,
            source: source.into().into(),
        }
    }

    pub fn sink_open(path: impl Into<PathBuf>, source: impl Into<anyhow::Error>) -> Self {
        Self::SinkOpenFailure {
            path: path.into(),
            source: source.into().into(),
        }
    }

    pub fn sink_write(
        path: impl Into<PathBuf>,
        written: usize,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::SinkWriteFailure {
            path: path.into(),
            written,
            source: source.into().into(),
        }
    }

    /// Flush-local failures leave ingestion untouched and may be retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SinkOpenFailure { .. }
                | Self::SinkWriteFailure { .. }
                | Self::NothingToFlush
                | Self::InvalidConfig(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("directory {0:?} does not exist")]
    DirectoryNotFound(PathBuf),
    #[error("disk capacity measurement for {path:?} is unusable: {reason}")]
    MeasurementError { path: PathBuf, reason: String },
    #[error("failed to delete {path:?}: {source}")]
    DeleteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn measurement(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MeasurementError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_errors_are_recoverable() {
        let err = RecorderError::sink_open("/tmp/x.mp4", anyhow::anyhow!("no encoder"));
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("no encoder"));

        let err = RecorderError::frame_read(12, anyhow::anyhow!("eof"));
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("12 frames"));
    }

    #[test]
    fn config_error_wraps_into_recorder_error() {
        let err: RecorderError = ConfigError::invalid("location", "must not be empty").into();
        assert!(matches!(err, RecorderError::InvalidConfig(_)));
        assert_eq!(err.to_string(), "invalid location: must not be empty");
    }
}
