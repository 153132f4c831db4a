// src/recorder/config.rs
use std::path::PathBuf;

use crate::core::ConfigError;

pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_WINDOW_SECONDS: u32 = 15;
pub const DEFAULT_EXTENSION: &str = "mp4";
/// Year first, fixed width: lexical order of file names equals time order.
pub const DEFAULT_FILENAME_PATTERN: &str = "%Y_%m_%d_%H_%M_%S";

/// Validated recorder settings. Fields are private so every change goes
/// through a setter that rejects invalid values and keeps the old one.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingConfig {
    location: String,
    source_address: String,
    cam_height: u32,
    cam_width: u32,
    output_path: PathBuf,
    fps: u32,
    window_seconds: u32,
    extension: String,
    filename_pattern: String,
}

impl RecordingConfig {
    pub fn new(
        location: &str,
        source_address: &str,
        cam_height: u32,
        cam_width: u32,
        output_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        Self::with_window(
            location,
            source_address,
            cam_height,
            cam_width,
            output_path,
            DEFAULT_FPS,
            DEFAULT_WINDOW_SECONDS,
        )
    }

    pub fn with_window(
        location: &str,
        source_address: &str,
        cam_height: u32,
        cam_width: u32,
        output_path: impl Into<PathBuf>,
        fps: u32,
        window_seconds: u32,
    ) -> Result<Self, ConfigError> {
        let cfg = Self {
            location: non_empty("location", location)?,
            source_address: non_empty("ip_address", source_address)?,
            cam_height: positive("cam_height", cam_height)?,
            cam_width: positive("cam_width", cam_width)?,
            output_path: non_empty_path(output_path.into())?,
            fps: positive("fps", fps)?,
            window_seconds: positive("window_seconds", window_seconds)?,
            extension: DEFAULT_EXTENSION.to_string(),
            filename_pattern: DEFAULT_FILENAME_PATTERN.to_string(),
        };
        Ok(cfg)
    }

    /// Window length in frames.
    pub fn capacity(&self) -> usize {
        self.fps as usize * self.window_seconds as usize
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn source_address(&self) -> &str {
        &self.source_address
    }

    pub fn cam_height(&self) -> u32 {
        self.cam_height
    }

    pub fn cam_width(&self) -> u32 {
        self.cam_width
    }

    pub fn output_path(&self) -> &PathBuf {
        &self.output_path
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn window_seconds(&self) -> u32 {
        self.window_seconds
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn filename_pattern(&self) -> &str {
        &self.filename_pattern
    }

    pub fn set_location(&mut self, location: &str) -> Result<(), ConfigError> {
        self.location = non_empty("location", location)?;
        Ok(())
    }

    pub fn set_source_address(&mut self, address: &str) -> Result<(), ConfigError> {
        self.source_address = non_empty("ip_address", address)?;
        Ok(())
    }

    pub fn set_cam_height(&mut self, height: u32) -> Result<(), ConfigError> {
        self.cam_height = positive("cam_height", height)?;
        Ok(())
    }

    pub fn set_cam_width(&mut self, width: u32) -> Result<(), ConfigError> {
        self.cam_width = positive("cam_width", width)?;
        Ok(())
    }

    pub fn set_output_path(&mut self, path: impl Into<PathBuf>) -> Result<(), ConfigError> {
        self.output_path = non_empty_path(path.into())?;
        Ok(())
    }

    pub fn set_extension(&mut self, extension: &str) -> Result<(), ConfigError> {
        let ext = non_empty("extension", extension.trim_start_matches('.'))?;
        if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::invalid("extension", "must be alphanumeric"));
        }
        self.extension = ext;
        Ok(())
    }

    /// Accepts a chrono format string; it must render without path separators.
    pub fn set_filename_pattern(&mut self, pattern: &str) -> Result<(), ConfigError> {
        let pattern = non_empty("filename_pattern", pattern)?;
        let mut probe = String::new();
        {
            use std::fmt::Write;
            let when = chrono::Local::now();
            if write!(probe, "{}", when.format(&pattern)).is_err() {
                return Err(ConfigError::invalid(
                    "filename_pattern",
                    "not a valid time format",
                ));
            }
        }
        if probe.contains('/') || probe.contains('\\') {
            return Err(ConfigError::invalid(
                "filename_pattern",
                "must not produce path separators",
            ));
        }
        self.filename_pattern = pattern;
        Ok(())
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(field, "must not be empty"));
    }
    Ok(value.to_string())
}

fn positive(field: &'static str, value: u32) -> Result<u32, ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(field, "must be greater than zero"));
    }
    Ok(value)
}

fn non_empty_path(path: PathBuf) -> Result<PathBuf, ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::invalid("output_path", "must not be empty"));
    }
    Ok(path)
}
