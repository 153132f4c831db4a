use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};

use crate::core::ConfigError;
use crate::recorder::RecordingConfig;
use crate::recorder::config::{
    DEFAULT_EXTENSION, DEFAULT_FILENAME_PATTERN, DEFAULT_FPS, DEFAULT_WINDOW_SECONDS,
};
use crate::storage::StoragePolicyConfig;
use crate::storage::config::{DEFAULT_EXTENSIONS, DEFAULT_RETENTION_DAYS, DEFAULT_SPACE_LIMIT_PERCENT};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecorderSection {
    pub location: String,
    pub ip_address: String,
    pub cam_height: u32,
    pub cam_width: u32,
    pub output_path: PathBuf,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u32,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default = "default_filename_pattern")]
    pub filename_pattern: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Ffmpeg,
    Pattern,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceSection {
    pub kind: SourceKind,
    pub ffmpeg_bin: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SinkSection {
    pub ffmpeg_bin: String,
    pub codec: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSection {
    pub enabled: bool,
    pub retention_days: u32,
    pub space_limit_percent: f64,
    pub simulated_total_capacity_gb: Option<f64>,
    pub interval_secs: u64,
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpSection {
    pub enabled: bool,
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub recorder: RecorderSection,
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub sink: SinkSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub http: HttpSection,
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}

fn default_window_seconds() -> u32 {
    DEFAULT_WINDOW_SECONDS
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_filename_pattern() -> String {
    DEFAULT_FILENAME_PATTERN.to_string()
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            kind: SourceKind::Ffmpeg,
            ffmpeg_bin: "ffmpeg".to_string(),
        }
    }
}

impl Default for SinkSection {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            codec: "libx264".to_string(),
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: DEFAULT_RETENTION_DAYS,
            space_limit_percent: DEFAULT_SPACE_LIMIT_PERCENT,
            simulated_total_capacity_gb: None,
            interval_secs: 3600,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        let config = Self::from_toml(&content)?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate().context("config validation failed")?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let recording = self.recording_config()?;
        let policy = self.storage_policy()?;

        // sonst sieht die Speicherpflege die eigenen Aufnahmen nie
        if self.storage.enabled {
            let ext = recording.extension();
            let covered = policy
                .extensions
                .iter()
                .any(|e| e.eq_ignore_ascii_case(ext));
            if !covered {
                bail!(
                    "recorder.extension '{}' is not in storage.extensions {:?}",
                    ext,
                    policy.extensions
                );
            }
        }

        if self.source.ffmpeg_bin.trim().is_empty() {
            bail!("source.ffmpeg_bin must not be empty");
        }
        if self.sink.ffmpeg_bin.trim().is_empty() {
            bail!("sink.ffmpeg_bin must not be empty");
        }
        if self.sink.codec.trim().is_empty() {
            bail!("sink.codec must not be empty");
        }
        if self.storage.interval_secs == 0 {
            bail!("storage.interval_secs must be > 0");
        }
        if self.http.enabled {
            self.http_bind()?;
        }

        Ok(())
    }

    /// Runtime recorder configuration; the same checks as the setters.
    pub fn recording_config(&self) -> Result<RecordingConfig, ConfigError> {
        let r = &self.recorder;
        let mut cfg = RecordingConfig::with_window(
            &r.location,
            &r.ip_address,
            r.cam_height,
            r.cam_width,
            &r.output_path,
            r.fps,
            r.window_seconds,
        )?;
        cfg.set_extension(&r.extension)?;
        cfg.set_filename_pattern(&r.filename_pattern)?;
        Ok(cfg)
    }

    pub fn storage_policy(&self) -> Result<StoragePolicyConfig, ConfigError> {
        let s = &self.storage;
        let mut policy = StoragePolicyConfig {
            retention_days: s.retention_days,
            space_limit_percent: s.space_limit_percent,
            simulated_total_capacity: None,
            extensions: s.extensions.clone(),
        };
        if let Some(gb) = s.simulated_total_capacity_gb {
            policy = policy.with_simulated_total_gb(gb)?;
        }
        policy.validate()?;
        Ok(policy)
    }

    pub fn storage_interval(&self) -> Duration {
        Duration::from_secs(self.storage.interval_secs)
    }

    pub fn http_bind(&self) -> anyhow::Result<SocketAddr> {
        self.http
            .bind
            .parse()
            .with_context(|| format!("http.bind '{}' is not a socket address", self.http.bind))
    }
}

pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    Config::load(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [recorder]
        location = "Casa"
        ip_address = "rtsp://10.0.0.5/stream"
        cam_height = 480
        cam_width = 640
        output_path = "videos"
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = Config::from_toml(MINIMAL).unwrap();

        assert_eq!(cfg.recorder.fps, 30);
        assert_eq!(cfg.recorder.window_seconds, 15);
        assert_eq!(cfg.source.kind, SourceKind::Ffmpeg);
        assert_eq!(cfg.sink.codec, "libx264");
        assert!(cfg.storage.enabled);
        assert_eq!(cfg.storage.retention_days, 15);
        assert_eq!(cfg.storage.space_limit_percent, 60.0);
        assert!(!cfg.http.enabled);

        let rec = cfg.recording_config().unwrap();
        assert_eq!(rec.capacity(), 450);
        assert_eq!(rec.filename_pattern(), "%Y_%m_%d_%H_%M_%S");
    }

    #[test]
    fn full_config_round_trips_into_runtime_types() {
        let text = format!(
            "{}\n{}",
            MINIMAL,
            r#"
            [source]
            kind = "pattern"

            [storage]
            retention_days = 7
            space_limit_percent = 80.0
            simulated_total_capacity_gb = 0.5
            interval_secs = 60
            extensions = ["mp4"]

            [http]
            enabled = true
            bind = "127.0.0.1:5000"
            "#
        );
        let cfg = Config::from_toml(&text).unwrap();

        assert_eq!(cfg.source.kind, SourceKind::Pattern);
        let policy = cfg.storage_policy().unwrap();
        assert_eq!(policy.retention_days, 7);
        assert_eq!(policy.simulated_total_capacity, Some(512 * 1024 * 1024));
        assert_eq!(cfg.storage_interval(), Duration::from_secs(60));
        assert_eq!(cfg.http_bind().unwrap().port(), 5000);
    }

    #[test]
    fn rejects_invalid_values() {
        let bad_height = MINIMAL.replace("cam_height = 480", "cam_height = 0");
        assert!(Config::from_toml(&bad_height).is_err());

        let bad_limit = format!("{}\n[storage]\nspace_limit_percent = 0.0\n", MINIMAL);
        assert!(Config::from_toml(&bad_limit).is_err());

        let bad_bind = format!("{}\n[http]\nenabled = true\nbind = \"nope\"\n", MINIMAL);
        assert!(Config::from_toml(&bad_bind).is_err());
    }

    #[test]
    fn recorder_extension_must_be_managed_by_storage() {
        let mkv = MINIMAL.replace(
            "output_path = \"videos\"",
            "output_path = \"videos\"\nextension = \"mkv\"",
        );
        let err = Config::from_toml(&mkv).unwrap_err();
        assert!(format!("{:#}", err).contains("mkv"));

        let with_mkv = format!("{}\n[storage]\nextensions = [\"MKV\", \"mp4\"]\n", mkv);
        assert!(Config::from_toml(&with_mkv).is_ok());

        let unmanaged = format!("{}\n[storage]\nenabled = false\n", mkv);
        assert!(Config::from_toml(&unmanaged).is_ok());
    }

    #[test]
    fn missing_recorder_section_fails() {
        assert!(Config::from_toml("[http]\nenabled = false\n").is_err());
    }
}
