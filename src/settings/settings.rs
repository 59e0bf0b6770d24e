// Loader settings and persistence
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Error, Result};

/// Which audio subsystem backs a new context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputBackend {
    /// Platform output device via cpal
    Device,
    /// No device; frames are pulled with `AudioContext::render`
    Offline,
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub backend: OutputBackend,
    pub offline_sample_rate: u32,
    pub offline_channels: u16,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            backend: OutputBackend::Device,
            offline_sample_rate: 44100,
            offline_channels: 2,
        }
    }
}

impl OutputSettings {
    pub fn offline(sample_rate: u32, channels: u16) -> Self {
        Self {
            backend: OutputBackend::Offline,
            offline_sample_rate: sample_rate,
            offline_channels: channels,
        }
    }
}

/// Main loader settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Scheme, host and port that `/audio/<name>` is appended to
    pub base_url: String,
    pub request_timeout_ms: u64, // 0 disables the timeout
    pub output: OutputSettings,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            request_timeout_ms: 30_000,
            output: OutputSettings::default(),
        }
    }
}

impl LoaderSettings {
    pub const FILE_NAME: &'static str = "audio.json";

    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Base URL without a trailing slash, so the request path can be appended verbatim
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<()> {
        let base = self.base();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::Config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.output.offline_sample_rate == 0 || self.output.offline_channels == 0 {
            return Err(Error::Config(
                "offline sample rate and channel count must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load settings from `dir/audio.json`, or return defaults if the file doesn't exist
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(Self::FILE_NAME);

        if !path.exists() {
            info!("No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let settings: LoaderSettings = serde_json::from_str(&content)?;
        settings.validate()?;

        info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to `dir/audio.json`
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let path = dir.join(Self::FILE_NAME);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)?;

        info!("Saved settings to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LoaderSettings::load(dir.path()).unwrap();
        assert_eq!(settings, LoaderSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LoaderSettings {
            base_url: "http://localhost:9000/".to_string(),
            request_timeout_ms: 0,
            output: OutputSettings::offline(48000, 1),
        };
        settings.save(dir.path()).unwrap();

        let loaded = LoaderSettings::load(dir.path()).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.base(), "http://localhost:9000");
        assert_eq!(loaded.request_timeout(), None);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(LoaderSettings::FILE_NAME),
            r#"{ "output": { "backend": "offline" } }"#,
        )
        .unwrap();

        let loaded = LoaderSettings::load(dir.path()).unwrap();
        assert_eq!(loaded.output.backend, OutputBackend::Offline);
        assert_eq!(loaded.output.offline_sample_rate, 44100);
        assert_eq!(loaded.base_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let settings = LoaderSettings {
            base_url: "ftp://example.org".to_string(),
            ..LoaderSettings::default()
        };
        assert!(matches!(settings.validate(), Err(Error::Config(_))));
    }
}
