use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the site backend serving the track listing
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Path under the base URL where track files are served
    #[serde(default = "default_music_path")]
    pub music_path: String,
    /// Number of placeholder tracks used when the listing is unreachable
    #[serde(default = "default_fallback_track_count")]
    pub fallback_track_count: usize,
    /// Timeout for the listing request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_base() -> String {
    "http://127.0.0.1:3000".into()
}

fn default_music_path() -> String {
    "/music".into()
}

const fn default_fallback_track_count() -> usize {
    5
}

const fn default_request_timeout() -> u64 {
    10
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            music_path: default_music_path(),
            fallback_track_count: default_fallback_track_count(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Whether the remote broadcast listener runs at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Location of the operator-published command document
    #[serde(default = "default_command_url")]
    pub command_url: String,
    /// Polling interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Timeout for each poll request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

const fn default_true() -> bool {
    true
}

fn default_command_url() -> String {
    "http://127.0.0.1:3000/broadcast.json".into()
}

const fn default_poll_interval() -> u64 {
    5000
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            command_url: default_command_url(),
            poll_interval_ms: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Volume applied when no stored volume exists yet, in [0, 1]
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    /// How often the playback position is saved, in seconds
    #[serde(default = "default_position_save_interval")]
    pub position_save_interval_secs: u64,
}

const fn default_volume() -> f32 {
    0.6
}

const fn default_position_save_interval() -> u64 {
    5
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            position_save_interval_secs: default_position_save_interval(),
        }
    }
}

impl Config {
    /// Get the configuration directory path (~/.config/bandstand/)
    #[must_use]
    pub fn config_dir() -> PathBuf {
        crate::paths::config_dir()
    }

    /// Get the config file path (~/.config/bandstand/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from file or create template on first run
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if a
    /// field fails validation.
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            // Create config directory if it doesn't exist
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            // Write template config
            fs::write(&config_path, CONFIG_TEMPLATE)?;

            return Err(CoreError::ConfigNotFound { path: config_path });
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Validate field ranges.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is outside its allowed range.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.audio.default_volume) {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "audio.default_volume must be within [0, 1], got {}",
                    self.audio.default_volume
                ),
            });
        }
        if self.broadcast.poll_interval_ms == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "broadcast.poll_interval_ms must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

const CONFIG_TEMPLATE: &str = r#"# Bandstand Configuration
# ~/.config/bandstand/config.toml

[catalog]
# Base URL of the site backend; the track listing is fetched from
# {api_base}/api/music-files
api_base = "http://127.0.0.1:3000"
# Tracks listed there play from {api_base}{music_path}/{filename}
music_path = "/music"
# Placeholder tracks used when the listing endpoint is unreachable
fallback_track_count = 5
request_timeout_secs = 10

[broadcast]
# Operator-published command document, polled on an interval
enabled = true
command_url = "http://127.0.0.1:3000/broadcast.json"
poll_interval_ms = 5000
request_timeout_secs = 10

[audio]
# Volume applied on first run, before any stored volume exists
default_volume = 0.6
# How often the playback position is saved
position_save_interval_secs = 5
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses_with_defaults() {
        let parsed: std::result::Result<Config, _> = toml::from_str(CONFIG_TEMPLATE);
        assert!(parsed.is_ok());
        let config = parsed.unwrap_or_default();
        assert_eq!(config.catalog.api_base, "http://127.0.0.1:3000");
        assert_eq!(config.catalog.music_path, "/music");
        assert_eq!(config.catalog.fallback_track_count, 5);
        assert_eq!(config.broadcast.poll_interval_ms, 5000);
        assert!(config.broadcast.enabled);
        assert!((config.audio.default_volume - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let parsed: std::result::Result<Config, _> = toml::from_str("");
        assert!(parsed.is_ok());
        let config = parsed.unwrap_or_default();
        assert_eq!(config.catalog.fallback_track_count, 5);
        assert_eq!(config.audio.position_save_interval_secs, 5);
    }

    #[test]
    fn test_validate_rejects_out_of_range_volume() {
        let config = Config {
            audio: AudioConfig {
                default_volume: 1.5,
                ..AudioConfig::default()
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let config = Config {
            broadcast: BroadcastConfig {
                poll_interval_ms: 0,
                ..BroadcastConfig::default()
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_overrides_single_field() {
        let parsed: std::result::Result<Config, _> = toml::from_str(
            r#"
            [broadcast]
            poll_interval_ms = 250
            "#,
        );
        assert!(parsed.is_ok());
        let config = parsed.unwrap_or_default();
        assert_eq!(config.broadcast.poll_interval_ms, 250);
        // Untouched sections keep their defaults
        assert_eq!(config.catalog.api_base, "http://127.0.0.1:3000");
    }
}
