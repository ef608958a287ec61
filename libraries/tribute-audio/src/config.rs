//! Controller configuration

use crate::error::{AudioError, Result};
use crate::monitor::MonitorSettings;
use crate::types::SessionConfig;
use crate::volume::Volume;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Where the page is served from
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Track location relative to `base_path`
    #[serde(default = "default_track_path")]
    pub track_path: String,

    #[serde(default = "default_volume")]
    pub volume: f32,

    #[serde(default = "default_enabled")]
    pub autoplay: bool,

    /// Stream the track instead of decoding it fully before playing
    #[serde(default = "default_enabled")]
    pub streaming: bool,

    #[serde(default = "default_fade_duration_ms")]
    pub fade_duration_ms: u64,

    #[serde(default = "default_fade_step_ms")]
    pub fade_step_ms: u64,

    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,

    #[serde(default = "default_monitor_grace_ms")]
    pub monitor_grace_ms: u64,

    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    #[serde(default = "default_max_unlock_attempts")]
    pub max_unlock_attempts: u32,

    /// Also treat scrolling as a user gesture
    #[serde(default)]
    pub unlock_on_scroll: bool,

    /// Manual restarts allowed after the track failed to load
    #[serde(default = "default_max_manual_retries")]
    pub max_manual_retries: u32,

    /// How long the closing section waits before ending the music
    #[serde(default = "default_closing_delay_ms")]
    pub closing_delay_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            track_path: default_track_path(),
            volume: default_volume(),
            autoplay: default_enabled(),
            streaming: default_enabled(),
            fade_duration_ms: default_fade_duration_ms(),
            fade_step_ms: default_fade_step_ms(),
            monitor_interval_ms: default_monitor_interval_ms(),
            monitor_grace_ms: default_monitor_grace_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
            max_unlock_attempts: default_max_unlock_attempts(),
            unlock_on_scroll: false,
            max_manual_retries: default_max_manual_retries(),
            closing_delay_ms: default_closing_delay_ms(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from `tribute.toml` (if present) and environment
    pub fn load() -> Result<Self> {
        let path = PathBuf::from("tribute.toml");
        let file = path.exists().then_some(path);
        Self::load_from(file.as_deref())
    }

    /// Load from an optional config file, overridden by `TRIBUTE_*` variables
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        Self::build(file, Self::environment())
    }

    /// Environment source: `TRIBUTE_FADE_STEP_MS` maps to `fade_step_ms`
    fn environment() -> config::Environment {
        config::Environment::with_prefix("TRIBUTE").try_parsing(true)
    }

    fn build(file: Option<&Path>, environment: config::Environment) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = file {
            settings = settings.add_source(config::File::from(path));
        }
        settings = settings.add_source(environment);

        let config = settings
            .build()
            .map_err(|e| AudioError::Config(e.to_string()))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AudioError::Config(e.to_string()))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(AudioError::Config(format!(
                "volume must be between 0 and 1, got {}",
                self.volume
            )));
        }

        if self.fade_step_ms == 0 {
            return Err(AudioError::Config(
                "fade_step_ms must be greater than zero".to_string(),
            ));
        }

        if self.fade_step_ms > self.fade_duration_ms {
            return Err(AudioError::Config(format!(
                "fade_step_ms ({}) is longer than fade_duration_ms ({})",
                self.fade_step_ms, self.fade_duration_ms
            )));
        }

        if self.monitor_interval_ms == 0 {
            return Err(AudioError::Config(
                "monitor_interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.max_consecutive_failures == 0 {
            return Err(AudioError::Config(
                "max_consecutive_failures must be at least 1".to_string(),
            ));
        }

        if self.max_unlock_attempts == 0 {
            return Err(AudioError::Config(
                "max_unlock_attempts must be at least 1".to_string(),
            ));
        }

        if self.track_path.trim().is_empty() {
            return Err(AudioError::Config("track_path is empty".to_string()));
        }

        Ok(())
    }

    /// Track URL with exactly one `/` between base and track
    pub fn source_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_path.trim_end_matches('/'),
            self.track_path.trim_start_matches('/')
        )
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            source_url: self.source_url(),
            volume: Volume::new(self.volume),
            looping: true,
            autoplay: self.autoplay,
            streaming: self.streaming,
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            interval: Duration::from_millis(self.monitor_interval_ms),
            grace: Duration::from_millis(self.monitor_grace_ms),
            max_consecutive_failures: self.max_consecutive_failures,
        }
    }

    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_duration_ms)
    }

    pub fn fade_step(&self) -> Duration {
        Duration::from_millis(self.fade_step_ms)
    }

    pub fn closing_delay(&self) -> Duration {
        Duration::from_millis(self.closing_delay_ms)
    }
}

// Default value functions
fn default_base_path() -> String {
    "/".to_string()
}

fn default_track_path() -> String {
    "music/Happy Birthday Song Music Box.mp3".to_string()
}

fn default_volume() -> f32 {
    0.5
}

fn default_enabled() -> bool {
    true
}

fn default_fade_duration_ms() -> u64 {
    2000
}

fn default_fade_step_ms() -> u64 {
    50
}

fn default_monitor_interval_ms() -> u64 {
    3000
}

fn default_monitor_grace_ms() -> u64 {
    1000
}

fn default_max_consecutive_failures() -> u32 {
    3
}

fn default_max_unlock_attempts() -> u32 {
    5
}

fn default_max_manual_retries() -> u32 {
    1
}

fn default_closing_delay_ms() -> u64 {
    2000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_vars(vars: &[(&str, &str)]) -> Result<ControllerConfig> {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let environment = ControllerConfig::environment().source(Some(map));
        ControllerConfig::build(None, environment)
    }

    #[test]
    fn defaults_match_page() {
        let config = ControllerConfig::default();
        assert_eq!(config.volume, 0.5);
        assert!(config.autoplay);
        assert_eq!(config.fade_duration(), Duration::from_millis(2000));
        assert_eq!(config.fade_step(), Duration::from_millis(50));
        assert_eq!(config.monitor_settings(), MonitorSettings::default());
        assert_eq!(config.max_manual_retries, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_sources_give_defaults() {
        let config = from_vars(&[]).expect("config");
        assert_eq!(config, ControllerConfig::default());
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = from_vars(&[
            ("TRIBUTE_VOLUME", "0.25"),
            ("TRIBUTE_FADE_STEP_MS", "100"),
            ("TRIBUTE_UNLOCK_ON_SCROLL", "true"),
            ("TRIBUTE_BASE_PATH", "/tribute/"),
            ("OTHER_VOLUME", "0.9"),
        ])
        .expect("config");

        assert_eq!(config.volume, 0.25);
        assert_eq!(config.fade_step_ms, 100);
        assert!(config.unlock_on_scroll);
        assert_eq!(config.base_path, "/tribute/");
    }

    #[test]
    fn invalid_environment_is_rejected() {
        let err = from_vars(&[("TRIBUTE_VOLUME", "1.5")]).unwrap_err();
        assert!(matches!(err, AudioError::Config(_)));
    }

    #[test]
    fn validate_rejects_bad_timings() {
        let config = ControllerConfig {
            fade_step_ms: 0,
            ..ControllerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ControllerConfig {
            fade_step_ms: 3000,
            ..ControllerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ControllerConfig {
            monitor_interval_ms: 0,
            ..ControllerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ControllerConfig {
            max_consecutive_failures: 0,
            ..ControllerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn source_url_has_single_separator() {
        let mut config = ControllerConfig::default();
        assert_eq!(config.source_url(), "/music/Happy Birthday Song Music Box.mp3");

        config.base_path = "/birthday/".to_string();
        config.track_path = "/music/song.mp3".to_string();
        assert_eq!(config.source_url(), "/birthday/music/song.mp3");

        config.base_path = "https://example.com/site".to_string();
        config.track_path = "song.mp3".to_string();
        assert_eq!(config.source_url(), "https://example.com/site/song.mp3");
    }

    #[test]
    fn session_config_always_loops() {
        let session = ControllerConfig::default().session_config();
        assert!(session.looping);
        assert!(session.streaming);
        assert_eq!(session.volume, Volume::DEFAULT);
    }
}
