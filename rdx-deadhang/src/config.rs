//! Defines all configuration structures for the deadhang timer.
//!
//! These structs are designed to be deserialized from a TOML file and
//! `DEADHANG__*` environment variables using the `config` crate. Every field
//! has a default, so a missing file yields a working configuration.

use crate::audio::AudioSettings;
use crate::profile::WorkoutProfile;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// The top-level configuration for the timer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeadhangConfig {
    /// How often the background clock re-reads the wall clock.
    pub resolution: ClockResolution,

    /// Audio cue preferences.
    pub audio: AudioSettings,

    /// User-defined profiles offered next to the built-in templates.
    pub profiles: Vec<WorkoutProfile>,
}

/// Defines the polling speed of the clock engine.
///
/// This only controls how quickly a change of the remaining whole seconds is
/// noticed. Reported precision is always one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockResolution {
    /// 20 polls per second.
    High,
    /// 10 polls per second.
    #[default]
    Medium,
    /// 1 poll per second. Suitable for headless runs and tests.
    Low,
    /// A user-defined speed in polls per second.
    Custom { ticks_per_second: u64 },
}

impl ClockResolution {
    /// The interval between two polls of the clock engine.
    pub fn interval(&self) -> Duration {
        match self {
            ClockResolution::High => Duration::from_millis(50),
            ClockResolution::Medium => Duration::from_millis(100),
            ClockResolution::Low => Duration::from_secs(1),
            ClockResolution::Custom { ticks_per_second } => {
                Duration::from_millis(1000 / (*ticks_per_second).clamp(1, 1000))
            }
        }
    }
}

impl DeadhangConfig {
    /// Loads the configuration from an optional TOML file, then applies
    /// `DEADHANG__*` environment overrides (e.g. `DEADHANG__RESOLUTION=low`).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("DEADHANG").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Parses a configuration from TOML text, without environment overrides.
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Durations;

    #[test]
    fn empty_config_uses_defaults() {
        let config = DeadhangConfig::from_toml_str("").unwrap();
        assert_eq!(config.resolution, ClockResolution::Medium);
        assert_eq!(config.resolution.interval(), Duration::from_millis(100));
        assert!(config.audio.enabled);
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn parses_resolution_audio_and_profiles() {
        let text = r#"
            resolution = "low"

            [audio]
            countdown_seconds = 5
            enable_countdown = false

            [[profiles]]
            name = "Pyramid"
            repetitions = 3
            hang_times = [10, 20, 30]
            pause_times = 15
            start_pause = 5
        "#;
        let config = DeadhangConfig::from_toml_str(text).unwrap();
        assert_eq!(config.resolution, ClockResolution::Low);
        assert_eq!(config.audio.countdown_seconds, 5);
        assert!(!config.audio.enable_countdown);
        assert!(config.audio.enable_start_end);

        let pyramid = &config.profiles[0];
        assert_eq!(pyramid.hang_times, Durations::PerRep(vec![10, 20, 30]));
        assert_eq!(pyramid.pause_times, Durations::Uniform(15));
        assert_eq!(pyramid.validate(), Ok(()));
    }

    #[test]
    fn custom_resolution_is_clamped() {
        let custom = ClockResolution::Custom { ticks_per_second: 4 };
        assert_eq!(custom.interval(), Duration::from_millis(250));
        let silly = ClockResolution::Custom { ticks_per_second: 0 };
        assert_eq!(silly.interval(), Duration::from_secs(1));
    }
}
