use anyhow::{Context, Result, bail};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::announcement::{CrossingMode, DecisionConfig, Detail, PredictionWindow};
use crate::dispatcher::{DEFAULT_QUEUE_SIZE, SpeechConfig};
use crate::geometry::GeoPoint;
use crate::sbs::{DEFAULT_SBS_ADDRESS, FeedSource};

/// Observer location. All three values are required before startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObserverSettings {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Feet above mean sea level
    pub altitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerSettings {
    /// Elevation threshold in degrees
    #[serde(default = "default_angle")]
    pub angle: f64,
    /// Look-ahead in seconds; enables predictive announcements
    #[serde(default)]
    pub wait: Option<f64>,
    /// Extrapolation sampling step in milliseconds
    #[serde(default = "default_step_ms")]
    pub step_ms: u64,
    #[serde(default)]
    pub radio_failure: bool,
    #[serde(default)]
    pub detail: Detail,
    /// Seconds during which a re-crossing stays silent; 0 disables
    #[serde(default)]
    pub repeat_interval: u64,
    /// Seconds of silence after which an aircraft is forgotten
    #[serde(default = "default_max_age")]
    pub max_age: u64,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_sweep_secs")]
    pub sweep_secs: u64,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            angle: default_angle(),
            wait: None,
            step_ms: default_step_ms(),
            radio_failure: false,
            detail: Detail::default(),
            repeat_interval: 0,
            max_age: default_max_age(),
            tick_ms: default_tick_ms(),
            sweep_secs: default_sweep_secs(),
        }
    }
}

/// At most one source may be chosen; none means TCP to localhost:30003
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedSettings {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub connect: Option<String>,
    #[serde(default)]
    pub stdin: bool,
    pub replay: Option<PathBuf>,
    /// Take the clock from message timestamps instead of arrival time
    #[serde(default)]
    pub message_clock: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeechSettings {
    #[serde(default = "default_speech_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    /// Print utterances instead of speaking them
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            command: default_speech_command(),
            args: Vec::new(),
            queue_size: default_queue_size(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogSettings {
    /// Append every received line here
    pub raw: Option<PathBuf>,
    /// Timestamped debug log
    pub file: Option<PathBuf>,
    /// Redraw a table of tracked aircraft on stdout instead of console logging
    #[serde(default)]
    pub live: bool,
}

/// Complete run configuration: file values with command-line overrides applied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub observer: ObserverSettings,
    #[serde(default)]
    pub trigger: TriggerSettings,
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub speech: SpeechSettings,
    #[serde(default)]
    pub log: LogSettings,
}

/// Longest accepted look-ahead
pub const MAX_WAIT_SECS: f64 = 600.0;
/// Cap on extrapolation samples per evaluation (look-ahead / step)
pub const MAX_PREDICTION_SAMPLES: u64 = 10_000;
/// Longest accepted `max_age` and `repeat_interval`
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 3600;

fn default_angle() -> f64 {
    45.0
}

fn default_step_ms() -> u64 {
    500
}

fn default_max_age() -> u64 {
    300
}

fn default_tick_ms() -> u64 {
    250
}

fn default_sweep_secs() -> u64 {
    30
}

fn default_speech_command() -> String {
    "espeak".to_string()
}

fn default_queue_size() -> usize {
    DEFAULT_QUEUE_SIZE
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let settings: Settings =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.observer()?;

        let angle = self.trigger.angle;
        if !angle.is_finite() || !(-90.0..=90.0).contains(&angle) {
            bail!("Angle must be between -90 and 90 degrees, got {}", angle);
        }
        if self.trigger.step_ms == 0 {
            bail!("Prediction step must be at least 1 ms");
        }
        if let Some(wait) = self.trigger.wait {
            if !wait.is_finite() || !(0.0..=MAX_WAIT_SECS).contains(&wait) {
                bail!("Wait must be between 0 and {} seconds, got {}", MAX_WAIT_SECS, wait);
            }
            let samples = (wait * 1000.0 / self.trigger.step_ms as f64).ceil() as u64;
            if samples > MAX_PREDICTION_SAMPLES {
                bail!(
                    "Wait of {}s at a {}ms step needs {} samples per update, limit is {}",
                    wait,
                    self.trigger.step_ms,
                    samples,
                    MAX_PREDICTION_SAMPLES
                );
            }
        }
        if self.trigger.tick_ms == 0 || self.trigger.sweep_secs == 0 {
            bail!("Tick and sweep intervals must be non-zero");
        }
        if self.trigger.max_age == 0 || self.trigger.max_age > MAX_INTERVAL_SECS {
            bail!(
                "Max age must be between 1 and {} seconds, got {}",
                MAX_INTERVAL_SECS,
                self.trigger.max_age
            );
        }
        if self.trigger.repeat_interval > MAX_INTERVAL_SECS {
            bail!(
                "Repeat interval must be at most {} seconds, got {}",
                MAX_INTERVAL_SECS,
                self.trigger.repeat_interval
            );
        }
        if self.speech.queue_size == 0 {
            bail!("Speech queue size must be non-zero");
        }
        if !self.speech.dry_run && self.speech.command.trim().is_empty() {
            bail!("Speech command is empty");
        }

        self.feed_source()?;
        Ok(())
    }

    pub fn observer(&self) -> Result<GeoPoint> {
        let (Some(latitude), Some(longitude), Some(altitude)) = (
            self.observer.latitude,
            self.observer.longitude,
            self.observer.altitude,
        ) else {
            bail!("Observer latitude, longitude and altitude are required (--lat, --lon, --alt)");
        };

        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            bail!("Latitude must be between -90 and 90, got {}", latitude);
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            bail!("Longitude must be between -180 and 180, got {}", longitude);
        }
        if !altitude.is_finite() {
            bail!("Altitude must be a number of feet, got {}", altitude);
        }

        Ok(GeoPoint::new(latitude, longitude, altitude))
    }

    /// Engine configuration. Call `validate` first; out-of-range durations
    /// are still reported here rather than wrapped.
    pub fn decision_config(&self) -> Result<DecisionConfig> {
        let mut config = DecisionConfig::new(self.observer()?);
        config.threshold_deg = self.trigger.angle;
        config.mode = match self.trigger.wait {
            Some(wait) => CrossingMode::Predictive(PredictionWindow {
                look_ahead: millis((wait * 1000.0).round(), "wait")?,
                step: millis(self.trigger.step_ms as f64, "step_ms")?,
            }),
            None => CrossingMode::Immediate,
        };
        config.radio_failure = self.trigger.radio_failure;
        config.detail = self.trigger.detail;
        config.repeat_interval = seconds(self.trigger.repeat_interval, "repeat_interval")?;
        config.max_age = seconds(self.trigger.max_age, "max_age")?;
        Ok(config)
    }

    pub fn feed_source(&self) -> Result<FeedSource> {
        let feed = &self.feed;
        let chosen = [
            feed.command.is_some(),
            feed.connect.is_some(),
            feed.stdin,
            feed.replay.is_some(),
        ]
        .iter()
        .filter(|&&set| set)
        .count();
        if chosen > 1 {
            bail!("Choose at most one feed: command, connect, stdin or replay");
        }

        let source = if let Some(ref program) = feed.command {
            FeedSource::Command {
                program: program.clone(),
                args: feed.args.clone(),
            }
        } else if feed.stdin {
            FeedSource::Stdin
        } else if let Some(ref path) = feed.replay {
            FeedSource::File(path.clone())
        } else {
            FeedSource::Tcp {
                address: feed
                    .connect
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SBS_ADDRESS.to_string()),
            }
        };
        Ok(source)
    }

    pub fn speech_config(&self) -> SpeechConfig {
        SpeechConfig {
            command: self.speech.command.clone(),
            args: self.speech.args.clone(),
            queue_size: self.speech.queue_size,
        }
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.trigger.tick_ms)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.trigger.sweep_secs)
    }
}

fn seconds(value: u64, name: &str) -> Result<Duration> {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .with_context(|| format!("{} of {} seconds is out of range", name, value))
}

fn millis(value: f64, name: &str) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 || value > i64::MAX as f64 {
        bail!("{} of {} ms is out of range", name, value);
    }
    Duration::try_milliseconds(value as i64)
        .with_context(|| format!("{} of {} ms is out of range", name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn located() -> Settings {
        let mut settings = Settings::default();
        settings.observer = ObserverSettings {
            latitude: Some(37.0),
            longitude: Some(-122.0),
            altitude: Some(250.0),
        };
        settings
    }

    #[test]
    fn test_defaults() {
        let settings = located();
        settings.validate().unwrap();

        let config = settings.decision_config().unwrap();
        assert_eq!(config.threshold_deg, 45.0);
        assert_eq!(config.mode, CrossingMode::Immediate);
        assert!(!config.radio_failure);
        assert_eq!(config.max_age, Duration::seconds(300));
        assert_eq!(
            settings.feed_source().unwrap(),
            FeedSource::Tcp {
                address: "localhost:30003".to_string()
            }
        );
        assert_eq!(settings.speech_config().command, "espeak");
    }

    #[test]
    fn test_observer_required() {
        let settings = Settings::default();
        assert!(settings.validate().is_err());

        let mut settings = located();
        settings.observer.latitude = Some(91.0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_wait_enables_prediction() {
        let mut settings = located();
        settings.trigger.wait = Some(7.5);
        let config = settings.decision_config().unwrap();
        assert_eq!(
            config.mode,
            CrossingMode::Predictive(PredictionWindow {
                look_ahead: Duration::milliseconds(7500),
                step: Duration::milliseconds(500),
            })
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut settings = located();
        settings.trigger.angle = f64::NAN;
        assert!(settings.validate().is_err());

        let mut settings = located();
        settings.trigger.step_ms = 0;
        assert!(settings.validate().is_err());

        let mut settings = located();
        settings.feed.stdin = true;
        settings.feed.connect = Some("radio:30003".to_string());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_durations_are_bounded() {
        let mut settings = located();
        settings.trigger.max_age = u64::MAX;
        assert!(settings.validate().is_err());
        assert!(settings.decision_config().is_err());

        let mut settings = located();
        settings.trigger.max_age = 10_000_000_000_000_000;
        assert!(settings.validate().is_err());
        assert!(settings.decision_config().is_err());

        let mut settings = located();
        settings.trigger.repeat_interval = u64::MAX;
        assert!(settings.validate().is_err());
        assert!(settings.decision_config().is_err());

        let mut settings = located();
        settings.trigger.max_age = MAX_INTERVAL_SECS;
        settings.trigger.repeat_interval = 600;
        settings.validate().unwrap();
        let config = settings.decision_config().unwrap();
        assert_eq!(config.max_age, Duration::days(7));
        assert_eq!(config.repeat_interval, Duration::minutes(10));
    }

    #[test]
    fn test_wait_is_bounded() {
        let mut settings = located();
        settings.trigger.wait = Some(1e9);
        assert!(settings.validate().is_err());
        assert!(settings.decision_config().is_ok_and(|c| c.mode != CrossingMode::Immediate));

        let mut settings = located();
        settings.trigger.wait = Some(-1.0);
        assert!(settings.validate().is_err());

        // Within the window limit, but too many samples at a 1ms step
        let mut settings = located();
        settings.trigger.wait = Some(60.0);
        settings.trigger.step_ms = 1;
        assert!(settings.validate().is_err());

        settings.trigger.step_ms = 100;
        settings.validate().unwrap();
    }

    #[test]
    fn test_negative_angle_allowed() {
        let mut settings = located();
        settings.trigger.angle = -5.0;
        settings.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overhead.toml");
        std::fs::write(
            &path,
            r#"
[observer]
latitude = 51.47
longitude = -0.45
altitude = 80

[trigger]
angle = 30
wait = 5
detail = "full"
radio_failure = true

[feed]
command = "dump1090"
args = ["--net", "--quiet"]

[speech]
command = "say"
"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        settings.validate().unwrap();
        assert_eq!(settings.observer.latitude, Some(51.47));
        assert_eq!(settings.trigger.detail, Detail::Full);
        assert_eq!(settings.trigger.max_age, 300);
        assert_eq!(
            settings.feed_source().unwrap(),
            FeedSource::Command {
                program: "dump1090".to_string(),
                args: vec!["--net".to_string(), "--quiet".to_string()],
            }
        );
        assert_eq!(settings.speech.queue_size, 16);

        let config = settings.decision_config().unwrap();
        assert!(config.radio_failure);
        assert_eq!(config.threshold_deg, 30.0);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overhead.toml");
        std::fs::write(&path, "[trigger]\nangel = 30\n").unwrap();
        assert!(Settings::load(&path).is_err());
    }
}
