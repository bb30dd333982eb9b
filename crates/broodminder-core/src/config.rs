//! Decoder and monitor configuration.
//!
//! Configuration is TOML; every section and key is optional.
//!
//! ```toml
//! [tracker]
//! rotation_period_secs = 5
//! stale_after_periods = 6
//!
//! [monitor]
//! channel_capacity = 100
//! prune_interval_secs = 5
//! deduplicate = true
//! max_reading_age_secs = 60
//! device_filter = ["43:0A:1C", "06:09:16:52:01:2F"]
//!
//! [decoder]
//! scale_factor = 2.0
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use broodminder_types::{BdAddr, DeviceIdentity};

use crate::monitor::MonitorOptions;
use crate::rotation::TrackerOptions;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hub rotation tracking.
    pub tracker: TrackerConfig,
    /// Advertisement monitor.
    pub monitor: MonitorConfig,
    /// Reading interpretation.
    pub decoder: DecoderConfig,
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: None,
            source: e,
        })
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: Some(path.as_ref().to_path_buf()),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Rotation period and staleness multiple are non-zero
    /// - Channel capacity and prune interval are non-zero
    /// - Device filter entries are identities or addresses, without duplicates
    /// - Scale factor is a positive finite number
    ///
    /// # Example
    ///
    /// ```
    /// use broodminder_core::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.tracker.validate());
        errors.extend(self.monitor.validate());
        errors.extend(self.decoder.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Tracker options for this configuration.
    pub fn tracker_options(&self) -> TrackerOptions {
        TrackerOptions::from(&self.tracker)
    }

    /// Monitor options for this configuration, including the tracker.
    pub fn monitor_options(&self) -> MonitorOptions {
        MonitorOptions::from(&self.monitor).tracker(self.tracker_options())
    }
}

/// Hub rotation tracking configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Nominal seconds a hub spends on each relayed device.
    pub rotation_period_secs: u64,
    /// Rotation periods without a refresh before an entry is stale.
    pub stale_after_periods: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let options = TrackerOptions::default();
        Self {
            rotation_period_secs: options.rotation_period.as_secs(),
            stale_after_periods: options.stale_after_periods,
        }
    }
}

impl TrackerConfig {
    /// Validate tracker configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.rotation_period_secs == 0 {
            errors.push(ValidationError::new(
                "tracker.rotation_period_secs",
                "rotation period must be at least 1 second",
            ));
        }
        if self.stale_after_periods == 0 {
            errors.push(ValidationError::new(
                "tracker.stale_after_periods",
                "staleness threshold must be at least 1 period",
            ));
        }
        errors
    }
}

impl From<&TrackerConfig> for TrackerOptions {
    fn from(config: &TrackerConfig) -> Self {
        TrackerOptions::new()
            .rotation_period(Duration::from_secs(config.rotation_period_secs))
            .stale_after_periods(config.stale_after_periods)
    }
}

/// Advertisement monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Event channel capacity.
    pub channel_capacity: usize,
    /// Seconds between stale-entry pruning passes.
    pub prune_interval_secs: u64,
    /// Only emit readings when values change.
    pub deduplicate: bool,
    /// Seconds after which an unchanged reading is emitted again.
    pub max_reading_age_secs: u64,
    /// Devices to emit readings for (identities or addresses; empty = all).
    pub device_filter: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let options = MonitorOptions::default();
        Self {
            channel_capacity: options.channel_capacity,
            prune_interval_secs: options.prune_interval.as_secs(),
            deduplicate: options.deduplicate,
            max_reading_age_secs: options.max_reading_age.as_secs(),
            device_filter: options.device_filter,
        }
    }
}

impl MonitorConfig {
    /// Validate monitor configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.channel_capacity == 0 {
            errors.push(ValidationError::new(
                "monitor.channel_capacity",
                "channel capacity must be at least 1",
            ));
        }
        if self.prune_interval_secs == 0 {
            errors.push(ValidationError::new(
                "monitor.prune_interval_secs",
                "prune interval must be at least 1 second",
            ));
        }

        let mut seen = HashSet::new();
        for (i, entry) in self.device_filter.iter().enumerate() {
            let field = format!("monitor.device_filter[{}]", i);
            let is_identity = entry.parse::<DeviceIdentity>().is_ok();
            let is_address = entry.parse::<BdAddr>().is_ok();
            if !is_identity && !is_address {
                errors.push(ValidationError::new(
                    field.clone(),
                    format!(
                        "'{}' is neither a device identity (43:0A:1C) nor an address",
                        entry
                    ),
                ));
            }
            if !seen.insert(entry.to_uppercase()) {
                errors.push(ValidationError::new(
                    field,
                    format!("duplicate device '{}'", entry),
                ));
            }
        }

        errors
    }
}

impl From<&MonitorConfig> for MonitorOptions {
    fn from(config: &MonitorConfig) -> Self {
        MonitorOptions::new()
            .channel_capacity(config.channel_capacity)
            .prune_interval(Duration::from_secs(config.prune_interval_secs))
            .deduplicate(config.deduplicate)
            .max_reading_age(Duration::from_secs(config.max_reading_age_secs))
            .filter_devices(config.device_filter.clone())
    }
}

/// Reading interpretation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Multiplier applied to scale readings to estimate total hive weight.
    pub scale_factor: f32,
}

/// Scale factor for a scale under one end of the hive.
pub const DEFAULT_SCALE_FACTOR: f32 = 2.0;

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
        }
    }
}

impl DecoderConfig {
    /// Validate decoder configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            errors.push(ValidationError::new(
                "decoder.scale_factor",
                format!("scale factor {} must be a positive number", self.scale_factor),
            ));
        }
        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The config text is not valid TOML for [`Config`].
    #[error("Failed to parse config{}: {source}", describe_path(.path.as_deref()))]
    Parse {
        /// File the text came from, `None` for in-memory text.
        path: Option<PathBuf>,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// One or more values failed validation.
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path (e.g., `tracker.rotation_period_secs`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn describe_path(path: Option<&Path>) -> String {
    path.map(|p| format!(" file {}", p.display()))
        .unwrap_or_default()
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.tracker.rotation_period_secs, 5);
        assert_eq!(config.tracker.stale_after_periods, 6);
        assert_eq!(config.monitor.channel_capacity, 100);
        assert!(config.monitor.deduplicate);
        assert_eq!(config.decoder.scale_factor, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        let config = Config::from_toml_str(
            r#"
            [tracker]
            stale_after_periods = 3

            [monitor]
            device_filter = ["43:0A:1C"]
            "#,
        )
        .unwrap();
        assert_eq!(config.tracker.rotation_period_secs, 5);
        assert_eq!(config.tracker.stale_after_periods, 3);
        assert_eq!(config.monitor.device_filter, vec!["43:0A:1C"]);
        assert_eq!(config.decoder, DecoderConfig::default());
    }

    #[test]
    fn test_empty_config() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_parse_error() {
        let err = Config::from_toml_str("[tracker]\nrotation_period_secs = \"five\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { path: None, .. }));
        assert!(err.to_string().starts_with("Failed to parse config:"));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = Config::default();
        config.tracker.rotation_period_secs = 0;
        config.monitor.channel_capacity = 0;
        config.monitor.device_filter = vec![
            "43:0A:1C".to_string(),
            "not-a-device".to_string(),
            "43:0a:1c".to_string(),
        ];
        config.decoder.scale_factor = f32::NAN;

        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation errors");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "tracker.rotation_period_secs",
                "monitor.channel_capacity",
                "monitor.device_filter[1]",
                "monitor.device_filter[2]",
                "decoder.scale_factor",
            ]
        );
    }

    #[test]
    fn test_validation_error_display() {
        let err = ConfigError::Validation(vec![ValidationError::new(
            "monitor.prune_interval_secs",
            "prune interval must be at least 1 second",
        )]);
        assert_eq!(
            err.to_string(),
            "Configuration validation failed:\n  - monitor.prune_interval_secs: prune interval must be at least 1 second"
        );
    }

    #[test]
    fn test_options_conversion() {
        let config = Config::from_toml_str(
            r#"
            [tracker]
            rotation_period_secs = 4
            stale_after_periods = 2

            [monitor]
            deduplicate = false
            max_reading_age_secs = 10
            "#,
        )
        .unwrap();

        let tracker = config.tracker_options();
        assert_eq!(tracker.stale_after(), Duration::from_secs(8));

        let monitor = config.monitor_options();
        assert!(!monitor.deduplicate);
        assert_eq!(monitor.max_reading_age, Duration::from_secs(10));
        assert_eq!(monitor.tracker, tracker);
        assert!(monitor.validate().is_ok());
    }

    #[test]
    fn test_default_options_match() {
        let config = Config::default();
        assert_eq!(config.monitor_options(), MonitorOptions::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[decoder]\nscale_factor = 1.0").unwrap();

        let config = Config::load_validated(file.path()).unwrap();
        assert_eq!(config.decoder.scale_factor, 1.0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/broodminder.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_validated_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[monitor]\nprune_interval_secs = 0").unwrap();
        assert!(matches!(
            Config::load_validated(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }
}
