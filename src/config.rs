//! TOML-based simulation configuration and preset definitions.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::Deserialize;
use thiserror::Error;

use crate::sim::household::SwitchPolicy;

/// Top-level simulation configuration parsed from TOML.
///
/// All fields have defaults matching the real-time preset. Load from TOML
/// with [`ScenarioConfig::from_toml_file`] or use a preset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Driver mode, transport and storage location.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Day/night switching quotas.
    #[serde(default)]
    pub household: HouseholdConfig,
    /// Real-time cadence parameters.
    #[serde(default)]
    pub realtime: RealTimeConfig,
    /// Historical replay parameters.
    #[serde(default)]
    pub historical: HistoricalConfig,
    /// Time-series sink connection.
    #[serde(default)]
    pub sink: SinkConfig,
}

/// Driver mode, transport and storage location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// `"realtime"` (unbounded, wall clock) or `"historical"` (replay up to now).
    pub mode: String,
    /// `"http"` (POST to each node endpoint) or `"influx"` (time-series sink).
    pub transport: String,
    /// Directory holding `nodes.json` and `users.json`.
    pub data_dir: PathBuf,
    /// Seed for device selection; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mode: "realtime".to_string(),
            transport: "http".to_string(),
            data_dir: PathBuf::from("data"),
            seed: None,
        }
    }
}

/// Day/night switching quotas.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HouseholdConfig {
    /// Devices flipped per cycle during the day.
    pub day_quota: usize,
    /// Devices flipped per cycle at night.
    pub night_quota: usize,
    /// First daytime hour (inclusive).
    pub day_start_hour: u32,
    /// First night-time hour (inclusive).
    pub night_start_hour: u32,
}

impl Default for HouseholdConfig {
    fn default() -> Self {
        Self {
            day_quota: 5,
            night_quota: 3,
            day_start_hour: 6,
            night_start_hour: 21,
        }
    }
}

/// Real-time cadence parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RealTimeConfig {
    /// Pause between loop iterations (seconds).
    pub interval_secs: u64,
    /// Minimum wall time between switching cycles (minutes).
    pub switch_interval_minutes: i64,
    /// Per-request HTTP timeout (seconds).
    pub http_timeout_secs: u64,
}

impl Default for RealTimeConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            switch_interval_minutes: 1,
            http_timeout_secs: 10,
        }
    }
}

/// Historical replay parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoricalConfig {
    /// First synthetic timestamp, e.g. `"2025-10-01T00:00:00"`.
    pub start: NaiveDateTime,
    /// Last synthetic timestamp (exclusive); `None` replays up to wall-clock now.
    pub end: Option<NaiveDateTime>,
    /// Synthetic time advanced per iteration (seconds).
    pub increment_secs: i64,
    /// Minimum simulated time between switching cycles (minutes).
    pub switch_interval_minutes: i64,
    /// Real pause between iterations (milliseconds).
    pub pause_ms: u64,
}

impl Default for HistoricalConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2025, 10, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
            end: None,
            increment_secs: 20,
            switch_interval_minutes: 15,
            pause_ms: 0,
        }
    }
}

/// InfluxDB v2 connection used by the `influx` transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SinkConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            token: String::new(),
            org: String::new(),
            bucket: String::new(),
        }
    }
}

impl SinkConfig {
    /// Environment variables that override sink fields, in field order.
    pub const ENV_VARS: [&'static str; 4] = ["INFLUX_URL", "INFLUX_TOKEN", "INFLUX_ORG", "INFLUX_BUCKET"];

    /// Replaces fields with the matching `INFLUX_*` variables when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let [url, token, org, bucket] = Self::ENV_VARS;
        let fields = [
            (url, &mut self.url),
            (token, &mut self.token),
            (org, &mut self.org),
            (bucket, &mut self.bucket),
        ];
        for (key, field) in fields {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *field = value;
            }
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"household.day_quota"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Driver mode selected by `simulation.mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    RealTime,
    Historical,
}

impl ScenarioConfig {
    /// Real-time preset: wall clock, POST to node endpoints every 5 s,
    /// switching cycle every minute.
    pub fn realtime() -> Self {
        Self::default()
    }

    /// Historical preset: replay from 2025-10-01 in 20 s steps into the
    /// time-series sink, switching cycle every 15 simulated minutes.
    pub fn historical() -> Self {
        Self {
            simulation: SimulationConfig {
                mode: "historical".to_string(),
                transport: "influx".to_string(),
                ..SimulationConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &'static [&'static str] = &["realtime", "historical"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "realtime" => Ok(Self::realtime()),
            "historical" => Ok(Self::historical()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Parsed `simulation.mode`; call after [`ScenarioConfig::validate`].
    pub fn mode(&self) -> Mode {
        if self.simulation.mode == "historical" {
            Mode::Historical
        } else {
            Mode::RealTime
        }
    }

    /// Switching policy for the configured mode.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the switch interval does not fit a `TimeDelta`.
    pub fn switch_policy(&self) -> Result<SwitchPolicy, ConfigError> {
        let (field, minutes) = match self.mode() {
            Mode::RealTime => (
                "realtime.switch_interval_minutes",
                self.realtime.switch_interval_minutes,
            ),
            Mode::Historical => (
                "historical.switch_interval_minutes",
                self.historical.switch_interval_minutes,
            ),
        };
        let interval = TimeDelta::try_minutes(minutes).ok_or_else(|| out_of_range(field))?;
        let h = &self.household;
        Ok(SwitchPolicy {
            interval,
            day_quota: h.day_quota,
            night_quota: h.night_quota,
            day_start_hour: h.day_start_hour,
            night_start_hour: h.night_start_hour,
        })
    }

    /// Synthetic time advanced per replayed iteration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `historical.increment_secs` does not fit a `TimeDelta`.
    pub fn replay_increment(&self) -> Result<TimeDelta, ConfigError> {
        TimeDelta::try_seconds(self.historical.increment_secs)
            .ok_or_else(|| out_of_range("historical.increment_secs"))
    }

    /// Per-request timeout shared by both transports.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.realtime.http_timeout_secs)
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let s = &self.simulation;

        if s.mode != "realtime" && s.mode != "historical" {
            errors.push(ConfigError::new(
                "simulation.mode",
                format!("must be \"realtime\" or \"historical\", got \"{}\"", s.mode),
            ));
        }
        if s.transport != "http" && s.transport != "influx" {
            errors.push(ConfigError::new(
                "simulation.transport",
                format!("must be \"http\" or \"influx\", got \"{}\"", s.transport),
            ));
        }

        let h = &self.household;
        if h.day_start_hour > 23 {
            errors.push(ConfigError::new("household.day_start_hour", "must be <= 23"));
        }
        if h.night_start_hour > 24 {
            errors.push(ConfigError::new("household.night_start_hour", "must be <= 24"));
        }
        if h.day_start_hour >= h.night_start_hour {
            errors.push(ConfigError::new(
                "household.day_start_hour",
                "must be < household.night_start_hour",
            ));
        }

        let rt = &self.realtime;
        if rt.interval_secs == 0 {
            errors.push(ConfigError::new("realtime.interval_secs", "must be > 0"));
        }
        if rt.switch_interval_minutes < 0 {
            errors.push(ConfigError::new("realtime.switch_interval_minutes", "must be >= 0"));
        } else if TimeDelta::try_minutes(rt.switch_interval_minutes).is_none() {
            errors.push(out_of_range("realtime.switch_interval_minutes"));
        }
        if rt.http_timeout_secs == 0 {
            errors.push(ConfigError::new("realtime.http_timeout_secs", "must be > 0"));
        }

        let hist = &self.historical;
        if hist.increment_secs <= 0 {
            errors.push(ConfigError::new("historical.increment_secs", "must be > 0"));
        } else if TimeDelta::try_seconds(hist.increment_secs).is_none() {
            errors.push(out_of_range("historical.increment_secs"));
        }
        if hist.switch_interval_minutes < 0 {
            errors.push(ConfigError::new(
                "historical.switch_interval_minutes",
                "must be >= 0",
            ));
        } else if TimeDelta::try_minutes(hist.switch_interval_minutes).is_none() {
            errors.push(out_of_range("historical.switch_interval_minutes"));
        }
        if hist.end.is_some_and(|end| end <= hist.start) {
            errors.push(ConfigError::new("historical.end", "must be > historical.start"));
        }

        if s.transport == "influx" {
            if self.sink.url.trim().is_empty() {
                errors.push(ConfigError::new("sink.url", "must be set for the influx transport"));
            }
            if self.sink.bucket.trim().is_empty() {
                errors.push(ConfigError::new(
                    "sink.bucket",
                    "must be set for the influx transport (or INFLUX_BUCKET)",
                ));
            }
        }

        errors
    }
}

fn out_of_range(field: &str) -> ConfigError {
    ConfigError::new(field, "out of range")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_preset_valid() {
        let cfg = ScenarioConfig::realtime();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "realtime should be valid: {errors:?}");
        assert_eq!(cfg.mode(), Mode::RealTime);
        assert_eq!(cfg.switch_policy().expect("policy").interval, TimeDelta::minutes(1));
    }

    #[test]
    fn historical_preset_needs_bucket() {
        let mut cfg = ScenarioConfig::historical();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "sink.bucket"));

        cfg.sink.bucket = "household".to_string();
        assert!(cfg.validate().is_empty());
        assert_eq!(cfg.switch_policy().expect("policy").interval, TimeDelta::minutes(15));
    }

    #[test]
    fn from_preset_unknown() {
        let err = ScenarioConfig::from_preset("nonexistent");
        assert!(err.is_err());
        let e = err.unwrap_err();
        assert!(e.message.contains("unknown preset"));
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[simulation]
mode = "historical"
transport = "influx"
data_dir = "/var/lib/waveslab"
seed = 7

[household]
day_quota = 4
night_quota = 2
day_start_hour = 7
night_start_hour = 22

[historical]
start = "2025-11-14T06:00:00"
end = "2025-11-14T07:00:00"
increment_secs = 30
switch_interval_minutes = 10

[sink]
url = "http://influx:8086"
token = "t"
org = "waves"
bucket = "household"
"#;
        let cfg = ScenarioConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| c.mode()), Some(Mode::Historical));
        assert_eq!(cfg.as_ref().and_then(|c| c.simulation.seed), Some(7));
        assert_eq!(cfg.as_ref().map(|c| c.historical.increment_secs), Some(30));
        assert_eq!(
            cfg.as_ref().map(|c| c.validate().len()),
            Some(0),
            "parsed config should validate"
        );
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[household]
day_quota = 5
bogus_field = true
"#;
        let result = ScenarioConfig::from_toml_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn validation_catches_bad_mode_and_transport() {
        let mut cfg = ScenarioConfig::realtime();
        cfg.simulation.mode = "turbo".to_string();
        cfg.simulation.transport = "carrier-pigeon".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "simulation.mode"));
        assert!(errors.iter().any(|e| e.field == "simulation.transport"));
    }

    #[test]
    fn validation_catches_inverted_day_window() {
        let mut cfg = ScenarioConfig::realtime();
        cfg.household.day_start_hour = 22;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "household.day_start_hour"));
    }

    #[test]
    fn validation_catches_zero_increment() {
        let mut cfg = ScenarioConfig::realtime();
        cfg.historical.increment_secs = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "historical.increment_secs"));
    }

    #[test]
    fn validation_catches_realtime_switch_interval_out_of_range() {
        let cfg = ScenarioConfig::from_toml_str("[realtime]\nswitch_interval_minutes = 9223372036854775807")
            .expect("parses");
        let errors = cfg.validate();
        assert!(
            errors
                .iter()
                .any(|e| e.field == "realtime.switch_interval_minutes" && e.message == "out of range")
        );
        assert!(cfg.switch_policy().is_err());
    }

    #[test]
    fn validation_catches_historical_switch_interval_out_of_range() {
        let mut cfg = ScenarioConfig::historical();
        cfg.sink.bucket = "household".to_string();
        cfg.historical.switch_interval_minutes = i64::MAX;
        let errors = cfg.validate();
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert_eq!(errors[0].field, "historical.switch_interval_minutes");
        assert!(cfg.switch_policy().is_err());
    }

    #[test]
    fn validation_catches_increment_out_of_range() {
        let mut cfg = ScenarioConfig::historical();
        cfg.sink.bucket = "household".to_string();
        cfg.historical.increment_secs = i64::MAX;
        let errors = cfg.validate();
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert_eq!(errors[0].field, "historical.increment_secs");
        assert_eq!(errors[0].message, "out of range");
        assert!(cfg.replay_increment().is_err());

        cfg.historical.increment_secs = 20;
        assert_eq!(cfg.replay_increment().ok(), Some(TimeDelta::seconds(20)));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[simulation]
seed = 99
"#;
        let cfg = ScenarioConfig::from_toml_str(toml);
        assert!(cfg.is_ok());
        let cfg = cfg.ok();
        // seed overridden
        assert_eq!(cfg.as_ref().and_then(|c| c.simulation.seed), Some(99));
        // quotas kept default
        assert_eq!(cfg.as_ref().map(|c| c.household.day_quota), Some(5));
        assert_eq!(cfg.as_ref().map(|c| c.realtime.interval_secs), Some(5));
    }

    #[test]
    fn env_overrides_replace_non_empty_values() {
        let mut sink = SinkConfig::default();
        sink.apply_overrides(|key| match key {
            "INFLUX_URL" => Some("http://influx:8086".to_string()),
            "INFLUX_BUCKET" => Some("household".to_string()),
            "INFLUX_ORG" => Some(String::new()),
            _ => None,
        });
        assert_eq!(sink.url, "http://influx:8086");
        assert_eq!(sink.bucket, "household");
        assert_eq!(sink.org, "");
    }
}
