//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Sit/stand and Pomodoro interval lengths
//! - Auto-start and meeting-mute behaviour
//! - Posture alert backoff tuning
//! - Posture nudge window
//!
//! Configuration is stored at `~/.config/standwell/config.toml`. Defaults are
//! applied once, at load time.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, CoreError, Result};
use crate::posture::{BackoffConfig, NudgeConfig};
use crate::scheduler::{Intervals, SchedulerOptions, MAX_INTERVAL_SECS};

/// Interval lengths and mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_sitting_minutes")]
    pub sitting_minutes: u64,
    #[serde(default = "default_standing_minutes")]
    pub standing_minutes: u64,
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u64,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u64,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u64,
    #[serde(default = "default_intervals_before_long_break")]
    pub intervals_before_long_break: u32,
    #[serde(default)]
    pub pomodoro_enabled: bool,
    #[serde(default = "default_true")]
    pub auto_start: bool,
}

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Hold notifications while the calendar shows a meeting.
    #[serde(default)]
    pub calendar_mute: bool,
}

/// Posture alert backoff tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_backoff_exponent")]
    pub backoff_exponent: f64,
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
    #[serde(default = "default_reset_after_secs")]
    pub reset_after_secs: u64,
    #[serde(default = "default_reset_check_secs")]
    pub reset_check_secs: u64,
}

/// Random posture nudges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NudgesConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_nudge_min_minutes")]
    pub min_minutes: u64,
    #[serde(default = "default_nudge_max_minutes")]
    pub max_minutes: u64,
    #[serde(default = "default_nudge_check_secs")]
    pub check_secs: u64,
}

/// Calendar cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u64,
    /// JSON file with a list of events, re-read on every refresh.
    #[serde(default)]
    pub events_file: Option<PathBuf>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/standwell/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub posture: PostureConfig,
    #[serde(default)]
    pub nudges: NudgesConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
}

// Default functions
fn default_sitting_minutes() -> u64 {
    45
}
fn default_standing_minutes() -> u64 {
    15
}
fn default_focus_minutes() -> u64 {
    25
}
fn default_short_break_minutes() -> u64 {
    5
}
fn default_long_break_minutes() -> u64 {
    15
}
fn default_intervals_before_long_break() -> u32 {
    4
}
fn default_true() -> bool {
    true
}
fn default_backoff_base_secs() -> u64 {
    60
}
fn default_backoff_exponent() -> f64 {
    3.0
}
fn default_backoff_max_secs() -> u64 {
    300
}
fn default_reset_after_secs() -> u64 {
    30 * 60
}
fn default_reset_check_secs() -> u64 {
    30
}
fn default_nudge_min_minutes() -> u64 {
    15
}
fn default_nudge_max_minutes() -> u64 {
    45
}
fn default_nudge_check_secs() -> u64 {
    60
}
fn default_refresh_minutes() -> u64 {
    15
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sitting_minutes: default_sitting_minutes(),
            standing_minutes: default_standing_minutes(),
            focus_minutes: default_focus_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            intervals_before_long_break: default_intervals_before_long_break(),
            pomodoro_enabled: false,
            auto_start: true,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            calendar_mute: false,
        }
    }
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backoff_base_secs: default_backoff_base_secs(),
            backoff_exponent: default_backoff_exponent(),
            backoff_max_secs: default_backoff_max_secs(),
            reset_after_secs: default_reset_after_secs(),
            reset_check_secs: default_reset_check_secs(),
        }
    }
}

impl Default for NudgesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_minutes: default_nudge_min_minutes(),
            max_minutes: default_nudge_max_minutes(),
            check_secs: default_nudge_check_secs(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            refresh_minutes: default_refresh_minutes(),
            events_file: None,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> std::result::Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                ),
                serde_json::Value::Number(n) if n.is_f64() => value
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(serde_json::Value::Number)
                    .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?,
                serde_json::Value::Number(_) => serde_json::Value::Number(
                    value
                        .parse::<u64>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as integer")))?
                        .into(),
                ),
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    return Err(invalid("not a leaf key".to_string()));
                }
                // Optional paths: `none` clears them.
                serde_json::Value::Null | serde_json::Value::String(_) => {
                    if value.eq_ignore_ascii_case("none") {
                        serde_json::Value::Null
                    } else {
                        serde_json::Value::String(value.into())
                    }
                }
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or create the default file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                CoreError::from(ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key, in memory only. Type of the existing
    /// value is preserved; the result must pass [`validate`](Self::validate).
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json)?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Every dot-path key with its current value, sorted.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }
        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out.sort();
        out
    }

    /// Check values the scheduler would otherwise silently reject.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        const MAX_MINUTES: u64 = MAX_INTERVAL_SECS / 60;
        const MAX_CHECK_SECS: u64 = 24 * 60 * 60;
        let bounded = [
            ("schedule.sitting_minutes", self.schedule.sitting_minutes, MAX_MINUTES),
            ("schedule.standing_minutes", self.schedule.standing_minutes, MAX_MINUTES),
            ("schedule.focus_minutes", self.schedule.focus_minutes, MAX_MINUTES),
            ("schedule.short_break_minutes", self.schedule.short_break_minutes, MAX_MINUTES),
            ("schedule.long_break_minutes", self.schedule.long_break_minutes, MAX_MINUTES),
            (
                "schedule.intervals_before_long_break",
                self.schedule.intervals_before_long_break as u64,
                u64::from(u32::MAX),
            ),
            ("posture.reset_check_secs", self.posture.reset_check_secs, MAX_CHECK_SECS),
            ("nudges.check_secs", self.nudges.check_secs, MAX_CHECK_SECS),
            ("nudges.min_minutes", self.nudges.min_minutes, MAX_MINUTES),
            ("nudges.max_minutes", self.nudges.max_minutes, MAX_MINUTES),
        ];
        for (key, value, max) in bounded {
            if value == 0 || value > max {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("must be between 1 and {max}"),
                });
            }
        }
        if self.nudges.min_minutes > self.nudges.max_minutes {
            return Err(ConfigError::InvalidValue {
                key: "nudges.max_minutes".to_string(),
                message: "must not be less than nudges.min_minutes".to_string(),
            });
        }
        let exponent = self.posture.backoff_exponent;
        if exponent.is_nan() || exponent < 1.0 {
            return Err(ConfigError::InvalidValue {
                key: "posture.backoff_exponent".to_string(),
                message: "must be at least 1.0".to_string(),
            });
        }
        Ok(())
    }

    pub fn intervals(&self) -> Intervals {
        let s = &self.schedule;
        Intervals {
            sitting_secs: s.sitting_minutes.saturating_mul(60),
            standing_secs: s.standing_minutes.saturating_mul(60),
            focus_secs: s.focus_minutes.saturating_mul(60),
            short_break_secs: s.short_break_minutes.saturating_mul(60),
            long_break_secs: s.long_break_minutes.saturating_mul(60),
            intervals_before_long_break: s.intervals_before_long_break,
        }
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            auto_start: self.schedule.auto_start,
            calendar_mute: self.notifications.calendar_mute,
            notifications_enabled: self.notifications.enabled,
        }
    }

    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            base_secs: self.posture.backoff_base_secs,
            exponent: self.posture.backoff_exponent,
            max_secs: self.posture.backoff_max_secs,
            reset_after_secs: self.posture.reset_after_secs,
            reset_check_secs: self.posture.reset_check_secs,
        }
    }

    pub fn nudges(&self) -> NudgeConfig {
        NudgeConfig {
            min_interval_secs: self.nudges.min_minutes.saturating_mul(60),
            max_interval_secs: self.nudges.max_minutes.saturating_mul(60),
            check_secs: self.nudges.check_secs,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn missing_sections_take_defaults() {
        let parsed: Config = toml::from_str("[schedule]\nsitting_minutes = 50\n").unwrap();
        assert_eq!(parsed.schedule.sitting_minutes, 50);
        assert_eq!(parsed.schedule.standing_minutes, 15);
        assert!(parsed.schedule.auto_start);
        assert_eq!(parsed.posture.backoff_max_secs, 300);
        assert_eq!(parsed.calendar.refresh_minutes, 15);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("schedule.sitting_minutes").as_deref(), Some("45"));
        assert_eq!(cfg.get("notifications.calendar_mute").as_deref(), Some("false"));
        assert_eq!(cfg.get("posture.backoff_exponent").as_deref(), Some("3.0"));
        assert!(cfg.get("schedule.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("schedule.standing_minutes", "20").unwrap();
        cfg.set("notifications.calendar_mute", "true").unwrap();
        cfg.set("posture.backoff_exponent", "2.5").unwrap();
        assert_eq!(cfg.schedule.standing_minutes, 20);
        assert!(cfg.notifications.calendar_mute);
        assert_eq!(cfg.posture.backoff_exponent, 2.5);
    }

    #[test]
    fn set_optional_path() {
        let mut cfg = Config::default();
        cfg.set("calendar.events_file", "/tmp/events.json").unwrap();
        assert_eq!(cfg.calendar.events_file, Some(PathBuf::from("/tmp/events.json")));
        cfg.set("calendar.events_file", "none").unwrap();
        assert_eq!(cfg.calendar.events_file, None);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("schedule.nonexistent", "1"),
            Err(crate::error::CoreError::Config(ConfigError::UnknownKey(_)))
        ));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.set("schedule.auto_start", "sometimes").is_err());
        assert!(cfg.set("schedule.sitting_minutes", "-5").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn set_rejects_zero_interval() {
        let mut cfg = Config::default();
        assert!(cfg.set("schedule.sitting_minutes", "0").is_err());
        assert_eq!(cfg.schedule.sitting_minutes, 45);
    }

    #[test]
    fn set_rejects_oversized_interval() {
        let mut cfg = Config::default();
        let err = cfg.set("schedule.sitting_minutes", "999999999999999").unwrap_err();
        assert!(err.to_string().contains("schedule.sitting_minutes"));
        assert_eq!(cfg.schedule.sitting_minutes, 45);

        cfg.set("schedule.sitting_minutes", "10080").unwrap();
        assert!(cfg.intervals().simple_valid());
        assert!(cfg.set("schedule.sitting_minutes", "10081").is_err());
    }

    #[test]
    fn validate_rejects_inverted_nudge_window() {
        let mut cfg = Config::default();
        cfg.nudges.min_minutes = 50;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn conversions_use_seconds() {
        let cfg = Config::default();
        let intervals = cfg.intervals();
        assert_eq!(intervals.sitting_secs, 2700);
        assert_eq!(intervals.standing_secs, 900);
        assert_eq!(cfg.nudges().min_interval_secs, 900);
        assert_eq!(cfg.nudges().max_interval_secs, 2700);
        assert_eq!(cfg.backoff(), BackoffConfig::default());
        assert_eq!(cfg.scheduler_options(), SchedulerOptions::default());
    }

    #[test]
    fn entries_list_every_leaf() {
        let entries = Config::default().entries();
        assert!(entries.iter().any(|(k, v)| k == "schedule.sitting_minutes" && v == "45"));
        assert!(entries.iter().any(|(k, v)| k == "calendar.events_file" && v == "null"));
    }

    #[test]
    fn load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.schedule.pomodoro_enabled = true;
        changed.save_to(&path).unwrap();
        assert!(Config::load_from(&path).unwrap().schedule.pomodoro_enabled);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "schedule = 3").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
