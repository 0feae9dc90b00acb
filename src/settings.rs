//! Typed settings model
//!
//! `Settings` is the single source of truth for every subsystem parameter.
//! It serializes to the camelCase JSON object stored in `settings.json`;
//! missing keys are backfilled from `Settings::default()`.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::constants::RANDOM_KEYWORD;
use crate::error::{Result, ScreensaverError};

/// Unit for `lockTime` and `wallpaperChangeTime`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Second,
    Minute,
}

impl TimeUnit {
    pub fn seconds(self) -> f64 {
        match self {
            TimeUnit::Second => 1.0,
            TimeUnit::Minute => 60.0,
        }
    }

    /// `amount` units as a duration; fractional amounts are kept ("0.5" minutes is 30 s)
    pub fn to_duration(self, amount: f64) -> Duration {
        if amount.is_nan() || amount <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(amount * self.seconds()).unwrap_or(Duration::MAX)
    }
}

/// Presentation fields consumed by the lock surface only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplaySettings {
    pub time_font_size: u32,
    pub date_font_size: u32,
    pub time_position: String,
    pub date_position: String,
    pub time_color: String,
    pub time_font_family: String,
    pub date_font_family: String,
    pub show_advertisement: bool,
    pub theme: String,
    pub weather_city: String,
    pub weather_position: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            time_font_size: 80,
            date_font_size: 30,
            time_position: "bottom-left".to_string(),
            date_position: "bottom-left".to_string(),
            time_color: "#FFFFFF".to_string(),
            time_font_family: "Arial".to_string(),
            date_font_family: "Arial".to_string(),
            show_advertisement: false,
            theme: "light".to_string(),
            weather_city: "Guangzhou".to_string(),
            weather_position: "bottom-right".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub enable_lock_screen: bool,
    #[serde(with = "time_amount")]
    pub lock_time: f64,
    pub lock_time_unit: TimeUnit,
    #[serde(with = "time_amount")]
    pub wallpaper_change_time: f64,
    pub wallpaper_change_time_unit: TimeUnit,
    pub wallpaper_keyword: String,
    #[serde(deserialize_with = "wallpaper_list::deserialize")]
    pub local_wallpapers: Option<Vec<String>>,
    pub enable_password_protection: bool,
    pub password: String,
    pub enable_logging: bool,
    pub debug_mode: bool,
    pub remember_exit_choice: bool,
    pub last_exit_choice: String,
    #[serde(flatten)]
    pub display: DisplaySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_lock_screen: false,
            lock_time: 5.0,
            lock_time_unit: TimeUnit::Minute,
            wallpaper_change_time: 10.0,
            wallpaper_change_time_unit: TimeUnit::Minute,
            wallpaper_keyword: RANDOM_KEYWORD.to_string(),
            local_wallpapers: None,
            enable_password_protection: false,
            password: String::new(),
            enable_logging: true,
            debug_mode: false,
            remember_exit_choice: false,
            last_exit_choice: String::new(),
            display: DisplaySettings::default(),
        }
    }
}

impl Settings {
    /// Idle threshold, or None when the lock screen is disabled or the time is 0
    pub fn idle_threshold(&self) -> Option<Duration> {
        if !self.enable_lock_screen || self.lock_time <= 0.0 {
            return None;
        }
        Some(self.lock_time_unit.to_duration(self.lock_time))
    }

    /// Wallpaper rotation interval, or None when rotation is off
    pub fn wallpaper_interval(&self) -> Option<Duration> {
        if self.wallpaper_change_time <= 0.0 {
            return None;
        }
        Some(
            self.wallpaper_change_time_unit
                .to_duration(self.wallpaper_change_time),
        )
    }

    /// Non-blank local wallpaper paths in configured order
    pub fn local_wallpaper_paths(&self) -> Vec<String> {
        self.local_wallpapers
            .iter()
            .flatten()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// The password the lock surface must verify, if protection is effective
    pub fn unlock_password(&self) -> Option<&str> {
        if self.enable_password_protection && !self.password.is_empty() {
            Some(&self.password)
        } else {
            None
        }
    }

    /// Collapse blank local wallpaper lists to `None` and trim entries
    pub fn normalized(mut self) -> Self {
        let paths = self.local_wallpaper_paths();
        self.local_wallpapers = if paths.is_empty() { None } else { Some(paths) };
        self
    }

    /// Merge a stored settings object over the defaults one key at a time
    ///
    /// A key whose value does not fit is dropped and returned with the reason;
    /// every other key still applies.
    pub fn from_stored(stored: Map<String, Value>) -> (Settings, Vec<(String, String)>) {
        let mut settings = Settings::default();
        let mut rejected = Vec::new();
        for (key, value) in stored {
            let patch = SettingsPatch::new().set(&key, value);
            match settings.merged(&patch) {
                Ok(next) => settings = next,
                Err(e) => rejected.push((key, e.to_string())),
            }
        }
        (settings, rejected)
    }

    /// `{...self, ...patch}`: keys present in the patch override, others are kept
    pub fn merged(&self, patch: &SettingsPatch) -> Result<Settings> {
        let mut base = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(ScreensaverError::Configuration(format!(
                    "settings serialized to a non-object: {}",
                    other
                )))
            }
            Err(e) => return Err(ScreensaverError::Configuration(e.to_string())),
        };
        for (key, value) in &patch.entries {
            base.insert(key.clone(), value.clone());
        }
        serde_json::from_value(Value::Object(base)).map_err(|e| {
            ScreensaverError::Configuration(format!("settings patch rejected: {}", e))
        })
    }
}

/// A partial settings object, keyed by the JSON field names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsPatch {
    entries: Map<String, Value>,
}

impl SettingsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    /// Fold a later patch into this one; later keys win
    pub fn absorb(&mut self, later: SettingsPatch) {
        self.entries.extend(later.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(entries) => Ok(Self { entries }),
            other => Err(ScreensaverError::Configuration(format!(
                "settings patch must be a JSON object, got {}",
                other
            ))),
        }
    }
}

impl From<&Settings> for SettingsPatch {
    fn from(settings: &Settings) -> Self {
        match serde_json::to_value(settings) {
            Ok(Value::Object(entries)) => Self { entries },
            _ => Self::default(),
        }
    }
}

/// Process-wide settings handle; readers take snapshots, only the applier commits
#[derive(Clone)]
pub struct SharedSettings {
    inner: Arc<RwLock<Settings>>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn snapshot(&self) -> Settings {
        self.inner.read().clone()
    }

    /// Replace the committed settings, returning the previous value
    pub(crate) fn commit(&self, settings: Settings) -> Settings {
        std::mem::replace(&mut *self.inner.write(), settings)
    }
}

/// Non-negative amounts; whole numbers are written without a fraction
mod time_amount {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    // Largest f64 below which every integer is exact
    const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

    pub fn serialize<S>(amount: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if amount.fract() == 0.0 && *amount >= 0.0 && *amount < EXACT_INTEGER_LIMIT {
            serializer.serialize_u64(*amount as u64)
        } else {
            serializer.serialize_f64(*amount)
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let amount = f64::deserialize(deserializer)?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(D::Error::custom(format!(
                "time amount must be a non-negative number, got {}",
                amount
            )));
        }
        Ok(amount)
    }
}

mod wallpaper_list {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        // Older settings files store "a.jpg;b.jpg"
        Joined(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Raw>::deserialize(deserializer)? {
            None => None,
            Some(Raw::List(paths)) => Some(paths),
            Some(Raw::Joined(joined)) => Some(joined.split(';').map(str::to_string).collect()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_keys_backfilled_from_defaults() {
        let settings: Settings =
            serde_json::from_value(json!({ "lockTime": 12, "theme": "dark" })).unwrap();
        assert_eq!(settings.lock_time, 12.0);
        assert_eq!(settings.display.theme, "dark");
        assert_eq!(settings.lock_time_unit, TimeUnit::Minute);
        assert!(settings.enable_logging);
        assert_eq!(settings.display.time_font_size, 80);
    }

    #[test]
    fn test_legacy_semicolon_wallpaper_list() {
        let settings: Settings =
            serde_json::from_value(json!({ "localWallpapers": "a.jpg;;b.jpg; " })).unwrap();
        assert_eq!(settings.local_wallpaper_paths(), vec!["a.jpg", "b.jpg"]);

        let settings: Settings =
            serde_json::from_value(json!({ "localWallpapers": "" })).unwrap();
        assert!(settings.local_wallpaper_paths().is_empty());
        assert_eq!(settings.normalized().local_wallpapers, None);
    }

    #[test]
    fn test_idle_threshold_units() {
        let mut settings = Settings::default();
        assert_eq!(settings.idle_threshold(), None, "lock screen disabled by default");

        settings.enable_lock_screen = true;
        assert_eq!(settings.idle_threshold(), Some(Duration::from_secs(300)));

        settings.lock_time_unit = TimeUnit::Second;
        settings.lock_time = 45.0;
        assert_eq!(settings.idle_threshold(), Some(Duration::from_secs(45)));

        settings.lock_time = 0.0;
        assert_eq!(settings.idle_threshold(), None);
    }

    #[test]
    fn test_wallpaper_interval() {
        let mut settings = Settings::default();
        assert_eq!(settings.wallpaper_interval(), Some(Duration::from_secs(600)));
        settings.wallpaper_change_time_unit = TimeUnit::Second;
        settings.wallpaper_change_time = 7.0;
        assert_eq!(settings.wallpaper_interval(), Some(Duration::from_millis(7000)));
        settings.wallpaper_change_time = 0.0;
        assert_eq!(settings.wallpaper_interval(), None);
    }

    #[test]
    fn test_merge_overrides_only_present_keys() {
        let current = Settings {
            lock_time: 3.0,
            wallpaper_keyword: "game".to_string(),
            ..Settings::default()
        };
        let patch = SettingsPatch::new()
            .set("lockTime", 9)
            .set("localWallpapers", json!(["x.png"]));
        let merged = current.merged(&patch).unwrap();

        assert_eq!(merged.lock_time, 9.0);
        assert_eq!(merged.wallpaper_keyword, "game");
        assert_eq!(merged.local_wallpapers, Some(vec!["x.png".to_string()]));
    }

    #[test]
    fn test_merge_rejects_wrong_types() {
        let patch = SettingsPatch::new().set("lockTime", "soon");
        let result = Settings::default().merged(&patch);
        assert!(matches!(result, Err(ScreensaverError::Configuration(_))));
    }

    #[test]
    fn test_fractional_and_negative_amounts() {
        let settings: Settings = serde_json::from_value(
            json!({ "enableLockScreen": true, "lockTime": 0.5, "lockTimeUnit": "minute" }),
        )
        .unwrap();
        assert_eq!(settings.idle_threshold(), Some(Duration::from_secs(30)));

        let written = serde_json::to_value(&settings).unwrap();
        assert_eq!(written["lockTime"], 0.5);
        assert_eq!(written["wallpaperChangeTime"], 10);

        let patch = SettingsPatch::new().set("lockTime", -1);
        assert!(matches!(
            Settings::default().merged(&patch),
            Err(ScreensaverError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_stored_drops_only_bad_keys() {
        let stored = json!({
            "enableLockScreen": true,
            "lockTime": "soon",
            "lockTimeUnit": "fortnight",
            "wallpaperKeyword": "car",
            "enablePasswordProtection": true,
            "password": "hunter2",
            "timeColor": "#123456"
        });
        let Value::Object(map) = stored else { unreachable!() };

        let (settings, rejected) = Settings::from_stored(map);

        assert!(settings.enable_lock_screen);
        assert_eq!(settings.wallpaper_keyword, "car");
        assert_eq!(settings.unlock_password(), Some("hunter2"));
        assert_eq!(settings.display.time_color, "#123456");
        assert_eq!(settings.lock_time, 5.0);
        assert_eq!(settings.lock_time_unit, TimeUnit::Minute);

        let mut keys: Vec<&str> = rejected.iter().map(|(key, _)| key.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["lockTime", "lockTimeUnit"]);
    }

    #[test]
    fn test_unlock_password_requires_both_flag_and_value() {
        let mut settings = Settings::default();
        settings.password = "secret".to_string();
        assert_eq!(settings.unlock_password(), None);
        settings.enable_password_protection = true;
        assert_eq!(settings.unlock_password(), Some("secret"));
        settings.password.clear();
        assert_eq!(settings.unlock_password(), None);
    }

    #[test]
    fn test_patch_absorb_later_wins() {
        let mut first = SettingsPatch::new().set("lockTime", 1).set("theme", "dark");
        first.absorb(SettingsPatch::new().set("lockTime", 2));
        let merged = Settings::default().merged(&first).unwrap();
        assert_eq!(merged.lock_time, 2.0);
        assert_eq!(merged.display.theme, "dark");
    }
}
