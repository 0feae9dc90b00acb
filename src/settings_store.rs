//! Settings file management
//!
//! Loads `settings.json` merged over the built-in defaults and writes it back
//! atomically (temp file in the same directory, then rename).

use crate::error::{Result, ScreensaverError};
use crate::settings::Settings;
use log::{debug, info, Level};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// What `load` noticed, kept for callers that install the logger afterwards
#[derive(Debug, Default)]
pub struct LoadReport {
    notes: Vec<(Level, String)>,
}

impl LoadReport {
    fn note(&mut self, level: Level, message: String) {
        self.notes.push((level, message));
    }

    pub fn notes(&self) -> impl Iterator<Item = (Level, &str)> {
        self.notes.iter().map(|(level, message)| (*level, message.as_str()))
    }

    pub fn has_warnings(&self) -> bool {
        self.notes.iter().any(|(level, _)| *level <= Level::Warn)
    }

    /// Emit the notes through the process logger
    pub fn log(&self) {
        for (level, message) in &self.notes {
            log::log!(*level, "{}", message);
        }
    }
}

/// Reads and writes the persisted settings; holds no settings state itself
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, never failing, and log what was found
    pub fn load(&self) -> Settings {
        let (settings, report) = self.load_with_report();
        report.log();
        settings
    }

    /// Load settings, never failing, returning the diagnostics unlogged
    ///
    /// Present keys override the defaults and absent keys keep them. A key
    /// whose value does not fit is skipped on its own; the file is left as
    /// is. A missing file, or one that is not a JSON object, degrades to the
    /// full defaults, which are written out.
    pub fn load_with_report(&self) -> (Settings, LoadReport) {
        let mut report = LoadReport::default();

        match fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(Value::Object(stored)) => {
                    let (settings, rejected) = Settings::from_stored(stored);
                    for (key, reason) in rejected {
                        report.note(
                            Level::Warn,
                            format!("Ignoring settings key '{}' in {}: {}", key, self.path.display(), reason),
                        );
                    }
                    report.note(Level::Debug, format!("Settings loaded from: {}", self.path.display()));
                    return (settings, report);
                }
                Ok(other) => report.note(
                    Level::Warn,
                    format!(
                        "Settings file {} holds {} instead of an object. Using defaults.",
                        self.path.display(),
                        json_kind(&other)
                    ),
                ),
                Err(e) => report.note(
                    Level::Warn,
                    format!(
                        "Settings file {} could not be parsed ({}). Using defaults.",
                        self.path.display(),
                        e
                    ),
                ),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => report.note(
                Level::Info,
                format!("No settings file at {}. Creating one with defaults.", self.path.display()),
            ),
            Err(e) => report.note(
                Level::Warn,
                format!(
                    "Failed to read settings file {}: {}. Using defaults.",
                    self.path.display(),
                    e
                ),
            ),
        }

        let defaults = Settings::default();
        if let Err(e) = self.save(&defaults) {
            report.note(Level::Warn, format!("Failed to write default settings: {}", e));
        }
        (defaults, report)
    }

    /// Persist settings atomically
    ///
    /// Creates the settings directory if needed and restricts the file to
    /// the current user (it may hold the unlock password).
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if settings.enable_logging {
            debug!("Saving settings to: {}", self.path.display());
        }

        self.write_atomically(settings)
            .map_err(|source| ScreensaverError::Persistence {
                path: self.path.clone(),
                source,
            })?;

        if settings.enable_logging {
            info!("Settings saved to: {}", self.path.display());
        }
        Ok(())
    }

    fn write_atomically(&self, settings: &Settings) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(settings)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        fs::write(&temp_path, contents)?;

        #[cfg(unix)]
        {
            let mut permissions = fs::metadata(&temp_path)?.permissions();
            permissions.set_mode(crate::constants::SETTINGS_FILE_PERMISSIONS);
            fs::set_permissions(&temp_path, permissions)?;
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
