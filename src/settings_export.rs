//! `.rwapr` settings export files
//!
//! ```json
//! { "version": "1.0", "exportTime": "2025-01-01T00:00:00Z", "settings": { ... } }
//! ```

use crate::config_applier::ConfigApplier;
use crate::constants::{SETTINGS_EXPORT_EXTENSION, SETTINGS_EXPORT_STEM, SETTINGS_EXPORT_VERSION};
use chrono::{DateTime, Local};
use crate::error::{Result, ScreensaverError};
use crate::settings::{Settings, SettingsPatch};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportFile<'a> {
    version: &'a str,
    export_time: String,
    settings: &'a Settings,
}

#[derive(Debug, Deserialize)]
struct ImportFile {
    version: Option<Value>,
    settings: Option<Value>,
}

/// True for paths ending in `.rwapr` (case-insensitive)
pub fn is_export_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SETTINGS_EXPORT_EXTENSION))
}

/// `screen-settings-20250101-093000.rwapr`: stamped so exports never collide
pub fn export_file_name(at: DateTime<Local>) -> String {
    format!(
        "{}-{}.{}",
        SETTINGS_EXPORT_STEM,
        at.format("%Y%m%d-%H%M%S"),
        SETTINGS_EXPORT_EXTENSION
    )
}

pub fn export_to(path: &Path, settings: &Settings) -> Result<()> {
    let file = ExportFile {
        version: SETTINGS_EXPORT_VERSION,
        export_time: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        settings,
    };
    let contents = serde_json::to_string_pretty(&file)
        .map_err(|e| ScreensaverError::Configuration(e.to_string()))?;
    fs::write(path, contents)?;
    info!("Settings exported to {}", path.display());
    Ok(())
}

/// Read an export file into a patch without applying it
///
/// Both `version` and `settings` must be present; `settings` must be an object.
pub fn read_export(path: &Path) -> Result<SettingsPatch> {
    let contents = fs::read_to_string(path)?;
    let file: ImportFile = serde_json::from_str(&contents).map_err(|e| {
        ScreensaverError::Configuration(format!("{} is not a settings export: {}", path.display(), e))
    })?;

    match (file.version, file.settings) {
        (Some(version), Some(settings)) if !version.is_null() && !settings.is_null() => {
            SettingsPatch::from_value(settings)
        }
        _ => Err(ScreensaverError::Configuration(format!(
            "{} is missing version or settings",
            path.display()
        ))),
    }
}

/// Import an export file through the applier
pub fn import_from(path: &Path, applier: &ConfigApplier) -> Result<Settings> {
    let patch = read_export(path)?;
    let applied = applier.apply(&patch)?;
    info!("Settings imported from {}", path.display());
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("ruanm_screensaver_tests")
            .join(format!("export_{:?}", std::thread::current().id()));
        let _ = fs::create_dir_all(&dir);
        dir.join(name)
    }

    #[test]
    fn test_extension_check() {
        assert!(is_export_file(Path::new("/tmp/screen-settings.rwapr")));
        assert!(is_export_file(Path::new("A.RWAPR")));
        assert!(!is_export_file(Path::new("settings.json")));
    }

    #[test]
    fn test_export_file_name_is_stamped() {
        use chrono::TimeZone;
        let at = Local.with_ymd_and_hms(2025, 3, 9, 7, 5, 1).unwrap();
        let name = export_file_name(at);
        assert_eq!(name, "screen-settings-20250309-070501.rwapr");
        assert!(is_export_file(Path::new(&name)));
    }

    #[test]
    fn test_export_then_read_keeps_settings() {
        let path = temp_file("roundtrip.rwapr");
        let settings = Settings {
            lock_time: 42.0,
            wallpaper_keyword: "car".to_string(),
            ..Settings::default()
        };
        export_to(&path, &settings).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], "1.0");
        assert!(raw["exportTime"].is_string());

        let patch = read_export(&path).unwrap();
        assert_eq!(Settings::default().merged(&patch).unwrap(), settings);
    }

    #[test]
    fn test_read_rejects_missing_fields() {
        let path = temp_file("incomplete.rwapr");
        fs::write(&path, r#"{ "settings": { "lockTime": 1 } }"#).unwrap();
        assert!(matches!(read_export(&path), Err(ScreensaverError::Configuration(_))));

        fs::write(&path, r#"{ "version": "1.0", "settings": 7 }"#).unwrap();
        assert!(matches!(read_export(&path), Err(ScreensaverError::Configuration(_))));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(read_export(&path), Err(ScreensaverError::Configuration(_))));
    }
}
