//! Environment overrides and well-known locations
//!
//! The persistent configuration lives in `settings.json` (see the
//! settings_store module). These environment variables optionally redirect
//! where things are found:
//! - RUANM_SCREENSAVER_CONFIG_DIR: directory holding settings.json and logs/
//! - RUANM_SCREENSAVER_MANIFEST_URL: update manifest location (http/https)
//! - RUANM_SCREENSAVER_UPDATER: explicit path of the updater executable

use crate::constants::{APP_DIR_NAME, UPDATER_EXECUTABLE_NAME, UPDATE_MANIFEST_URL};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::env;
use std::path::PathBuf;

pub const CONFIG_DIR_ENV: &str = "RUANM_SCREENSAVER_CONFIG_DIR";
pub const MANIFEST_URL_ENV: &str = "RUANM_SCREENSAVER_MANIFEST_URL";
pub const UPDATER_ENV: &str = "RUANM_SCREENSAVER_UPDATER";

/// Parse the RUANM_SCREENSAVER_CONFIG_DIR environment variable
///
/// Returns None if unset or empty
pub fn parse_config_dir_override() -> Option<PathBuf> {
    match env::var(CONFIG_DIR_ENV) {
        Ok(val) if !val.trim().is_empty() => {
            info!("Using config directory from {}: {}", CONFIG_DIR_ENV, val);
            Some(PathBuf::from(val.trim()))
        }
        Ok(_) => {
            warn!("{} is set but empty. Using default location.", CONFIG_DIR_ENV);
            None
        }
        Err(_) => None,
    }
}

/// Parse the RUANM_SCREENSAVER_MANIFEST_URL environment variable
///
/// Returns Some(url) only for http/https URLs
pub fn parse_manifest_url_override() -> Option<String> {
    match env::var(MANIFEST_URL_ENV) {
        Ok(val) => {
            let val = val.trim();
            if val.starts_with("https://") || val.starts_with("http://") {
                info!("Update manifest URL overridden: {}", val);
                Some(val.to_string())
            } else {
                warn!(
                    "Invalid {}: '{}' (must be an http or https URL). Using default.",
                    MANIFEST_URL_ENV, val
                );
                None
            }
        }
        Err(_) => {
            debug!("{} not set.", MANIFEST_URL_ENV);
            None
        }
    }
}

/// Parse the RUANM_SCREENSAVER_UPDATER environment variable
pub fn parse_updater_override() -> Option<PathBuf> {
    match env::var(UPDATER_ENV) {
        Ok(val) if !val.trim().is_empty() => Some(PathBuf::from(val.trim())),
        _ => None,
    }
}

/// Directory holding settings.json and the logs directory
pub fn app_dir() -> Result<PathBuf> {
    if let Some(dir) = parse_config_dir_override() {
        return Ok(dir);
    }
    let base = dirs::config_dir().context("Failed to determine config directory")?;
    Ok(base.join(APP_DIR_NAME))
}

pub fn manifest_url() -> String {
    parse_manifest_url_override().unwrap_or_else(|| UPDATE_MANIFEST_URL.to_string())
}

/// Where tray exports are written: Documents, else the home directory
pub fn export_dir() -> Result<PathBuf> {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .context("Failed to determine a directory for exported settings")
}

/// Directory containing the running executable; the updater replaces its contents
pub fn install_dir() -> Result<PathBuf> {
    let exe = env::current_exe().context("Failed to locate the running executable")?;
    exe.parent()
        .map(PathBuf::from)
        .context("Running executable has no parent directory")
}

/// Updater executable: the override, else the sibling of the running executable
pub fn updater_path() -> Result<PathBuf> {
    if let Some(path) = parse_updater_override() {
        return Ok(path);
    }
    Ok(install_dir()?.join(UPDATER_EXECUTABLE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_url_override_valid() {
        env::set_var(MANIFEST_URL_ENV, "https://example.com/update.json");
        assert_eq!(
            parse_manifest_url_override(),
            Some("https://example.com/update.json".to_string())
        );

        env::set_var(MANIFEST_URL_ENV, "  http://127.0.0.1:8080/m.json ");
        assert_eq!(
            parse_manifest_url_override(),
            Some("http://127.0.0.1:8080/m.json".to_string()),
            "Should trim surrounding whitespace"
        );

        env::remove_var(MANIFEST_URL_ENV);
    }

    #[test]
    fn test_manifest_url_override_invalid_falls_back() {
        env::set_var(MANIFEST_URL_ENV, "ftp://example.com/update.json");
        assert_eq!(parse_manifest_url_override(), None, "Should reject non-http schemes");
        assert_eq!(manifest_url(), UPDATE_MANIFEST_URL);

        env::set_var(MANIFEST_URL_ENV, "");
        assert_eq!(parse_manifest_url_override(), None, "Should reject empty string");

        env::remove_var(MANIFEST_URL_ENV);
        assert_eq!(manifest_url(), UPDATE_MANIFEST_URL);
    }

    #[test]
    fn test_config_dir_override() {
        env::set_var(CONFIG_DIR_ENV, "/tmp/ruanm-config-test");
        assert_eq!(app_dir().unwrap(), PathBuf::from("/tmp/ruanm-config-test"));

        env::set_var(CONFIG_DIR_ENV, "   ");
        assert_eq!(parse_config_dir_override(), None, "Blank value is ignored");

        env::remove_var(CONFIG_DIR_ENV);
        assert_eq!(parse_config_dir_override(), None);
    }

    #[test]
    fn test_updater_override() {
        env::set_var(UPDATER_ENV, "/opt/ruanm/ruanm-updater");
        assert_eq!(
            updater_path().unwrap(),
            PathBuf::from("/opt/ruanm/ruanm-updater")
        );
        env::remove_var(UPDATER_ENV);

        let default = updater_path().unwrap();
        assert!(default.ends_with(UPDATER_EXECUTABLE_NAME));
    }
}
