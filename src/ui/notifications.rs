//! Desktop notifications

use crate::constants::{NOTIFICATION_ERROR_TIMEOUT_MS, NOTIFICATION_TIMEOUT_MS};
use crate::update::UpdateCheck;
use log::warn;
use notify_rust::{Notification, Timeout};

const APP_NAME: &str = "Ruanm Screensaver";

fn show(body: &str, timeout_ms: u32) {
    let result = Notification::new()
        .summary(APP_NAME)
        .body(body)
        .timeout(Timeout::Milliseconds(timeout_ms))
        .show();
    if let Err(e) = result {
        warn!("Failed to show notification: {}", e);
    }
}

/// Body text for an update check result
pub fn update_check_message(check: &UpdateCheck) -> String {
    if !check.update_available {
        return format!("You are running the latest version ({}).", check.current_version);
    }
    let mut body = format!(
        "Version {} is available (current {}).",
        check.latest_version, check.current_version
    );
    for line in &check.update_content {
        body.push_str("\n• ");
        body.push_str(line);
    }
    body
}

pub fn show_update_check(check: &UpdateCheck) {
    show(&update_check_message(check), NOTIFICATION_TIMEOUT_MS);
}

pub fn show_update_error(error: &dyn std::fmt::Display) {
    show(&format!("Update failed: {}", error), NOTIFICATION_ERROR_TIMEOUT_MS);
}

pub fn show_installing() {
    show("Downloading and installing the update...", NOTIFICATION_TIMEOUT_MS);
}

pub fn show_version(version: &str) {
    show(&format!("Version {}", version), NOTIFICATION_TIMEOUT_MS);
}

pub fn show_settings_imported(path: &std::path::Path) {
    show(&format!("Settings imported from {}", path.display()), NOTIFICATION_TIMEOUT_MS);
}

pub fn show_settings_exported(path: &std::path::Path) {
    show(&format!("Settings exported to {}", path.display()), NOTIFICATION_TIMEOUT_MS);
}

pub fn show_export_error(error: &dyn std::fmt::Display) {
    show(&format!("Export failed: {}", error), NOTIFICATION_ERROR_TIMEOUT_MS);
}
