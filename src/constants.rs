//! Centralized constants for the Ruanm screensaver
//!
//! This module contains the fixed intervals, delays, retry counts and
//! well-known names used throughout the application. Each constant includes
//! documentation on its purpose and unit.

// ============================================================================
// APPLICATION IDENTITY
// ============================================================================

/// Version baked into this build, compared against the update manifest.
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory name used under the per-user config directory.
pub const APP_DIR_NAME: &str = "RuanmScreensaver";

/// Settings file name inside `APP_DIR_NAME`.
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Log directory name inside `APP_DIR_NAME`.
pub const LOG_DIR_NAME: &str = "logs";

/// Host executable relaunched by the updater after replacing files.
#[cfg(target_os = "windows")]
pub const APP_EXECUTABLE_NAME: &str = "RuanmScreensaver.exe";
#[cfg(not(target_os = "windows"))]
pub const APP_EXECUTABLE_NAME: &str = "RuanmScreensaver";

/// Updater executable expected next to the host executable.
#[cfg(target_os = "windows")]
pub const UPDATER_EXECUTABLE_NAME: &str = "ruanm-updater.exe";
#[cfg(not(target_os = "windows"))]
pub const UPDATER_EXECUTABLE_NAME: &str = "ruanm-updater";

/// File extension of exported settings bundles.
pub const SETTINGS_EXPORT_EXTENSION: &str = "rwapr";

/// File name stem for settings exported from the tray.
pub const SETTINGS_EXPORT_STEM: &str = "screen-settings";

/// Format version written into exported settings bundles.
pub const SETTINGS_EXPORT_VERSION: &str = "1.0";

// ============================================================================
// IDLE DETECTION
// ============================================================================

/// Idle-time polling interval.
/// Unit: seconds
/// Range: Fixed, not user configurable
pub const IDLE_POLL_INTERVAL_SECS: u64 = 1;

// ============================================================================
// LOCK SURFACE
// ============================================================================

/// Delay before re-acquiring focus after the lock surface loses it.
/// Unit: milliseconds
pub const FOCUS_REASSERT_DELAY_MS: u64 = 100;

/// Delay before re-entering fullscreen after the lock surface leaves it.
/// Unit: milliseconds
pub const FULLSCREEN_REASSERT_DELAY_MS: u64 = 50;

/// Passphrase buffer reset timeout - clears typed characters after inactivity.
/// Unit: seconds
/// Recommended range: 2-10
pub const UNLOCK_BUFFER_RESET_SECONDS: u64 = 3;

/// Title given to the lock surface window.
pub const LOCK_SURFACE_TITLE: &str = "Ruanm Screensaver";

/// How long `activate` waits for the event loop to create the lock window.
/// Unit: seconds
pub const SURFACE_OPEN_TIMEOUT_SECS: u64 = 5;

/// Edge length of the generated tray icon.
/// Unit: pixels
pub const TRAY_ICON_SIZE: u32 = 32;

// ============================================================================
// WALLPAPERS
// ============================================================================

/// Wallpaper provider endpoint (category and `type=json` are appended).
pub const WALLPAPER_API_URL: &str = "https://api.mmp.cc/api/pcwallpaper";

/// Keyword that selects a random category on each request.
pub const RANDOM_KEYWORD: &str = "random";

/// Categories sampled when the keyword is `RANDOM_KEYWORD`.
pub const WALLPAPER_CATEGORIES: [&str; 9] = [
    "4k",
    "landscape",
    "belle",
    "game",
    "photo",
    "cool",
    "star",
    "car",
    "cartoon",
];

/// Attempts per rotation tick before the tick is skipped.
pub const WALLPAPER_MAX_ATTEMPTS: u32 = 3;

/// Linear backoff step between provider attempts (attempt n waits n * step).
/// Unit: seconds
pub const WALLPAPER_RETRY_STEP_SECS: u64 = 1;

/// Per-request timeout for the wallpaper provider.
/// Unit: seconds
pub const WALLPAPER_REQUEST_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// SETTINGS
// ============================================================================

/// Window during which settings patches are coalesced into one apply.
/// Unit: milliseconds
pub const SETTINGS_DEBOUNCE_MS: u64 = 500;

/// Settings file permissions (user read/write only, the file holds a password).
/// Unit: Unix permission bits (octal)
pub const SETTINGS_FILE_PERMISSIONS: u32 = 0o600;

// ============================================================================
// UPDATES
// ============================================================================

/// Default update manifest location.
pub const UPDATE_MANIFEST_URL: &str =
    "https://ruanmingze.github.io/Ruanm-Product-Update/RuanmScreensaver-Update.json";

/// Manifest request timeout.
/// Unit: seconds
pub const MANIFEST_TIMEOUT_SECS: u64 = 10;

/// Download request (connect) timeout; the transfer itself is uncapped.
/// Unit: seconds
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Temp sub-directory receiving downloaded archives.
pub const UPDATE_TEMP_DIR_NAME: &str = "RuanmScreensaver_Update";

/// File name of the downloaded archive.
pub const UPDATE_ARCHIVE_NAME: &str = "RuanmScreensaver.zip";

/// Extraction directory created next to the install directory.
pub const UPDATE_EXTRACT_DIR_NAME: &str = "TempUpdate";

/// Time the updater waits for the host application to exit before replacing files.
/// Unit: milliseconds
pub const UPDATER_SETTLE_DELAY_MS: u64 = 2000;

/// Copy buffer used while streaming downloads.
/// Unit: bytes
pub const DOWNLOAD_CHUNK_BYTES: usize = 8192;

// ============================================================================
// NOTIFICATION TIMEOUTS
// ============================================================================

/// Standard notification display duration.
/// Unit: milliseconds
pub const NOTIFICATION_TIMEOUT_MS: u32 = 3000;

/// Error notification display duration (longer for important messages).
/// Unit: milliseconds
pub const NOTIFICATION_ERROR_TIMEOUT_MS: u32 = 5000;
