//! Error taxonomy for the screensaver core
//!
//! Binaries wrap these in `anyhow`; the core returns them so callers can tell
//! a transient network fault from a failed settings write.

use crate::update::UpdatePhase;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScreensaverError {
    /// Wallpaper, manifest or download request failed (retry-able)
    #[error("network request failed: {0}")]
    Network(String),

    /// Settings could not be written; nothing was committed
    #[error("failed to persist settings to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed settings export, manifest or update archive
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The lock surface could not be created
    #[error("lock surface unavailable: {0}")]
    Surface(String),

    /// The external updater could not be started
    #[error("failed to start updater {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A check, download or hand-off is already under way
    #[error("an update is already in progress ({0:?})")]
    UpdateInProgress(UpdatePhase),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ScreensaverError {
    fn from(err: reqwest::Error) -> Self {
        ScreensaverError::Network(err.to_string())
    }
}

pub type Result<T, E = ScreensaverError> = std::result::Result<T, E>;
