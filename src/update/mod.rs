//! Update orchestration
//!
//! Check the remote manifest, download the archive with progress, then hand
//! it to the external updater process. The updater side (extract, replace,
//! relaunch) lives in `installer`.

pub mod download;
pub mod handoff;
pub mod installer;

use crate::constants::{
    CURRENT_VERSION, DOWNLOAD_TIMEOUT_SECS, MANIFEST_TIMEOUT_SECS, UPDATE_ARCHIVE_NAME,
    UPDATE_TEMP_DIR_NAME,
};
use crate::error::{Result, ScreensaverError};
use log::{info, warn};
use parking_lot::Mutex;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use download::{DownloadProgress, ProgressSink};
pub use handoff::HandoffHandle;

/// Remote descriptor of the latest release
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateManifest {
    pub version: String,
    #[serde(default)]
    pub update_content: Vec<String>,
    #[serde(default)]
    pub download: DownloadLinks,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DownloadLinks {
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub installer: String,
}

/// Result of a manifest check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheck {
    pub current_version: String,
    pub latest_version: String,
    pub update_available: bool,
    pub update_content: Vec<String>,
    pub download_url: Option<String>,
}

/// Idle -> Checking -> (UpdateAvailable | Idle) -> Downloading -> HandedOff
///
/// Checking and Downloading are exclusive; HandedOff is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    Checking,
    UpdateAvailable,
    Downloading,
    HandedOff,
}

/// Numeric components of a version string: "v1.0.10-beta" -> [1, 0, 10]
pub fn parse_version(version: &str) -> Vec<u64> {
    version
        .trim()
        .trim_start_matches(['v', 'V'])
        .split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

/// Component-wise numeric comparison; missing components count as 0
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (a, b) = (parse_version(a), parse_version(b));
    let len = a.len().max(b.len());
    for i in 0..len {
        let left = a.get(i).copied().unwrap_or(0);
        let right = b.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

pub fn is_newer(latest: &str, current: &str) -> bool {
    compare_versions(latest, current) == Ordering::Greater
}

pub struct UpdateOrchestrator {
    manifest_client: Client,
    download_client: Client,
    manifest_url: String,
    current_version: String,
    updater_path: PathBuf,
    download_dir: PathBuf,
    phase: Mutex<UpdatePhase>,
}

impl UpdateOrchestrator {
    pub fn new(manifest_url: impl Into<String>, updater_path: impl Into<PathBuf>) -> Result<Self> {
        let manifest_client = Client::builder()
            .timeout(Duration::from_secs(MANIFEST_TIMEOUT_SECS))
            .build()?;
        // Large archives on slow links: bound the connect, not the transfer
        let download_client = Client::builder()
            .connect_timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .timeout(None::<Duration>)
            .build()?;

        Ok(Self {
            manifest_client,
            download_client,
            manifest_url: manifest_url.into(),
            current_version: CURRENT_VERSION.to_string(),
            updater_path: updater_path.into(),
            download_dir: std::env::temp_dir().join(UPDATE_TEMP_DIR_NAME),
            phase: Mutex::new(UpdatePhase::Idle),
        })
    }

    /// Compare against a version other than the built-in one
    pub fn with_current_version(mut self, version: impl Into<String>) -> Self {
        self.current_version = version.into();
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn phase(&self) -> UpdatePhase {
        *self.phase.lock()
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// Where `download` writes the archive
    pub fn archive_path(&self) -> PathBuf {
        self.download_dir.join(UPDATE_ARCHIVE_NAME)
    }

    pub fn fetch_manifest(&self) -> Result<UpdateManifest> {
        let response = self
            .manifest_client
            .get(&self.manifest_url)
            .send()?
            .error_for_status()?;
        let body = response.text()?;
        serde_json::from_str(&body)
            .map_err(|e| ScreensaverError::Configuration(format!("malformed update manifest: {}", e)))
    }

    pub fn check_for_updates(&self) -> Result<UpdateCheck> {
        self.begin(UpdatePhase::Checking)?;
        info!("Checking for updates at {}", self.manifest_url);

        let manifest = match self.fetch_manifest() {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("Update check failed: {}", e);
                self.set_phase(UpdatePhase::Idle);
                return Err(e);
            }
        };

        let update_available = is_newer(&manifest.version, &self.current_version);
        info!(
            "Update check complete: current {}, latest {}, update available: {}",
            self.current_version, manifest.version, update_available
        );
        self.set_phase(if update_available {
            UpdatePhase::UpdateAvailable
        } else {
            UpdatePhase::Idle
        });

        let zip = manifest.download.zip.trim();
        Ok(UpdateCheck {
            current_version: self.current_version.clone(),
            latest_version: manifest.version,
            update_available,
            update_content: manifest.update_content,
            download_url: (!zip.is_empty()).then(|| zip.to_string()),
        })
    }

    /// Stream the archive at `url` to `archive_path()`
    pub fn download(&self, url: &str, sink: &dyn ProgressSink) -> Result<PathBuf> {
        if url.trim().is_empty() {
            return Err(ScreensaverError::Configuration(
                "update manifest has no download link".to_string(),
            ));
        }

        self.begin(UpdatePhase::Downloading)?;
        let archive = self.archive_path();
        match download::download_to(&self.download_client, url, &archive, sink) {
            Ok(bytes) => {
                info!("Update downloaded: {} ({} bytes)", archive.display(), bytes);
                Ok(archive)
            }
            Err(e) => {
                warn!("Update download failed: {}", e);
                self.set_phase(UpdatePhase::Idle);
                Err(e)
            }
        }
    }

    /// Spawn the updater on `archive` and return without waiting for it
    ///
    /// At most one updater is ever started per orchestrator.
    pub fn hand_off(&self, archive: &Path, install_dir: &Path) -> Result<HandoffHandle> {
        let mut phase = self.phase.lock();
        if matches!(*phase, UpdatePhase::Checking | UpdatePhase::HandedOff) {
            return Err(ScreensaverError::UpdateInProgress(*phase));
        }
        // Spawned under the lock so a concurrent hand-off sees HandedOff
        match handoff::spawn_updater(&self.updater_path, archive, install_dir) {
            Ok(handle) => {
                *phase = UpdatePhase::HandedOff;
                Ok(handle)
            }
            Err(e) => {
                *phase = UpdatePhase::Idle;
                Err(e)
            }
        }
    }

    pub fn download_and_hand_off(
        &self,
        url: &str,
        install_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<HandoffHandle> {
        let archive = self.download(url, sink)?;
        self.hand_off(&archive, install_dir)
    }

    /// Enter a busy phase unless another check, download or hand-off owns it
    fn begin(&self, next: UpdatePhase) -> Result<()> {
        let mut phase = self.phase.lock();
        match *phase {
            UpdatePhase::Idle | UpdatePhase::UpdateAvailable => {
                *phase = next;
                Ok(())
            }
            busy => {
                warn!("Refusing {:?}: update already {:?}", next, busy);
                Err(ScreensaverError::UpdateInProgress(busy))
            }
        }
    }

    fn set_phase(&self, phase: UpdatePhase) {
        *self.phase.lock() = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_comparison_is_numeric() {
        assert!(is_newer("1.0.2", "1.0.1"));
        assert!(!is_newer("1.0.2", "1.0.2"));
        assert!(is_newer("1.0.10", "1.0.2"));
        assert!(!is_newer("1.0.9", "1.0.10"));
        assert!(is_newer("2.0", "1.9.9"));
    }

    #[test]
    fn test_version_padding_and_prefix() {
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("v1.2.0", "1.2"), Ordering::Equal);
        assert_eq!(parse_version("1.3.0-beta"), vec![1, 3, 0]);
    }

    #[test]
    fn test_manifest_parses_optional_fields() {
        let manifest: UpdateManifest = serde_json::from_str(r#"{ "version": "1.0.3" }"#).unwrap();
        assert_eq!(manifest.version, "1.0.3");
        assert!(manifest.update_content.is_empty());
        assert_eq!(manifest.download, DownloadLinks::default());

        let manifest: UpdateManifest = serde_json::from_str(
            r#"{ "version": "1.0.3", "updateContent": ["Fix"], "download": { "zip": "https://x/y.zip" } }"#,
        )
        .unwrap();
        assert_eq!(manifest.update_content, vec!["Fix"]);
        assert_eq!(manifest.download.zip, "https://x/y.zip");
    }
}
