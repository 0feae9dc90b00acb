//! Spawning the external updater
//!
//! Protocol: `<updater> <archive> <install_dir>`. The host does not wait;
//! a watcher thread logs how the updater exited.

use crate::error::{Result, ScreensaverError};
use log::{info, warn};
use std::path::Path;
use std::process::{Command, ExitStatus};
use std::thread::{self, JoinHandle};

pub struct HandoffHandle {
    pid: u32,
    watcher: Option<JoinHandle<Option<ExitStatus>>>,
}

impl HandoffHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Block until the updater exits (the host normally never calls this)
    pub fn wait(mut self) -> Option<ExitStatus> {
        self.watcher.take().and_then(|watcher| watcher.join().ok().flatten())
    }
}

pub fn spawn_updater(updater: &Path, archive: &Path, install_dir: &Path) -> Result<HandoffHandle> {
    info!(
        "Handing off to updater {} (archive {}, install dir {})",
        updater.display(),
        archive.display(),
        install_dir.display()
    );

    let mut child = Command::new(updater)
        .arg(archive)
        .arg(install_dir)
        .spawn()
        .map_err(|source| ScreensaverError::Spawn {
            path: updater.to_path_buf(),
            source,
        })?;
    let pid = child.id();

    let watcher = thread::Builder::new()
        .name("updater-watch".to_string())
        .spawn(move || match child.wait() {
            Ok(status) if status.success() => {
                info!("Updater exited successfully");
                Some(status)
            }
            Ok(status) => {
                warn!("Updater exited with {}", status);
                Some(status)
            }
            Err(e) => {
                warn!("Failed to wait for updater: {}", e);
                None
            }
        })?;

    Ok(HandoffHandle {
        pid,
        watcher: Some(watcher),
    })
}
