//! Updater apply mode: extract, replace, relaunch
//!
//! The archive root mirrors the install directory. Colliding files are
//! overwritten, directories merged, and files only present in the install
//! directory are left alone.

use crate::constants::{APP_EXECUTABLE_NAME, UPDATER_SETTLE_DELAY_MS, UPDATE_EXTRACT_DIR_NAME};
use crate::error::{Result, ScreensaverError};
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    Preparing,
    /// Give the host application time to exit
    WaitingForHost,
    Extracting,
    Replacing,
    CleaningUp,
    Done,
    Relaunching,
}

impl InstallStage {
    pub fn percent(self) -> u8 {
        match self {
            InstallStage::Preparing => 30,
            InstallStage::WaitingForHost => 40,
            InstallStage::Extracting => 50,
            InstallStage::Replacing => 70,
            InstallStage::CleaningUp => 90,
            InstallStage::Done | InstallStage::Relaunching => 100,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            InstallStage::Preparing => "Preparing update",
            InstallStage::WaitingForHost => "Closing Ruanm Screensaver",
            InstallStage::Extracting => "Extracting update files",
            InstallStage::Replacing => "Replacing application files",
            InstallStage::CleaningUp => "Cleaning up temporary files",
            InstallStage::Done => "Update complete",
            InstallStage::Relaunching => "Restarting Ruanm Screensaver",
        }
    }
}

pub type Launcher = Box<dyn Fn(&Path) -> io::Result<()> + Send + Sync>;

fn spawn_detached(exe: &Path) -> io::Result<()> {
    let mut command = Command::new(exe);
    if let Some(dir) = exe.parent() {
        command.current_dir(dir);
    }
    command.spawn().map(|_| ())
}

pub struct Installer {
    archive: PathBuf,
    install_dir: PathBuf,
    app_executable: String,
    settle_delay: Duration,
    launcher: Launcher,
}

impl Installer {
    pub fn new(archive: impl Into<PathBuf>, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            install_dir: install_dir.into(),
            app_executable: APP_EXECUTABLE_NAME.to_string(),
            settle_delay: Duration::from_millis(UPDATER_SETTLE_DELAY_MS),
            launcher: Box::new(spawn_detached),
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_launcher(mut self, launcher: Launcher) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_app_executable(mut self, name: impl Into<String>) -> Self {
        self.app_executable = name.into();
        self
    }

    /// Scratch directory next to the install directory
    pub fn extract_dir(&self) -> PathBuf {
        match self.install_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(UPDATE_EXTRACT_DIR_NAME),
            _ => std::env::temp_dir().join(UPDATE_EXTRACT_DIR_NAME),
        }
    }

    /// Apply the archive and relaunch the application
    ///
    /// Returns the relaunched executable. If the executable is missing after
    /// the copy, nothing is launched and an error is returned.
    pub fn run(&self, progress: &mut dyn FnMut(InstallStage)) -> Result<PathBuf> {
        progress(InstallStage::Preparing);
        if !self.archive.is_file() {
            return Err(ScreensaverError::Configuration(format!(
                "update archive not found: {}",
                self.archive.display()
            )));
        }
        fs::create_dir_all(&self.install_dir)?;

        progress(InstallStage::WaitingForHost);
        thread::sleep(self.settle_delay);

        progress(InstallStage::Extracting);
        let extract_dir = self.extract_dir();
        if extract_dir.exists() {
            fs::remove_dir_all(&extract_dir)?;
        }
        extract_archive(&self.archive, &extract_dir)?;

        progress(InstallStage::Replacing);
        let copied = copy_dir_merge(&extract_dir, &self.install_dir)?;
        info!("Replaced {} files in {}", copied, self.install_dir.display());

        progress(InstallStage::CleaningUp);
        if let Err(e) = fs::remove_file(&self.archive) {
            warn!("Failed to delete {}: {}", self.archive.display(), e);
        }
        if let Err(e) = fs::remove_dir_all(&extract_dir) {
            warn!("Failed to delete {}: {}", extract_dir.display(), e);
        }
        progress(InstallStage::Done);

        let exe = self.install_dir.join(&self.app_executable);
        if !exe.is_file() {
            return Err(ScreensaverError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("application executable not found after update: {}", exe.display()),
            )));
        }

        progress(InstallStage::Relaunching);
        (self.launcher)(&exe).map_err(|source| ScreensaverError::Spawn {
            path: exe.clone(),
            source,
        })?;
        info!("Relaunched {}", exe.display());
        Ok(exe)
    }
}

fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| ScreensaverError::Configuration(format!("invalid update archive: {}", e)))?;
    debug!("Extracting {} entries to {}", zip.len(), dest.display());
    zip.extract(dest)
        .map_err(|e| ScreensaverError::Configuration(format!("failed to extract update: {}", e)))
}

/// Recursively copy `src` into `dest`, overwriting files; returns the file count
pub fn copy_dir_merge(src: &Path, dest: &Path) -> io::Result<usize> {
    fs::create_dir_all(dest)?;
    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copied += copy_dir_merge(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_percentages_increase() {
        let stages = [
            InstallStage::Preparing,
            InstallStage::WaitingForHost,
            InstallStage::Extracting,
            InstallStage::Replacing,
            InstallStage::CleaningUp,
            InstallStage::Done,
        ];
        let percents: Vec<u8> = stages.iter().map(|s| s.percent()).collect();
        assert_eq!(percents, vec![30, 40, 50, 70, 90, 100]);
    }

    #[test]
    fn test_extract_dir_is_sibling_of_install_dir() {
        let installer = Installer::new("/tmp/u.zip", "/opt/ruanm/app");
        assert_eq!(installer.extract_dir(), PathBuf::from("/opt/ruanm/TempUpdate"));
    }

    #[test]
    fn test_missing_archive_rejected_before_touching_install_dir() {
        let installer = Installer::new("/nonexistent/u.zip", "/nonexistent/app")
            .with_settle_delay(Duration::ZERO);
        let mut stages = Vec::new();
        let result = installer.run(&mut |stage| stages.push(stage));
        assert!(matches!(result, Err(ScreensaverError::Configuration(_))));
        assert_eq!(stages, vec![InstallStage::Preparing]);
    }
}
