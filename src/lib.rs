// Library interface for Ruanm Screensaver
// Shared by the host application, the updater and the integration tests

pub mod config;
pub mod config_applier;
pub mod constants;
pub mod error;
pub mod idle;
pub mod logging;
pub mod screensaver;
pub mod settings;
pub mod settings_export;
pub mod settings_store;
pub mod timer;
pub mod ui;
pub mod update;
pub mod wallpaper;

use config_applier::{ConfigApplier, DebouncedApplier};
use constants::SETTINGS_DEBOUNCE_MS;
use error::Result;
use idle::{IdleMonitor, IdleSource};
use log::info;
use screensaver::surface::SurfaceFactory;
use screensaver::ScreensaverController;
use settings::{Settings, SettingsPatch, SharedSettings};
use settings_store::SettingsStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use wallpaper::WallpaperProvider;

/// Platform pieces the core drives
pub struct CoreBackends {
    pub surfaces: Arc<dyn SurfaceFactory>,
    pub wallpapers: Arc<dyn WallpaperProvider>,
    pub idle_source: Arc<dyn IdleSource>,
}

/// Core screensaver wiring shared by the tray app and tests
pub struct ScreensaverCore {
    settings: SharedSettings,
    idle: Arc<IdleMonitor>,
    controller: Arc<ScreensaverController>,
    applier: Arc<ConfigApplier>,
    debouncer: DebouncedApplier,
}

impl ScreensaverCore {
    /// Build every component around already-loaded settings
    ///
    /// With `log_dir`, changes to `enableLogging`/`debugMode` reconfigure the
    /// process logger.
    pub fn new(
        store: SettingsStore,
        initial: Settings,
        backends: CoreBackends,
        log_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let settings = SharedSettings::new(initial);
        let idle = Arc::new(IdleMonitor::new(backends.idle_source));
        let controller = ScreensaverController::new(
            settings.clone(),
            backends.surfaces,
            backends.wallpapers,
            idle.clone(),
        );

        let mut applier = ConfigApplier::new(store, settings.clone(), controller.clone());
        if let Some(dir) = log_dir {
            applier = applier.with_logging_hook(Arc::new(move |s: &Settings| {
                logging::reconfigure(s, &dir);
            }));
        }
        let applier = Arc::new(applier);
        let debouncer =
            DebouncedApplier::new(applier.clone(), Duration::from_millis(SETTINGS_DEBOUNCE_MS))?;

        Ok(Self {
            settings,
            idle,
            controller,
            applier,
            debouncer,
        })
    }

    /// Arm idle detection from the loaded settings
    pub fn start(&self) {
        self.controller.rearm_idle();
        info!("Screensaver core started");
    }

    pub fn settings(&self) -> Settings {
        self.settings.snapshot()
    }

    pub fn controller(&self) -> &Arc<ScreensaverController> {
        &self.controller
    }

    pub fn applier(&self) -> &Arc<ConfigApplier> {
        &self.applier
    }

    /// Show the lock screen immediately
    pub fn lock_now(&self) -> Result<()> {
        info!("Lock requested");
        self.controller.activate()
    }

    /// Apply settings right away
    pub fn apply_settings(&self, patch: &SettingsPatch) -> Result<Settings> {
        self.applier.apply(patch)
    }

    /// Queue settings behind the 500 ms debounce
    pub fn submit_settings(&self, patch: SettingsPatch) {
        self.debouncer.submit(patch);
    }

    pub fn import_settings(&self, path: &Path) -> Result<Settings> {
        settings_export::import_from(path, &self.applier)
    }

    pub fn export_settings(&self, path: &Path) -> Result<()> {
        settings_export::export_to(path, &self.settings.snapshot())
    }

    /// Export into `dir` under a timestamped `.rwapr` name
    pub fn export_settings_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(settings_export::export_file_name(chrono::Local::now()));
        self.export_settings(&path)?;
        Ok(path)
    }

    /// Stop timers and flush pending settings
    pub fn shutdown(&mut self) {
        self.debouncer.shutdown();
        self.idle.stop();
        info!("Screensaver core stopped");
    }
}
