//! Settings application
//!
//! `ConfigApplier::apply` is the only path that changes the committed
//! settings. It persists first, commits second, and only then restarts the
//! subsystems whose inputs changed. `DebouncedApplier` sits in front of it
//! and folds bursts of edits into one apply.

use crate::error::Result;
use crate::screensaver::ScreensaverController;
use crate::settings::{Settings, SettingsPatch, SharedSettings};
use crate::settings_store::SettingsStore;
use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub type LoggingHook = Arc<dyn Fn(&Settings) + Send + Sync>;

/// Which subsystems a settings change touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettingsChanges {
    pub logging: bool,
    pub idle: bool,
}

impl SettingsChanges {
    pub fn between(previous: &Settings, next: &Settings) -> Self {
        Self {
            logging: previous.enable_logging != next.enable_logging
                || previous.debug_mode != next.debug_mode,
            idle: previous.lock_time != next.lock_time
                || previous.lock_time_unit != next.lock_time_unit
                || previous.enable_lock_screen != next.enable_lock_screen,
        }
    }
}

pub struct ConfigApplier {
    store: SettingsStore,
    settings: SharedSettings,
    controller: Arc<ScreensaverController>,
    logging_hook: Option<LoggingHook>,
    apply_lock: Mutex<()>,
}

impl ConfigApplier {
    pub fn new(
        store: SettingsStore,
        settings: SharedSettings,
        controller: Arc<ScreensaverController>,
    ) -> Self {
        Self {
            store,
            settings,
            controller,
            logging_hook: None,
            apply_lock: Mutex::new(()),
        }
    }

    /// Called with the new settings when `enableLogging` or `debugMode` change
    pub fn with_logging_hook(mut self, hook: LoggingHook) -> Self {
        self.logging_hook = Some(hook);
        self
    }

    pub fn current(&self) -> Settings {
        self.settings.snapshot()
    }

    /// Merge `patch` into the committed settings and propagate it
    ///
    /// On a persistence failure nothing is committed and no subsystem is
    /// touched.
    pub fn apply(&self, patch: &SettingsPatch) -> Result<Settings> {
        let _serialized = self.apply_lock.lock();

        let merged = self.settings.snapshot().merged(patch)?.normalized();
        self.store.save(&merged)?;
        let previous = self.settings.commit(merged.clone());

        let changes = SettingsChanges::between(&previous, &merged);
        debug!(
            "Applied settings keys [{}] ({:?})",
            patch.keys().collect::<Vec<_>>().join(", "),
            changes
        );

        if changes.logging {
            if let Some(hook) = &self.logging_hook {
                hook(&merged);
            }
        }
        if changes.idle {
            info!("Lock timing changed - restarting idle monitor");
            self.controller.rearm_idle();
        }
        self.controller.restart_rotation();
        self.controller.push_settings_update(&merged);

        Ok(merged)
    }
}

struct Pending {
    patch: SettingsPatch,
    deadline: Option<Instant>,
    shutdown: bool,
}

type PendingSlot = Arc<(Mutex<Pending>, Condvar)>;

/// Trailing-edge debounce in front of `ConfigApplier::apply`
///
/// Each `submit` pushes the deadline out by the window; when it passes, all
/// patches received so far are applied as one (later keys win).
pub struct DebouncedApplier {
    pending: PendingSlot,
    window: Duration,
    worker: Option<JoinHandle<()>>,
}

impl DebouncedApplier {
    pub fn new(applier: Arc<ConfigApplier>, window: Duration) -> std::io::Result<Self> {
        let pending: PendingSlot = Arc::new((
            Mutex::new(Pending {
                patch: SettingsPatch::new(),
                deadline: None,
                shutdown: false,
            }),
            Condvar::new(),
        ));

        let slot = pending.clone();
        let worker = thread::Builder::new()
            .name("settings-debounce".to_string())
            .spawn(move || run_debounce(&slot, &applier))?;

        Ok(Self {
            pending,
            window,
            worker: Some(worker),
        })
    }

    pub fn submit(&self, patch: SettingsPatch) {
        let (lock, cvar) = &*self.pending;
        let mut pending = lock.lock();
        pending.patch.absorb(patch);
        pending.deadline = Some(Instant::now() + self.window);
        cvar.notify_one();
    }

    /// Stop the worker, applying anything still pending
    pub fn shutdown(&mut self) {
        {
            let (lock, cvar) = &*self.pending;
            lock.lock().shutdown = true;
            cvar.notify_one();
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Settings debounce thread panicked");
            }
        }
    }
}

impl Drop for DebouncedApplier {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_debounce(slot: &PendingSlot, applier: &ConfigApplier) {
    let (lock, cvar) = &**slot;
    let mut pending = lock.lock();
    loop {
        let (deadline, shutdown) = (pending.deadline, pending.shutdown);
        match deadline {
            None if shutdown => return,
            None => cvar.wait(&mut pending),
            Some(deadline) if !shutdown && Instant::now() < deadline => {
                cvar.wait_until(&mut pending, deadline);
            }
            Some(_) => {
                let patch = std::mem::take(&mut pending.patch);
                pending.deadline = None;
                MutexGuard::unlocked(&mut pending, || {
                    if let Err(e) = applier.apply(&patch) {
                        warn!("Failed to apply settings: {}", e);
                    }
                });
            }
        }
    }
}
