//! Screensaver lifecycle
//!
//! `ScreensaverController` owns the lock session: the surface handle, the
//! wallpaper rotation timer and the unlock gate. Phases move strictly
//! `Inactive -> Activating -> Active -> Deactivating -> Inactive`; the
//! intermediate phases make concurrent activate/deactivate calls no-ops.

pub mod rotation;
pub mod surface;
pub mod unlock;

use crate::constants::{FOCUS_REASSERT_DELAY_MS, FULLSCREEN_REASSERT_DELAY_MS, LOCK_SURFACE_TITLE};
use crate::error::Result;
use crate::idle::{IdleMonitor, IdlePolicy};
use crate::settings::{Settings, SharedSettings};
use crate::timer::{self, RepeatingTimer};
use crate::wallpaper::{RetryPolicy, WallpaperProvider};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;

use rotation::{next_wallpaper, Wallpaper};
use surface::{LockSurface, SurfaceEvent, SurfaceEventSink, SurfaceFactory, SurfaceResponse, SurfaceSpec};
use unlock::{UnlockGate, UnlockOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPhase {
    Inactive,
    Activating,
    Active,
    Deactivating,
}

pub type PhaseListener = Arc<dyn Fn(LockPhase) + Send + Sync>;

struct LockSession {
    surface: Box<dyn LockSurface>,
    rotation: Option<RepeatingTimer>,
    gate: UnlockGate,
}

struct ControllerState {
    phase: LockPhase,
    session: Option<LockSession>,
}

pub struct ScreensaverController {
    this: Weak<ScreensaverController>,
    settings: SharedSettings,
    factory: Arc<dyn SurfaceFactory>,
    provider: Arc<dyn WallpaperProvider>,
    idle: Arc<IdleMonitor>,
    retry: RetryPolicy,
    state: Mutex<ControllerState>,
    phase_listener: Mutex<Option<PhaseListener>>,
}

impl ScreensaverController {
    pub fn new(
        settings: SharedSettings,
        factory: Arc<dyn SurfaceFactory>,
        provider: Arc<dyn WallpaperProvider>,
        idle: Arc<IdleMonitor>,
    ) -> Arc<Self> {
        Self::with_retry_policy(settings, factory, provider, idle, RetryPolicy::default())
    }

    pub fn with_retry_policy(
        settings: SharedSettings,
        factory: Arc<dyn SurfaceFactory>,
        provider: Arc<dyn WallpaperProvider>,
        idle: Arc<IdleMonitor>,
        retry: RetryPolicy,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            settings,
            factory,
            provider,
            idle,
            retry,
            state: Mutex::new(ControllerState {
                phase: LockPhase::Inactive,
                session: None,
            }),
            phase_listener: Mutex::new(None),
        })
    }

    pub fn phase(&self) -> LockPhase {
        self.state.lock().phase
    }

    pub fn is_active(&self) -> bool {
        self.phase() == LockPhase::Active
    }

    /// Called on every settled phase change (used for the tray icon)
    pub fn set_phase_listener(&self, listener: PhaseListener) {
        *self.phase_listener.lock() = Some(listener);
    }

    /// Show the lock surface; no-op unless `Inactive`
    pub fn activate(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.phase != LockPhase::Inactive {
                debug!("Activate ignored: screensaver is {:?}", state.phase);
                return Ok(());
            }
            state.phase = LockPhase::Activating;
        }

        let settings = self.settings.snapshot();
        let spec = SurfaceSpec::from_settings(LOCK_SURFACE_TITLE, &settings);

        let mut surface = match self.factory.open(spec, self.event_sink()) {
            Ok(surface) => surface,
            Err(e) => {
                warn!("Failed to open lock surface: {}", e);
                self.state.lock().phase = LockPhase::Inactive;
                self.notify_phase(LockPhase::Inactive);
                return Err(e);
            }
        };
        surface.apply_settings(&settings);

        {
            let mut state = self.state.lock();
            state.session = Some(LockSession {
                surface,
                rotation: None,
                gate: UnlockGate::new(settings.unlock_password()),
            });
            state.phase = LockPhase::Active;
        }
        info!("Screensaver activated");
        self.notify_phase(LockPhase::Active);

        // Deactivation re-arms idle detection
        self.idle.stop();
        self.restart_rotation();
        Ok(())
    }

    /// Close the lock surface; no-op unless `Active`
    pub fn deactivate(&self) {
        let session = {
            let mut state = self.state.lock();
            if state.phase != LockPhase::Active {
                debug!("Deactivate ignored: screensaver is {:?}", state.phase);
                return;
            }
            state.phase = LockPhase::Deactivating;
            state.session.take()
        };

        if let Some(mut session) = session {
            if let Some(rotation) = session.rotation.take() {
                rotation.cancel_detached();
            }
            session.surface.close();
        }

        self.state.lock().phase = LockPhase::Inactive;
        info!("Screensaver deactivated");
        self.notify_phase(LockPhase::Inactive);
        self.rearm_idle();
    }

    /// Forward changed settings to the live session without recreating it
    pub fn push_settings_update(&self, settings: &Settings) {
        let mut state = self.state.lock();
        if state.phase != LockPhase::Active {
            return;
        }
        if let Some(session) = state.session.as_mut() {
            session.surface.apply_settings(settings);
            session.gate.set_password(settings.unlock_password());
            debug!("Settings pushed to active lock surface");
        }
    }

    /// Restart idle detection from the committed settings
    ///
    /// While a session is up the monitor stays stopped; `deactivate` arms it.
    pub fn rearm_idle(&self) {
        if self.phase() != LockPhase::Inactive {
            self.idle.stop();
            return;
        }

        let policy = IdlePolicy::from_settings(&self.settings.snapshot());
        let weak = self.this.clone();
        self.idle.restart(
            policy,
            Arc::new(move || {
                if let Some(controller) = weak.upgrade() {
                    if let Err(e) = controller.activate() {
                        warn!("Idle trigger could not start the screensaver: {}", e);
                    }
                }
            }),
        );
    }

    /// Replace the rotation timer using the committed settings
    ///
    /// The first wallpaper is produced immediately. Does nothing outside an
    /// active session.
    pub fn restart_rotation(&self) {
        let previous = {
            let mut state = self.state.lock();
            if state.phase != LockPhase::Active {
                return;
            }
            state.session.as_mut().and_then(|s| s.rotation.take())
        };
        if let Some(mut previous) = previous {
            previous.cancel();
        }

        let settings = self.settings.snapshot();
        // Interval 0: one wallpaper now, no further ticks
        let interval = settings.wallpaper_interval().unwrap_or(Duration::MAX);

        let weak = self.this.clone();
        let shared = self.settings.clone();
        let provider = self.provider.clone();
        let retry = self.retry;
        let spawned = RepeatingTimer::spawn("wallpaper-rotation", interval, true, move |cancellation| {
            let snapshot = shared.snapshot();
            let Some(wallpaper) = next_wallpaper(&snapshot, provider.as_ref(), retry, cancellation) else {
                debug!("No wallpaper this tick");
                return;
            };
            if cancellation.is_cancelled() {
                return;
            }
            if let Some(controller) = weak.upgrade() {
                controller.show_wallpaper(&wallpaper);
            }
        });

        let timer = match spawned {
            Ok(timer) => timer,
            Err(e) => {
                warn!("Failed to spawn wallpaper rotation thread: {}", e);
                return;
            }
        };

        let mut state = self.state.lock();
        let active = state.phase == LockPhase::Active;
        let leftover = match state.session.as_mut() {
            Some(session) if active => session.rotation.replace(timer),
            // Session ended while the thread was spawning
            _ => Some(timer),
        };
        drop(state);
        if let Some(leftover) = leftover {
            leftover.cancel_detached();
        }
        debug!("Wallpaper rotation restarted (interval {:?})", interval);
    }

    /// React to interference or input reported by the lock surface
    pub fn handle_surface_event(&self, event: SurfaceEvent) -> SurfaceResponse {
        let active = self.is_active();
        match event {
            SurfaceEvent::FocusLost => {
                if active {
                    debug!("Lock surface lost focus - reclaiming");
                    self.schedule_reassert(
                        "reassert-focus",
                        Duration::from_millis(FOCUS_REASSERT_DELAY_MS),
                        |surface| surface.reassert_focus(),
                    );
                }
                SurfaceResponse::Suppress
            }
            SurfaceEvent::FullscreenExited => {
                if active {
                    debug!("Lock surface left fullscreen - restoring");
                    self.schedule_reassert(
                        "reassert-fullscreen",
                        Duration::from_millis(FULLSCREEN_REASSERT_DELAY_MS),
                        |surface| surface.reassert_fullscreen(),
                    );
                }
                SurfaceResponse::Suppress
            }
            SurfaceEvent::CloseRequested
            | SurfaceEvent::MinimizeRequested
            | SurfaceEvent::MoveRequested => {
                if self.phase() == LockPhase::Inactive {
                    return SurfaceResponse::Allow;
                }
                debug!("Suppressed {:?} on lock surface", event);
                SurfaceResponse::Suppress
            }
            SurfaceEvent::Input(input) => {
                let outcome = {
                    let mut state = self.state.lock();
                    if state.phase != LockPhase::Active {
                        return SurfaceResponse::Suppress;
                    }
                    match state.session.as_mut() {
                        Some(session) => session.gate.feed(input),
                        None => return SurfaceResponse::Suppress,
                    }
                };
                if outcome == UnlockOutcome::Unlocked {
                    self.deactivate();
                }
                SurfaceResponse::Consumed
            }
        }
    }

    fn show_wallpaper(&self, wallpaper: &Wallpaper) {
        let mut state = self.state.lock();
        if state.phase != LockPhase::Active {
            return;
        }
        if let Some(session) = state.session.as_mut() {
            debug!("Showing wallpaper {:?}", wallpaper);
            session.surface.show_wallpaper(wallpaper);
        }
    }

    fn schedule_reassert(&self, name: &str, delay: Duration, action: fn(&mut dyn LockSurface)) {
        let weak = self.this.clone();
        timer::run_after(name, delay, move || {
            let Some(controller) = weak.upgrade() else {
                return;
            };
            let mut state = controller.state.lock();
            if state.phase != LockPhase::Active {
                return;
            }
            if let Some(session) = state.session.as_mut() {
                action(session.surface.as_mut());
            }
        });
    }

    fn event_sink(&self) -> SurfaceEventSink {
        let weak = self.this.clone();
        Arc::new(move |event| match weak.upgrade() {
            Some(controller) => controller.handle_surface_event(event),
            None => SurfaceResponse::Allow,
        })
    }

    fn notify_phase(&self, phase: LockPhase) {
        let listener = self.phase_listener.lock().clone();
        if let Some(listener) = listener {
            listener(phase);
        }
    }
}

impl Drop for ScreensaverController {
    fn drop(&mut self) {
        if let Some(mut session) = self.state.get_mut().session.take() {
            if let Some(rotation) = session.rotation.take() {
                rotation.cancel_detached();
            }
            session.surface.close();
        }
    }
}
