//! Idle detection
//!
//! `IdleMonitor` polls an `IdleSource` once per second and fires its callback
//! once per continuous idle episode. Idle time accumulated before `start()`
//! never counts toward the threshold.

pub mod system;

use crate::constants::IDLE_POLL_INTERVAL_SECS;
use crate::settings::Settings;
use crate::timer::RepeatingTimer;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use system::SystemIdleSource;

/// Time since the last user input, as reported by the OS
pub trait IdleSource: Send + Sync {
    fn idle_time(&self) -> anyhow::Result<Duration>;
}

pub type IdleCallback = Arc<dyn Fn() + Send + Sync>;

/// When the monitor should fire; `None` keeps it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdlePolicy {
    threshold: Option<Duration>,
}

impl IdlePolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            threshold: settings.idle_threshold(),
        }
    }

    pub fn with_threshold(threshold: Duration) -> Self {
        Self {
            threshold: (!threshold.is_zero()).then_some(threshold),
        }
    }

    pub fn disabled() -> Self {
        Self { threshold: None }
    }

    pub fn threshold(&self) -> Option<Duration> {
        self.threshold
    }
}

/// One idle episode's bookkeeping, independent of any clock source
#[derive(Debug)]
pub struct IdleTracker {
    threshold: Duration,
    started: Instant,
    fired: bool,
}

impl IdleTracker {
    pub fn new(threshold: Duration, started: Instant) -> Self {
        Self {
            threshold,
            started,
            fired: false,
        }
    }

    /// Feed one OS sample taken at `now`; true means fire the callback
    pub fn observe(&mut self, os_idle: Duration, now: Instant) -> bool {
        let effective = os_idle.min(now.saturating_duration_since(self.started));

        if effective >= self.threshold {
            if self.fired {
                return false;
            }
            self.fired = true;
            return true;
        }

        if os_idle < self.threshold {
            self.fired = false;
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdlePhase {
    Stopped,
    Polling,
}

pub struct IdleMonitor {
    source: Arc<dyn IdleSource>,
    poll_interval: Duration,
    timer: Mutex<Option<RepeatingTimer>>,
}

impl IdleMonitor {
    pub fn new(source: Arc<dyn IdleSource>) -> Self {
        Self::with_poll_interval(source, Duration::from_secs(IDLE_POLL_INTERVAL_SECS))
    }

    /// Monitor with a custom poll interval (tests use milliseconds)
    pub fn with_poll_interval(source: Arc<dyn IdleSource>, poll_interval: Duration) -> Self {
        Self {
            source,
            poll_interval,
            timer: Mutex::new(None),
        }
    }

    pub fn phase(&self) -> IdlePhase {
        match self.timer.lock().as_ref() {
            Some(timer) if !timer.is_cancelled() => IdlePhase::Polling,
            _ => IdlePhase::Stopped,
        }
    }

    /// Begin polling under `policy`; any previous poll is stopped first
    pub fn start(&self, policy: IdlePolicy, on_idle: IdleCallback) {
        self.stop();

        let Some(threshold) = policy.threshold() else {
            info!("Idle monitor not started: lock screen disabled");
            return;
        };

        let source = self.source.clone();
        let mut tracker = IdleTracker::new(threshold, Instant::now());
        let mut query_failing = false;

        let spawned = RepeatingTimer::spawn("idle-monitor", self.poll_interval, false, move |_| {
            match source.idle_time() {
                Ok(idle) => {
                    query_failing = false;
                    if tracker.observe(idle, Instant::now()) {
                        info!("User idle for {:?}, triggering screensaver", threshold);
                        on_idle();
                    }
                }
                Err(e) => {
                    // Logged once per failure streak; polling continues
                    if !query_failing {
                        warn!("Failed to query system idle time: {:#}", e);
                        query_failing = true;
                    }
                }
            }
        });

        match spawned {
            Ok(timer) => {
                let previous = self.timer.lock().replace(timer);
                drop(previous);
                info!("Idle monitor started (threshold {:?})", threshold);
            }
            Err(e) => warn!("Failed to spawn idle monitor thread: {}", e),
        }
    }

    /// Cancel polling; safe to call when already stopped
    pub fn stop(&self) {
        let previous = self.timer.lock().take();
        if let Some(mut timer) = previous {
            timer.cancel();
            debug!("Idle monitor stopped");
        }
    }

    pub fn restart(&self, policy: IdlePolicy, on_idle: IdleCallback) {
        self.stop();
        self.start(policy, on_idle);
    }
}

impl Drop for IdleMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
