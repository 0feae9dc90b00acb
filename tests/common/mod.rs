#![allow(dead_code)]

use parking_lot::Mutex;
use ruanm_screensaver::error::{Result, ScreensaverError};
use ruanm_screensaver::idle::IdleSource;
use ruanm_screensaver::screensaver::rotation::Wallpaper;
use ruanm_screensaver::screensaver::surface::{LockSurface, SurfaceEventSink, SurfaceFactory, SurfaceSpec};
use ruanm_screensaver::settings::Settings;
use ruanm_screensaver::wallpaper::WallpaperProvider;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Fresh, empty directory under the system temp dir
pub fn scratch_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = std::env::temp_dir()
        .join("ruanm_screensaver_it")
        .join(format!("{}_{}_{}", name, std::process::id(), nanos));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Poll `check` until it holds or `timeout` passes
pub fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    check()
}

/// Everything the fake surfaces observed
#[derive(Default)]
pub struct SurfaceLog {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub focus_reasserts: AtomicUsize,
    pub fullscreen_reasserts: AtomicUsize,
    pub wallpapers: Mutex<Vec<Wallpaper>>,
    pub applied: Mutex<Vec<Settings>>,
    pub specs: Mutex<Vec<SurfaceSpec>>,
    pub sinks: Mutex<Vec<SurfaceEventSink>>,
}

impl SurfaceLog {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn wallpaper_count(&self) -> usize {
        self.wallpapers.lock().len()
    }

    /// Event sink handed to the most recently opened surface
    pub fn last_sink(&self) -> SurfaceEventSink {
        self.sinks.lock().last().cloned().unwrap()
    }
}

pub struct FakeSurfaceFactory {
    pub log: Arc<SurfaceLog>,
    pub fail: bool,
}

impl FakeSurfaceFactory {
    pub fn new() -> (Arc<Self>, Arc<SurfaceLog>) {
        let log = Arc::new(SurfaceLog::default());
        (
            Arc::new(Self {
                log: log.clone(),
                fail: false,
            }),
            log,
        )
    }

    pub fn failing() -> (Arc<Self>, Arc<SurfaceLog>) {
        let log = Arc::new(SurfaceLog::default());
        (
            Arc::new(Self {
                log: log.clone(),
                fail: true,
            }),
            log,
        )
    }
}

impl SurfaceFactory for FakeSurfaceFactory {
    fn open(&self, spec: SurfaceSpec, events: SurfaceEventSink) -> Result<Box<dyn LockSurface>> {
        if self.fail {
            return Err(ScreensaverError::Surface("no display".to_string()));
        }
        self.log.opened.fetch_add(1, Ordering::SeqCst);
        self.log.specs.lock().push(spec);
        self.log.sinks.lock().push(events);
        Ok(Box::new(FakeSurface {
            log: self.log.clone(),
        }))
    }
}

struct FakeSurface {
    log: Arc<SurfaceLog>,
}

impl LockSurface for FakeSurface {
    fn show_wallpaper(&mut self, wallpaper: &Wallpaper) {
        self.log.wallpapers.lock().push(wallpaper.clone());
    }

    fn apply_settings(&mut self, settings: &Settings) {
        self.log.applied.lock().push(settings.clone());
    }

    fn reassert_focus(&mut self) {
        self.log.focus_reasserts.fetch_add(1, Ordering::SeqCst);
    }

    fn reassert_fullscreen(&mut self) {
        self.log.fullscreen_reasserts.fetch_add(1, Ordering::SeqCst);
    }

    fn close(self: Box<Self>) {
        self.log.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Wallpaper provider answering instantly with numbered URLs
#[derive(Default)]
pub struct CountingProvider {
    pub calls: AtomicUsize,
    pub categories: Mutex<Vec<String>>,
}

impl CountingProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WallpaperProvider for CountingProvider {
    fn fetch_url(&self, category: &str) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.categories.lock().push(category.to_string());
        Ok(format!("https://img.example/{}/{}.jpg", category, n))
    }
}

/// Idle source reporting a fixed idle time
pub struct FixedIdleSource {
    pub idle: Mutex<Duration>,
    pub queries: AtomicUsize,
}

impl FixedIdleSource {
    pub fn new(idle: Duration) -> Arc<Self> {
        Arc::new(Self {
            idle: Mutex::new(idle),
            queries: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, idle: Duration) {
        *self.idle.lock() = idle;
    }
}

impl IdleSource for FixedIdleSource {
    fn idle_time(&self) -> anyhow::Result<Duration> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(*self.idle.lock())
    }
}
