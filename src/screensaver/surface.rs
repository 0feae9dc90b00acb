//! Lock surface contract
//!
//! The controller only talks to the fullscreen window through these traits;
//! the tao implementation lives in `ui::window_surface`.

use super::rotation::Wallpaper;
use super::unlock::UnlockInput;
use crate::error::Result;
use crate::settings::{DisplaySettings, Settings};
use std::sync::Arc;

/// What the surface must look like when opened
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSpec {
    pub title: String,
    pub display: DisplaySettings,
    pub password_protected: bool,
}

impl SurfaceSpec {
    pub fn from_settings(title: &str, settings: &Settings) -> Self {
        Self {
            title: title.to_string(),
            display: settings.display.clone(),
            password_protected: settings.unlock_password().is_some(),
        }
    }
}

/// Window-manager interference and user input reported by the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    FocusLost,
    FullscreenExited,
    CloseRequested,
    MinimizeRequested,
    MoveRequested,
    Input(UnlockInput),
}

/// The controller's answer to a surface event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceResponse {
    /// Ignore the request; the window stays as it is
    Suppress,
    /// Let the window manager proceed (only outside an active session)
    Allow,
    /// Input consumed by the unlock gate
    Consumed,
}

pub type SurfaceEventSink = Arc<dyn Fn(SurfaceEvent) -> SurfaceResponse + Send + Sync>;

/// A live fullscreen, topmost, non-closable lock window
pub trait LockSurface: Send {
    fn show_wallpaper(&mut self, wallpaper: &Wallpaper);

    /// Push display fields without recreating the window
    fn apply_settings(&mut self, settings: &Settings);

    fn reassert_focus(&mut self);

    fn reassert_fullscreen(&mut self);

    fn close(self: Box<Self>);
}

pub trait SurfaceFactory: Send + Sync {
    /// Open a surface on the primary display; `events` receives its events
    fn open(&self, spec: SurfaceSpec, events: SurfaceEventSink) -> Result<Box<dyn LockSurface>>;
}
