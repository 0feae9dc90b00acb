pub mod notifications;
pub mod tray;
pub mod window_surface;

use crate::screensaver::surface::{SurfaceEventSink, SurfaceSpec};
use crate::screensaver::LockPhase;
use tao::window::WindowId;
use tray_icon::menu::MenuId;

pub use window_surface::{OpenReply, SurfaceCommand};

/// Work posted to the event loop from background threads
pub enum UiEvent {
    OpenSurface {
        spec: SurfaceSpec,
        events: SurfaceEventSink,
        reply: OpenReply<WindowId>,
    },
    Surface(WindowId, SurfaceCommand),
    PhaseChanged(LockPhase),
    Menu(MenuId),
    Quit,
}
