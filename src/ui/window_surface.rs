//! tao-backed lock surface
//!
//! Windows can only be created on the event-loop thread. `WindowSurfaceFactory`
//! asks the loop to open one through the `EventLoopProxy` and blocks until
//! it answers, so `activate` must never run on the event-loop thread itself.
//! `SurfaceHost` lives inside the event loop and owns the actual windows.

use super::UiEvent;
use crate::constants::SURFACE_OPEN_TIMEOUT_SECS;
use crate::error::{Result, ScreensaverError};
use crate::screensaver::rotation::Wallpaper;
use crate::screensaver::surface::{
    LockSurface, SurfaceEvent, SurfaceEventSink, SurfaceFactory, SurfaceResponse, SurfaceSpec,
};
use crate::screensaver::unlock::UnlockInput;
use crate::settings::{DisplaySettings, Settings};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tao::event::{ElementState, WindowEvent};
use tao::event_loop::{EventLoopProxy, EventLoopWindowTarget};
use tao::keyboard::Key;
use tao::window::{Fullscreen, Window, WindowBuilder, WindowId};

#[derive(Debug, Clone)]
pub enum SurfaceCommand {
    ShowWallpaper(Wallpaper),
    ApplySettings(DisplaySettings),
    ReassertFocus,
    ReassertFullscreen,
    Close,
}

/// Window id, or why the window could not be created
pub type OpenResult<T> = std::result::Result<T, String>;

/// Answer slot for an open request
///
/// The requester abandons it when it stops waiting. Sending and abandoning
/// take the same lock, so a result is either delivered or handed back to
/// the sender, never lost in between.
pub struct OpenReply<T> {
    slot: Arc<Mutex<Option<mpsc::Sender<OpenResult<T>>>>>,
}

impl<T> Clone for OpenReply<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T> OpenReply<T> {
    pub fn channel() -> (Self, mpsc::Receiver<OpenResult<T>>) {
        let (sender, receiver) = mpsc::channel();
        let reply = Self {
            slot: Arc::new(Mutex::new(Some(sender))),
        };
        (reply, receiver)
    }

    /// Deliver `result`; it comes back as `Err` when nobody is waiting
    pub fn send(&self, result: OpenResult<T>) -> std::result::Result<(), OpenResult<T>> {
        match self.slot.lock().as_ref() {
            Some(sender) => sender.send(result).map_err(|e| e.0),
            None => Err(result),
        }
    }

    /// Stop waiting; later sends are handed back
    pub fn abandon(&self) {
        self.slot.lock().take();
    }
}

/// Wait up to `timeout` for the event loop to answer an open request
pub fn await_open<T>(
    reply: &OpenReply<T>,
    answer: &mpsc::Receiver<OpenResult<T>>,
    timeout: Duration,
) -> Result<T> {
    let result = match answer.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => {
            reply.abandon();
            // Answered between the timeout and the abandon
            answer.try_recv().map_err(|_| {
                ScreensaverError::Surface("timed out waiting for the lock window".to_string())
            })?
        }
    };
    result.map_err(ScreensaverError::Surface)
}

pub struct WindowSurfaceFactory {
    proxy: Mutex<EventLoopProxy<UiEvent>>,
}

impl WindowSurfaceFactory {
    pub fn new(proxy: EventLoopProxy<UiEvent>) -> Self {
        Self {
            proxy: Mutex::new(proxy),
        }
    }
}

impl SurfaceFactory for WindowSurfaceFactory {
    fn open(&self, spec: SurfaceSpec, events: SurfaceEventSink) -> Result<Box<dyn LockSurface>> {
        let (reply, answer) = OpenReply::channel();
        let proxy = self.proxy.lock().clone();
        proxy
            .send_event(UiEvent::OpenSurface {
                spec,
                events,
                reply: reply.clone(),
            })
            .map_err(|_| ScreensaverError::Surface("event loop is not running".to_string()))?;

        let id = await_open(&reply, &answer, Duration::from_secs(SURFACE_OPEN_TIMEOUT_SECS))?;

        Ok(Box::new(WindowSurface { id, proxy }))
    }
}

/// Handle to a window owned by `SurfaceHost`
struct WindowSurface {
    id: WindowId,
    proxy: EventLoopProxy<UiEvent>,
}

impl WindowSurface {
    fn send(&self, command: SurfaceCommand) {
        if self.proxy.send_event(UiEvent::Surface(self.id, command)).is_err() {
            warn!("Event loop closed; lock surface command dropped");
        }
    }
}

impl LockSurface for WindowSurface {
    fn show_wallpaper(&mut self, wallpaper: &Wallpaper) {
        self.send(SurfaceCommand::ShowWallpaper(wallpaper.clone()));
    }

    fn apply_settings(&mut self, settings: &Settings) {
        self.send(SurfaceCommand::ApplySettings(settings.display.clone()));
    }

    fn reassert_focus(&mut self) {
        self.send(SurfaceCommand::ReassertFocus);
    }

    fn reassert_fullscreen(&mut self) {
        self.send(SurfaceCommand::ReassertFullscreen);
    }

    fn close(self: Box<Self>) {
        self.send(SurfaceCommand::Close);
    }
}

struct HostedWindow {
    window: Window,
    events: SurfaceEventSink,
}

/// Owns the lock windows on the event-loop thread
#[derive(Default)]
pub struct SurfaceHost {
    windows: HashMap<WindowId, HostedWindow>,
}

impl SurfaceHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a lock window and answer the requester
    ///
    /// A window whose requester already gave up is closed again at once.
    pub fn open_requested(
        &mut self,
        target: &EventLoopWindowTarget<UiEvent>,
        spec: SurfaceSpec,
        events: SurfaceEventSink,
        reply: &OpenReply<WindowId>,
    ) {
        let opened = self.open(target, spec, events);
        if let Err(unclaimed) = reply.send(opened) {
            match unclaimed {
                Ok(id) => {
                    warn!("Lock window {:?} opened after its request timed out; closing it", id);
                    self.close(id);
                }
                Err(e) => debug!("Lock window failed after its request timed out: {}", e),
            }
        }
    }

    fn open(
        &mut self,
        target: &EventLoopWindowTarget<UiEvent>,
        spec: SurfaceSpec,
        events: SurfaceEventSink,
    ) -> std::result::Result<WindowId, String> {
        let monitor = target.primary_monitor();
        let window = WindowBuilder::new()
            .with_title(&spec.title)
            .with_fullscreen(Some(Fullscreen::Borderless(monitor)))
            .with_decorations(false)
            .with_always_on_top(true)
            .with_resizable(false)
            .with_minimizable(false)
            .with_closable(false)
            .build(target)
            .map_err(|e| e.to_string())?;
        window.set_focus();

        let id = window.id();
        info!("Lock window opened ({:?})", id);
        self.windows.insert(id, HostedWindow { window, events });
        Ok(id)
    }

    pub fn handle_command(&mut self, id: WindowId, command: SurfaceCommand) {
        let Some(hosted) = self.windows.get_mut(&id) else {
            debug!("Command for unknown lock window {:?}", id);
            return;
        };
        match command {
            SurfaceCommand::ShowWallpaper(wallpaper) => {
                debug!("Lock window wallpaper: {:?}", wallpaper);
                hosted.window.request_redraw();
            }
            SurfaceCommand::ApplySettings(display) => {
                debug!("Lock window theme {}, clock colour {}", display.theme, display.time_color);
                hosted.window.request_redraw();
            }
            SurfaceCommand::ReassertFocus => hosted.window.set_focus(),
            SurfaceCommand::ReassertFullscreen => {
                let monitor = hosted.window.current_monitor();
                hosted.window.set_fullscreen(Some(Fullscreen::Borderless(monitor)));
                hosted.window.set_always_on_top(true);
            }
            SurfaceCommand::Close => self.close(id),
        }
    }

    /// Translate a tao window event and forward it to the controller
    pub fn handle_window_event(&mut self, id: WindowId, event: &WindowEvent) {
        let Some(hosted) = self.windows.get(&id) else {
            return;
        };
        let Some(surface_event) = map_window_event(&hosted.window, event) else {
            return;
        };
        let response = (hosted.events)(surface_event);
        if surface_event == SurfaceEvent::CloseRequested && response == SurfaceResponse::Allow {
            self.windows.remove(&id);
        }
    }

    fn close(&mut self, id: WindowId) {
        if self.windows.remove(&id).is_some() {
            info!("Lock window closed ({:?})", id);
        }
    }
}

fn map_window_event(window: &Window, event: &WindowEvent) -> Option<SurfaceEvent> {
    match event {
        WindowEvent::Focused(false) => Some(SurfaceEvent::FocusLost),
        WindowEvent::Resized(_) if window.fullscreen().is_none() => Some(SurfaceEvent::FullscreenExited),
        WindowEvent::Moved(_) if window.fullscreen().is_none() => Some(SurfaceEvent::MoveRequested),
        WindowEvent::CloseRequested => Some(SurfaceEvent::CloseRequested),
        WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
            Some(SurfaceEvent::Input(map_key(&event.logical_key)))
        }
        WindowEvent::MouseInput {
            state: ElementState::Pressed,
            ..
        } => Some(SurfaceEvent::Input(UnlockInput::Pointer)),
        _ => None,
    }
}

fn map_key(key: &Key<'_>) -> UnlockInput {
    match key {
        Key::Enter => UnlockInput::Enter,
        Key::Backspace => UnlockInput::Backspace,
        Key::Escape => UnlockInput::Escape,
        Key::Space => UnlockInput::Char(' '),
        Key::Character(text) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => UnlockInput::Char(ch),
                _ => UnlockInput::OtherKey,
            }
        }
        _ => UnlockInput::OtherKey,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_reaches_waiting_requester() {
        let (reply, answer) = OpenReply::<u32>::channel();
        assert!(reply.send(Ok(7)).is_ok());
        assert_eq!(await_open(&reply, &answer, Duration::from_millis(50)).unwrap(), 7);
    }

    #[test]
    fn test_open_error_is_a_surface_error() {
        let (reply, answer) = OpenReply::<u32>::channel();
        assert!(reply.send(Err("no display".to_string())).is_ok());
        let result = await_open(&reply, &answer, Duration::from_millis(50));
        assert!(matches!(result, Err(ScreensaverError::Surface(ref msg)) if msg == "no display"));
    }

    #[test]
    fn test_late_window_is_handed_back_after_timeout() {
        let (reply, answer) = OpenReply::<u32>::channel();
        let host_side = reply.clone();

        let result = await_open(&reply, &answer, Duration::from_millis(20));
        assert!(matches!(result, Err(ScreensaverError::Surface(_))));

        // The event loop gets to the request afterwards and must clean up
        assert_eq!(host_side.send(Ok(3)), Err(Ok(3)));
    }

    #[test]
    fn test_dropped_requester_hands_window_back() {
        let (reply, answer) = OpenReply::<u32>::channel();
        drop(answer);
        assert_eq!(reply.send(Ok(4)), Err(Ok(4)));
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(map_key(&Key::Enter), UnlockInput::Enter);
        assert_eq!(map_key(&Key::Character("a")), UnlockInput::Char('a'));
        assert_eq!(map_key(&Key::Character("ab")), UnlockInput::OtherKey);
        assert_eq!(map_key(&Key::Space), UnlockInput::Char(' '));
        assert_eq!(map_key(&Key::ArrowLeft), UnlockInput::OtherKey);
    }
}
