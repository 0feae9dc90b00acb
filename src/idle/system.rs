//! OS idle-time queries
//!
//! macOS asks CoreGraphics, Windows asks `GetLastInputInfo` and Linux asks the
//! X server's MIT-SCREEN-SAVER extension (XWayland included).

use super::IdleSource;
use anyhow::Result;
use std::time::Duration;

/// Idle time from the running platform
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemIdleSource;

impl IdleSource for SystemIdleSource {
    fn idle_time(&self) -> Result<Duration> {
        platform::idle_time()
    }
}

#[cfg(target_os = "macos")]
mod platform {
    use anyhow::{bail, Result};
    use std::time::Duration;

    // kCGEventSourceStateCombinedSessionState
    const COMBINED_SESSION_STATE: i32 = 0;
    // kCGAnyInputEventType
    const ANY_INPUT_EVENT_TYPE: u32 = !0;

    extern "C" {
        fn CGEventSourceSecondsSinceLastEventType(state_id: i32, event_type: u32) -> f64;
    }

    pub fn idle_time() -> Result<Duration> {
        let secs = unsafe {
            CGEventSourceSecondsSinceLastEventType(COMBINED_SESSION_STATE, ANY_INPUT_EVENT_TYPE)
        };
        if !secs.is_finite() || secs < 0.0 {
            bail!("CoreGraphics returned an invalid idle time: {}", secs);
        }
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use anyhow::{bail, Result};
    use std::time::Duration;
    use windows::Win32::System::SystemInformation::GetTickCount;
    use windows::Win32::UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO};

    pub fn idle_time() -> Result<Duration> {
        let mut info = LASTINPUTINFO {
            cbSize: std::mem::size_of::<LASTINPUTINFO>() as u32,
            dwTime: 0,
        };
        unsafe {
            if !GetLastInputInfo(&mut info).as_bool() {
                bail!("GetLastInputInfo failed");
            }
            // Both counters are 32-bit milliseconds and wrap every ~49 days
            let elapsed = GetTickCount().wrapping_sub(info.dwTime);
            Ok(Duration::from_millis(u64::from(elapsed)))
        }
    }
}

#[cfg(target_os = "linux")]
mod platform {
    use anyhow::{Context, Result};
    use parking_lot::{const_mutex, Mutex};
    use std::time::Duration;
    use x11rb::connection::Connection;
    use x11rb::protocol::screensaver::ConnectionExt as _;
    use x11rb::protocol::xproto::Window;
    use x11rb::rust_connection::RustConnection;

    // Opened on first use; dropped after a failure so the next poll reconnects
    static DISPLAY: Mutex<Option<(RustConnection, Window)>> = const_mutex(None);

    fn connect() -> Result<(RustConnection, Window)> {
        let (connection, screen) = x11rb::connect(None).context("Failed to connect to the X server")?;
        let root = connection
            .setup()
            .roots
            .get(screen)
            .map(|s| s.root)
            .context("X server reported no usable screen")?;
        Ok((connection, root))
    }

    fn query(connection: &RustConnection, root: Window) -> Result<Duration> {
        let info = connection
            .screensaver_query_info(root)
            .context("MIT-SCREEN-SAVER query failed")?
            .reply()
            .context("MIT-SCREEN-SAVER reply failed")?;
        Ok(Duration::from_millis(u64::from(info.ms_since_user_input)))
    }

    pub fn idle_time() -> Result<Duration> {
        let mut display = DISPLAY.lock();
        let (connection, root) = match display.take() {
            Some(open) => open,
            None => connect()?,
        };
        let idle = query(&connection, root)?;
        *display = Some((connection, root));
        Ok(idle)
    }
}

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
mod platform {
    use anyhow::{bail, Result};
    use std::time::Duration;

    pub fn idle_time() -> Result<Duration> {
        bail!("system idle time is not supported on this platform")
    }
}

#[cfg(all(test, not(any(target_os = "macos", target_os = "windows", target_os = "linux"))))]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_platform_reports_error() {
        assert!(SystemIdleSource.idle_time().is_err());
    }
}
