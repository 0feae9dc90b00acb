//! Cancellable background timers
//!
//! Every periodic job (idle polling, wallpaper rotation, update debounce)
//! runs on its own named thread. Cancellation is a condvar-backed flag so a
//! sleeping thread wakes immediately instead of finishing its interval.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Shared cancellation flag handed to timer callbacks
#[derive(Clone, Default)]
pub struct Cancellation {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock() = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Sleep for `duration` unless cancelled first
    ///
    /// Returns false if the wait was cut short by cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let mut cancelled = flag.lock();
        match Instant::now().checked_add(duration) {
            Some(deadline) => {
                while !*cancelled {
                    if cvar.wait_until(&mut cancelled, deadline).timed_out() {
                        return !*cancelled;
                    }
                }
            }
            // Unrepresentable deadline: wait for cancellation only
            None => {
                while !*cancelled {
                    cvar.wait(&mut cancelled);
                }
            }
        }
        false
    }
}

/// A thread that runs a callback every `interval` until cancelled
pub struct RepeatingTimer {
    name: String,
    cancellation: Cancellation,
    handle: Option<JoinHandle<()>>,
    thread_id: Option<ThreadId>,
}

impl RepeatingTimer {
    /// Spawn the timer thread
    ///
    /// With `immediate` the callback runs once right away, then on every tick.
    pub fn spawn<F>(name: &str, interval: Duration, immediate: bool, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut(&Cancellation) + Send + 'static,
    {
        let cancellation = Cancellation::new();
        let token = cancellation.clone();
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            if immediate && !token.is_cancelled() {
                tick(&token);
            }
            while token.sleep(interval) {
                tick(&token);
            }
            log::debug!("Timer thread exiting");
        })?;

        Ok(Self {
            name: name.to_string(),
            cancellation,
            thread_id: Some(handle.thread().id()),
            handle: Some(handle),
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Signal the thread to stop without waiting for it
    ///
    /// A tick already in flight finishes on its own and must check
    /// `Cancellation::is_cancelled` before publishing results.
    pub fn cancel_detached(mut self) {
        self.cancellation.cancel();
        self.handle.take();
    }

    /// Stop the timer and wait for its thread
    ///
    /// When called from the timer's own callback the join is skipped; the
    /// thread exits as soon as the callback returns.
    pub fn cancel(&mut self) {
        self.cancellation.cancel();
        if let Some(handle) = self.handle.take() {
            if Some(thread::current().id()) == self.thread_id {
                return;
            }
            if handle.join().is_err() {
                log::warn!("Timer thread '{}' panicked", self.name);
            }
        }
    }
}

impl Drop for RepeatingTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Run `f` once on a short-lived thread after `delay`
pub fn run_after<F>(name: &str, delay: Duration, f: F)
where
    F: FnOnce() + Send + 'static,
{
    let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
        thread::sleep(delay);
        f();
    });
    if let Err(e) = spawned {
        log::warn!("Failed to spawn '{}' thread: {}", name, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_sleep_returns_early_on_cancel() {
        let token = Cancellation::new();
        let other = token.clone();
        let started = Instant::now();
        let waker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            other.cancel();
        });

        assert!(!token.sleep(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        waker.join().unwrap();
    }

    #[test]
    fn test_sleep_completes_without_cancel() {
        let token = Cancellation::new();
        assert!(token.sleep(Duration::from_millis(10)));
    }

    #[test]
    fn test_repeating_timer_ticks_and_stops() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let mut timer = RepeatingTimer::spawn("test-timer", Duration::from_millis(10), true, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(100));
        timer.cancel();
        let after_cancel = count.load(Ordering::SeqCst);
        assert!(after_cancel >= 2, "expected several ticks, got {}", after_cancel);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), after_cancel, "no ticks after cancel");
    }

    #[test]
    fn test_immediate_tick_runs_before_first_interval() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let _timer = RepeatingTimer::spawn("test-immediate", Duration::from_secs(60), true, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
