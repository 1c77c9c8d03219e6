//! Injectable pauses.
//!
//! Code that needs to wait takes a [`Sleeper`] rather than calling
//! `thread::sleep` itself, so tests can substitute [`SpySleeper`] and
//! observe how often a pause was requested without paying for it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const DEFAULT_SLEEP: Duration = Duration::from_secs(1);

pub trait Sleeper: Send + Sync {
    fn sleep(&self);
}

/// Blocks the current thread for a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultSleeper {
    duration: Duration,
}

impl DefaultSleeper {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Default for DefaultSleeper {
    fn default() -> Self {
        Self::new(DEFAULT_SLEEP)
    }
}

impl Sleeper for DefaultSleeper {
    fn sleep(&self) {
        std::thread::sleep(self.duration);
    }
}

/// Records calls instead of sleeping. Safe to share across threads.
#[derive(Debug, Default)]
pub struct SpySleeper {
    calls: AtomicUsize,
}

impl SpySleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Sleeper for SpySleeper {
    fn sleep(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self) {
        (**self).sleep();
    }
}

impl<S: Sleeper + ?Sized> Sleeper for std::sync::Arc<S> {
    fn sleep(&self) {
        (**self).sleep();
    }
}
