//! Cooperative cancellation shared between the foreground and a worker.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pendulum_traits::Clock;

/// Longest uninterrupted sleep inside [`CancelToken::sleep`].
const SLICE: Duration = Duration::from_millis(10);

/// Cheap clonable flag; every clone observes the same cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> crate::error::Result<()> {
        if self.is_cancelled() {
            Err(eyre::Report::new(crate::error::RigError::Cancelled))
        } else {
            Ok(())
        }
    }

    /// Sleep `d` on `clock`, waking every few milliseconds to return
    /// `Err(Cancelled)` as soon as cancellation is requested.
    pub fn sleep<C: Clock + ?Sized>(&self, clock: &C, d: Duration) -> crate::error::Result<()> {
        let until = clock.now() + d;
        loop {
            self.check()?;
            let left = until.saturating_duration_since(clock.now());
            if left.is_zero() {
                return Ok(());
            }
            clock.sleep(left.min(SLICE));
        }
    }
}
