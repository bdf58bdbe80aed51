//! Wall-clock time source.
//!
//! The update router stamps its liveness heartbeat with the current Unix
//! time and rate-limits it by elapsed milliseconds. Both come from a
//! [`Clock`] so tests can drive time explicitly with
//! [`MockClock`](crate::hal::MockClock).

use std::time::{SystemTime, UNIX_EPOCH};

/// Time source in milliseconds since the Unix epoch.
///
/// # Example
///
/// ```rust
/// use rs_sitebridge::traits::Clock;
/// use rs_sitebridge::hal::MockClock;
///
/// let clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(1500);
/// assert_eq!(clock.unix_secs(), 1);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;

    /// Returns current time in whole seconds since the Unix epoch.
    fn unix_secs(&self) -> u64 {
        self.now_ms() / 1000
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Clock backed by [`SystemTime`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
