//! Clock abstraction for timer-driven streams.

use std::fmt::Debug;
use std::future::Future;
use std::ops::{Add, Sub};
use std::time::Duration;

/// A source of time and sleeps.
///
/// Timer-driven streams take a clock instead of calling a runtime directly,
/// so tests can run them on simulated time.
pub trait Clock: Clone + Send + Sync + Debug + 'static {
    /// Future returned by [`sleep`](Clock::sleep)
    type Sleep: Future<Output = ()> + Send;

    /// Point in time reported by [`now`](Clock::now)
    type Instant: Copy
        + Debug
        + Ord
        + Send
        + Sync
        + 'static
        + Add<Duration, Output = Self::Instant>
        + Sub<Self::Instant, Output = Duration>;

    /// Creates a future that completes after `duration`.
    fn sleep(&self, duration: Duration) -> Self::Sleep;

    /// Returns the current instant.
    fn now(&self) -> Self::Instant;
}

/// Clock backed by the tokio timer.
///
/// Follows tokio's paused clock in tests (`start_paused = true`).
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    type Sleep = tokio::time::Sleep;
    type Instant = tokio::time::Instant;

    fn sleep(&self, duration: Duration) -> Self::Sleep {
        tokio::time::sleep(duration)
    }

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }
}
