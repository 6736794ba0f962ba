//! Virtual clock for deterministic scheduler tests.

use std::{cell::Cell, rc::Rc, time::Duration};

use weft_core::Clock;

/// A clock that only advances when the test says so.
///
/// Instants are `Duration`s since an arbitrary zero. Clones share the same
/// underlying time, so the copy handed to the bridge and the copy kept by
/// the test stay in sync. Single-threaded by design, like the protocol
/// itself.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<Duration>>,
}

impl SimClock {
    /// Create a clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }
}

impl Clock for SimClock {
    type Instant = Duration;

    fn now(&self) -> Duration {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_time() {
        let clock = SimClock::new();
        let other = clock.clone();

        clock.advance(Duration::from_millis(7));
        assert_eq!(other.now(), Duration::from_millis(7));
    }
}
