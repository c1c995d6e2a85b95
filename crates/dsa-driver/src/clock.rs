// SPDX-License-Identifier: AGPL-3.0-only

//! Time sources for the bounded `ready` wait
//!
//! The handshake measures its wall-clock budget through [`Clock`] so tests can
//! drive timeouts deterministically with [`ManualClock`].

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source
pub trait Clock: Debug + Send {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Clock whose origin is the moment of construction
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Deterministic clock for tests
///
/// Every call to [`Clock::now`] returns the current reading and then advances
/// it by `tick`, so a spin loop observes time passing at a fixed rate per
/// poll. Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
    tick_nanos: u64,
}

impl ManualClock {
    /// Clock frozen at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock that advances by `tick` on every reading
    pub fn ticking(tick: Duration) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(0)),
            tick_nanos: duration_nanos(tick),
        }
    }

    /// Move the clock forward by `by`
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(duration_nanos(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.fetch_add(self.tick_nanos, Ordering::SeqCst))
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticking_clock_advances_per_reading() {
        let clock = ManualClock::ticking(Duration::from_micros(5));
        assert_eq!(clock.now(), Duration::ZERO);
        assert_eq!(clock.now(), Duration::from_micros(5));
        clock.advance(Duration::from_micros(10));
        assert_eq!(clock.now(), Duration::from_micros(20));
    }

    #[test]
    fn clones_share_reading() {
        let a = ManualClock::new();
        let b = a.clone();
        a.advance(Duration::from_millis(1));
        assert_eq!(b.now(), Duration::from_millis(1));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let t0 = clock.now();
        assert!(clock.now() >= t0);
    }
}
