//! A monotonic clock handle, injected rather than read from a process-wide
//! global. `ManualClock` is the deterministic implementation simulations and
//! tests drive via `advance`; `SystemClock` is a thin wrapper over the wall
//! clock for embedding applications that don't need to control time.

use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

/// Contract: `now()` returns seconds since epoch and never decreases
/// between successive calls.
pub trait Clock {
    fn now(&self) -> u64;
}

/// Deterministic clock for simulations and tests. Starts at an explicit
/// `start` and only moves forward via [`ManualClock::advance`].
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        ManualClock { now: Cell::new(start) }
    }

    /// Advances the clock by `secs` seconds and returns the new time.
    pub fn advance(&self, secs: u64) -> u64 {
        let next = self.now.get() + secs;
        self.now.set(next);
        next
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.get()
    }
}

/// Wall-clock backed implementation for production use. Non-decreasing by
/// construction (`SystemTime` is monotonic enough for second-granularity
/// accounting); `fast_forward_time` is meaningless against it.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the epoch")
            .as_secs()
    }
}
