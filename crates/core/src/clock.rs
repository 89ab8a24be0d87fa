// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time abstraction so pressure math, timeouts, and restore-list bookkeeping
//! can be driven by a fake clock in tests instead of the wall clock.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;

/// A source of monotonic and wall-clock time.
///
/// Everything in the pool that measures elapsed time (EWMA pressure, request
/// timeouts, child lease expiry) goes through this trait rather than calling
/// [`Instant::now`] directly, so tests can advance time deterministically.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// A monotonic instant suitable for measuring durations.
    fn now(&self) -> Instant;

    /// Wall-clock time, for timestamps surfaced in logs and API responses.
    fn system_now(&self) -> SystemTime;
}

/// The real clock. Delegates directly to [`std::time`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A fake clock that only advances when told to. Shared via `Arc` so a test
/// can hold a handle and advance it while the code under test holds the
/// trait object.
#[derive(Debug, Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<FakeClockState>>,
}

#[derive(Debug)]
struct FakeClockState {
    monotonic: Instant,
    wall: SystemTime,
}

impl FakeClock {
    /// Start a fake clock pinned at the real current time.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeClockState {
                monotonic: Instant::now(),
                wall: SystemTime::now(),
            })),
        }
    }

    /// Advance both the monotonic and wall-clock readings by `d`.
    pub fn advance(&self, d: Duration) {
        let mut state = self.inner.lock();
        state.monotonic += d;
        state.wall += d;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.inner.lock().monotonic
    }

    fn system_now(&self) -> SystemTime {
        self.inner.lock().wall
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
