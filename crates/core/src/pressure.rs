// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool pressure metrics: `failure_pressure` and `request_pressure`.
//!
//! Both are exponentially weighted moving averages sampled on state
//! transitions rather than on a fixed timer, so a quiet pool doesn't need a
//! background ticker just to let pressure decay.

/// An exponentially weighted moving average with a fixed smoothing factor.
///
/// `value' = alpha * sample + (1 - alpha) * value`. Decay between samples is
/// modeled by feeding in a zero sample; callers that want time-based decay
/// (as opposed to event-based decay) should call [`Ewma::decay`].
#[derive(Debug, Clone, Copy)]
pub struct Ewma {
    alpha: f64,
    value: f64,
}

impl Ewma {
    /// `alpha` is the weight given to each new sample, in `(0.0, 1.0]`.
    /// Smaller values smooth harder and decay slower.
    pub fn new(alpha: f64) -> Self {
        debug_assert!(alpha > 0.0 && alpha <= 1.0, "EWMA alpha must be in (0, 1]");
        Self { alpha, value: 0.0 }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Fold in a new sample.
    pub fn observe(&mut self, sample: f64) {
        self.value = self.alpha * sample + (1.0 - self.alpha) * self.value;
    }

    /// Apply `elapsed / half_life` periods of pure decay (sample = 0), used
    /// to let pressure relax in the absence of new events.
    pub fn decay(&mut self, periods: f64) {
        let retain = (1.0 - self.alpha).powf(periods.max(0.0));
        self.value *= retain;
    }
}

/// EWMA of the child-death rate, normalized to the configured pool size.
///
/// Each child death observes a sample of `1.0 / num_processes`; absence of
/// deaths lets the average decay toward zero. Compared against
/// `max_failure_pressure` to decide whether the supervisor should abort.
#[derive(Debug, Clone)]
pub struct FailurePressure {
    ewma: Ewma,
    num_processes: usize,
}

impl FailurePressure {
    pub fn new(alpha: f64, num_processes: usize) -> Self {
        Self {
            ewma: Ewma::new(alpha),
            num_processes: num_processes.max(1),
        }
    }

    pub fn value(&self) -> f64 {
        self.ewma.value()
    }

    /// Record a single child death (crash, kill, or banner-timeout).
    pub fn observe_death(&mut self) {
        self.ewma.observe(1.0 / self.num_processes as f64);
    }

    /// Record a respawn-rate-limit miss: counts the same as a death, since
    /// a child that can't be replaced in time is degraded capacity either way.
    pub fn observe_respawn_throttled(&mut self) {
        self.ewma.observe(1.0 / self.num_processes as f64);
    }

    /// Let pressure relax for `periods` intervals without a new death.
    pub fn decay(&mut self, periods: f64) {
        self.ewma.decay(periods);
    }

    pub fn exceeds(&self, max_failure_pressure: f64) -> bool {
        self.ewma.value() > max_failure_pressure
    }
}

/// Queue depth normalized to `max_waiting_requests`, sampled on every
/// enqueue and dequeue rather than smoothed, since it needs to reflect the
/// instantaneous queue state for admission control.
#[derive(Debug, Clone, Copy)]
pub struct RequestPressure {
    max_waiting: usize,
    depth: usize,
}

impl RequestPressure {
    pub fn new(max_waiting: usize) -> Self {
        Self {
            max_waiting: max_waiting.max(1),
            depth: 0,
        }
    }

    pub fn value(&self) -> f64 {
        self.depth as f64 / self.max_waiting as f64
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn on_enqueue(&mut self) {
        self.depth += 1;
    }

    pub fn on_dequeue(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn is_full(&self) -> bool {
        self.depth >= self.max_waiting
    }
}

#[cfg(test)]
#[path = "pressure_tests.rs"]
mod tests;
