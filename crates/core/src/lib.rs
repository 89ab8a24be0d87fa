// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tessera-core: shared identifiers, clock, config schema, and pressure math
//! used across the daemon, child, and cache crates.

pub mod cancel;
pub mod clock;
pub mod config;
pub mod id;
pub mod pressure;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use cancel::{CancelReason, CancelToken};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    Config, ConfigError, ConfigField, ConfigPatch, EngineConfig, HandlerConfig, SearchPathEntry,
    ServerConfig, WorkerConfig,
};
pub use id::{short, IdGen, UuidIdGen};
pub use pressure::{Ewma, FailurePressure, RequestPressure};

crate::define_id! {
    /// Identifies a single request within the pool (unique while in flight).
    pub struct RequestId("req-");
}
