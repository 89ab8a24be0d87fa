// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Small helpers shared by this crate's own tests and by downstream crates
//! that enable the `test-support` feature for their integration tests.

use crate::config::Config;

/// A [`Config`] with small timeouts and a single process, suitable as a
/// starting point for tests that only care about overriding a couple of
/// fields.
pub fn fast_test_config() -> Config {
    let mut config = Config::default();
    config.server.timeout_secs = 2;
    config.server.shutdown_grace_period_secs = 1;
    config.worker.num_processes = 1;
    config.worker.process_start_timeout_secs = 2;
    config.worker.cancel_timeout_secs = 1;
    config.worker.max_waiting_requests = 4;
    config
}
