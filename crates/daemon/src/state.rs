// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared daemon state: the one `Arc` every gRPC handler, the admin plane,
//! and the supervisor's background tasks all hold a clone of.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use tessera_core::{CancelToken, Config};
use tonic_health::server::HealthReporter;

use crate::dispatcher::Dispatcher;

pub struct DaemonState {
    pub dispatcher: Dispatcher,
    pub config: RwLock<Config>,
    pub health: HealthReporter,
    pub child_binary: PathBuf,
    /// Cancelled to unwind every in-flight request during shutdown, and
    /// derived via `.child()` for each new request's own cancellation scope.
    pub global_cancel: CancelToken,
    shutting_down: AtomicBool,
    started_at: Instant,
}

impl DaemonState {
    pub fn new(dispatcher: Dispatcher, config: Config, health: HealthReporter, child_binary: PathBuf) -> Self {
        Self {
            dispatcher,
            config: RwLock::new(config),
            health,
            child_binary,
            global_cancel: CancelToken::new(),
            shutting_down: AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Whether the daemon is draining for shutdown; gRPC handlers consult
    /// this before accepting a new dispatch (§4.7).
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// The per-child `EngineConfig` serialized as the `tesserad` passes
    /// it to each child over `TESSERA_CHILD_CONFIG` (same shape the child
    /// binary's `Bootstrap` expects).
    pub fn child_config_json(&self) -> serde_json::Result<String> {
        #[derive(serde::Serialize)]
        struct Bootstrap<'a> {
            engine: &'a tessera_core::config::EngineConfig,
        }
        serde_json::to_string(&Bootstrap {
            engine: &self.config.read().engine,
        })
    }
}
