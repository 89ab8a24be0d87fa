// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C7: process supervision — initial fleet spawn, the restore-list replay,
//! self-healing respawns, `Reload`'s rolling child replacement, and the
//! graceful-shutdown sequence (§3 Lifecycles, §4.6, §4.7, §4.8).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex as SyncMutex;
use tessera_core::CancelReason;
use tokio::sync::{mpsc, oneshot};
use tonic_health::server::HealthReporter;
use tracing::{error, info, warn};

use crate::child_host::{self, ChildHandle};
use crate::error::ExitOutcome;
use crate::restore;
use crate::state::DaemonState;

/// Spawn `count` children in parallel and wait for every banner.
///
/// A failure aborts the whole fleet: a daemon that can't bring up its full
/// pool at startup has nothing useful to serve (§4.4 fatal spawn error).
pub async fn spawn_initial_fleet(
    count: usize,
    child_binary: &Path,
    child_config_json: &str,
    start_timeout: Duration,
) -> Result<Vec<Arc<ChildHandle>>, ExitOutcome> {
    let mut set = tokio::task::JoinSet::new();
    for id in 0..count {
        let child_binary = child_binary.to_path_buf();
        let child_config_json = child_config_json.to_string();
        set.spawn(async move {
            let handle = child_host::spawn(id, &child_binary, &child_config_json, start_timeout).await;
            (id, handle)
        });
    }

    let mut slots: Vec<Option<Arc<ChildHandle>>> = (0..count).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((id, Ok(handle))) => slots[id] = Some(Arc::new(handle)),
            Ok((id, Err(e))) => {
                error!(child_id = id, error = %e, "failed to spawn child during startup");
                return Err(ExitOutcome::FatalSpawnError);
            }
            Err(e) => {
                error!(error = %e, "child spawn task panicked");
                return Err(ExitOutcome::FatalSpawnError);
            }
        }
    }

    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or(ExitOutcome::FatalSpawnError)
}

/// Replay the resolved restore list into one child: `Checkout(pull=true,
/// pin=true)` for every URI, tolerant of individual failures (§4.8).
pub async fn replay_restore_list(handle: &ChildHandle, uris: &[String]) {
    for uri in uris {
        let op = tessera_wire::CacheOp::Checkout { uri: uri.clone(), pull: true };
        if let Err(e) = handle.cache_op(op, true).await {
            warn!(child_id = handle.id, uri, error = %e, "restore-list checkout failed");
        }
    }
}

/// Replay the restore list into every child of a freshly spawned fleet.
pub async fn replay_restore_list_all(children: &[Arc<ChildHandle>], uris: &[String]) {
    let mut set = tokio::task::JoinSet::new();
    for handle in children {
        let handle = handle.clone();
        let uris = uris.to_vec();
        set.spawn(async move { replay_restore_list(&handle, &uris).await });
    }
    while set.join_next().await.is_some() {}
}

/// A handle the admin plane and `main` use to trigger `Reload`'s rolling
/// child replacement without owning the supervisor's background tasks.
#[derive(Clone)]
pub struct ReloadHandle {
    tx: mpsc::Sender<oneshot::Sender<usize>>,
}

impl ReloadHandle {
    pub(crate) fn new(tx: mpsc::Sender<oneshot::Sender<usize>>) -> Self {
        Self { tx }
    }

    /// Request a rolling replacement of every child with the config's
    /// current `child_config_json`; returns the number of children
    /// actually replaced.
    pub async fn request_reload(&self) -> usize {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(reply_tx).await.is_err() {
            warn!("reload request dropped: supervisor task is gone");
            return 0;
        }
        reply_rx.await.unwrap_or(0)
    }
}

/// Owns the child fleet's background lifecycle for the life of the daemon:
/// the self-healing task and the reload task.
pub struct Supervisor {
    self_heal: tokio::task::JoinHandle<()>,
    reload_task: tokio::task::JoinHandle<()>,
}

impl Supervisor {
    /// Start the background self-healing and reload tasks against an
    /// already-built [`DaemonState`] (whose dispatcher already owns the
    /// initial fleet spawned via [`spawn_initial_fleet`]).
    pub fn start(state: Arc<DaemonState>, dead_rx: mpsc::UnboundedReceiver<usize>) -> (Self, ReloadHandle) {
        let self_heal = tokio::spawn(self_heal_loop(state.clone(), dead_rx));

        let (reload_tx, reload_rx) = mpsc::channel(1);
        let reload_task = tokio::spawn(reload_loop(state, reload_rx));

        (Self { self_heal, reload_task }, ReloadHandle::new(reload_tx))
    }

    /// Stop the background self-heal and reload tasks. The caller (the
    /// gRPC server's own graceful shutdown) is responsible for flipping
    /// `DaemonState::begin_shutdown` and draining in-flight requests before
    /// tearing down the child processes.
    pub fn shutdown(&self) {
        self.self_heal.abort();
        self.reload_task.abort();
    }
}

/// Consume dispatcher-reported deaths, respawn with the current config,
/// decay `failure_pressure` on a fixed tick, and fatally abort once it
/// exceeds `worker.max_failure_pressure` (§4.6 self-healing, §4.4 fatal
/// thresholds). Also keeps the health service's serving status in step
/// with `server.max_failure_pressure` (§4.6).
async fn self_heal_loop(state: Arc<DaemonState>, mut dead_rx: mpsc::UnboundedReceiver<usize>) {
    let mut decay_ticker = tokio::time::interval(Duration::from_secs(1));
    let last_respawn: Arc<SyncMutex<HashMap<usize, Instant>>> = Arc::new(SyncMutex::new(HashMap::new()));
    loop {
        tokio::select! {
            () = state.global_cancel.cancelled() => return,
            _ = decay_ticker.tick() => {
                state.dispatcher.decay_failure_pressure(1.0);
                update_health(&state).await;
            }
            dead = dead_rx.recv() => {
                let Some(idx) = dead else { return };
                if state.is_shutting_down() {
                    continue;
                }
                let worker_threshold = state.config.read().worker.max_failure_pressure;
                if state.dispatcher.failure_pressure() > worker_threshold {
                    error!(
                        failure_pressure = state.dispatcher.failure_pressure(),
                        "failure pressure exceeded worker.max_failure_pressure, aborting"
                    );
                    state.global_cancel.cancel(CancelReason::AdminDrain);
                    std::process::exit(ExitOutcome::FailurePressureAbort.code());
                }
                let min_interval = state.config.read().worker.respawn_min_interval();
                let state = state.clone();
                let last_respawn = last_respawn.clone();
                tokio::spawn(async move {
                    respawn_rate_limited(&state, idx, &last_respawn, min_interval).await;
                    update_health(&state).await;
                });
            }
        }
    }
}

/// Enforce `worker.respawn_min_interval_secs` between respawns of the same
/// child index (§4.4): a child thrashing faster than this window is
/// degraded capacity either way, so a throttled respawn counts toward
/// `failure_pressure` for the wait instead of spawning back-to-back.
async fn respawn_rate_limited(
    state: &Arc<DaemonState>,
    idx: usize,
    last_respawn: &Arc<SyncMutex<HashMap<usize, Instant>>>,
    min_interval: Duration,
) {
    let wait = {
        let mut last = last_respawn.lock();
        let now = Instant::now();
        match last.get(&idx) {
            Some(prev) if now.duration_since(*prev) < min_interval => Some(min_interval - now.duration_since(*prev)),
            _ => {
                last.insert(idx, now);
                None
            }
        }
    };
    if let Some(wait) = wait {
        warn!(child_id = idx, wait_ms = wait.as_millis() as u64, "respawn rate-limited, deferring");
        state.dispatcher.observe_respawn_throttled();
        tokio::time::sleep(wait).await;
        last_respawn.lock().insert(idx, Instant::now());
    }
    respawn_one(state, idx).await;
}

async fn respawn_one(state: &Arc<DaemonState>, idx: usize) {
    info!(child_id = idx, "respawning dead child");
    let worker = state.config.read().worker.clone();
    let child_config_json = match state.child_config_json() {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "failed to serialize child config for respawn");
            return;
        }
    };
    match child_host::spawn(idx, &state.child_binary, &child_config_json, worker.process_start_timeout()).await {
        Ok(handle) => {
            let handle = Arc::new(handle);
            let uris = restore::resolve(&worker).unwrap_or_default();
            replay_restore_list(&handle, &uris).await;
            state.dispatcher.replace_child(idx, handle);
        }
        Err(e) => {
            warn!(child_id = idx, error = %e, "respawn failed, will retry on next death report");
        }
    }
}

/// `server.max_failure_pressure` gates the health service: exceeding it
/// flips `DataPlane` to `NotServing` so a load balancer stops routing to
/// this daemon, independent of `worker.max_failure_pressure`'s fatal abort.
async fn update_health(state: &Arc<DaemonState>) {
    use tonic_health::ServingStatus;
    let server_threshold = state.config.read().server.max_failure_pressure;
    let status = if state.dispatcher.failure_pressure() > server_threshold {
        ServingStatus::NotServing
    } else {
        ServingStatus::Serving
    };
    let mut health = state.health.clone();
    health.set_service_status("tessera.DataPlane", status).await;
}

/// Serve `Reload` requests one at a time: roll every child over to a fresh
/// process running the current `child_config_json`, one index at a time so
/// the pool never drops below `num_children - 1` capacity.
async fn reload_loop(state: Arc<DaemonState>, mut reload_rx: mpsc::Receiver<oneshot::Sender<usize>>) {
    while let Some(reply) = reload_rx.recv().await {
        let replaced = do_reload(&state).await;
        let _ = reply.send(replaced);
    }
}

async fn do_reload(state: &Arc<DaemonState>) -> usize {
    let worker = state.config.read().worker.clone();
    let child_config_json = match state.child_config_json() {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "reload: failed to serialize child config");
            return 0;
        }
    };
    let uris = restore::resolve(&worker).unwrap_or_default();

    let count = state.dispatcher.num_children();
    let mut replaced = 0;
    for idx in 0..count {
        let old = state.dispatcher.child(idx);
        match child_host::spawn(idx, &state.child_binary, &child_config_json, worker.process_start_timeout()).await {
            Ok(new_handle) => {
                let new_handle = Arc::new(new_handle);
                replay_restore_list(&new_handle, &uris).await;
                state.dispatcher.replace_child(idx, new_handle);
                let _ = old.terminate();
                old.join().await;
                replaced += 1;
            }
            Err(e) => {
                warn!(child_id = idx, error = %e, "reload: failed to spawn replacement, leaving old child in place");
            }
        }
    }
    replaced
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
