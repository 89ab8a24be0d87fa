// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C4: fair-queue dispatch over the child pool.
//!
//! One coordinator, N child workers, a bounded FIFO waiting queue. A request
//! that cannot be assigned an idle child immediately either waits (subject to
//! `max_waiting_requests`) or is rejected with `Unavailable`. Once assigned,
//! a request races its own completion against the caller's cancellation and
//! `server.timeout`; a fired deadline or cancellation sends `CancelOp` and
//! gives the child `cancel_timeout` to wind down before escalating to
//! SIGTERM then SIGKILL, at which point the child is retired rather than
//! returned to the idle pool — the supervisor (C7) owns replacing it.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tessera_core::pressure::{Ewma, FailurePressure, RequestPressure};
use tessera_core::{CancelToken, RequestId};
use tessera_wire::RequestKind;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{info, warn};

use crate::child_host::{ChildHandle, ChildState, ReplyFrame};
use crate::error::DispatchError;

struct Waiter {
    reply: oneshot::Sender<usize>,
}

struct Inner {
    children: SyncMutex<Vec<Arc<ChildHandle>>>,
    idle: Mutex<VecDeque<usize>>,
    waiters: Mutex<VecDeque<Waiter>>,
    queue_depth: AtomicUsize,
    max_waiting: usize,
    request_pressure: SyncMutex<RequestPressure>,
    failure_pressure: SyncMutex<FailurePressure>,
    /// Moving average of the busy ratio (§3 Pool stats), sampled on each
    /// Busy/Idle transition rather than on a timer, matching how
    /// `request_pressure`/`failure_pressure` are event-sampled.
    activity: SyncMutex<Ewma>,
    cancel_timeout: Duration,
    /// Indices retired after a kill, reported here for the supervisor to
    /// respawn and re-register via [`Dispatcher::replace_child`].
    dead: mpsc::UnboundedSender<usize>,
}

/// Coordinates request assignment across a fixed-size child pool.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// `children` must all be freshly spawned and `Idle`.
    pub fn new(
        children: Vec<Arc<ChildHandle>>,
        max_waiting: usize,
        failure_pressure_alpha: f64,
        cancel_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<usize>) {
        let num_processes = children.len();
        let idle = (0..children.len()).collect();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            children: SyncMutex::new(children),
            idle: Mutex::new(idle),
            waiters: Mutex::new(VecDeque::new()),
            queue_depth: AtomicUsize::new(0),
            max_waiting,
            request_pressure: SyncMutex::new(RequestPressure::new(max_waiting.max(1))),
            failure_pressure: SyncMutex::new(FailurePressure::new(failure_pressure_alpha, num_processes)),
            activity: SyncMutex::new(Ewma::new(failure_pressure_alpha)),
            cancel_timeout,
            dead: dead_tx,
        });
        (Self { inner }, dead_rx)
    }

    pub fn request_pressure(&self) -> f64 {
        self.inner.request_pressure.lock().value()
    }

    pub fn failure_pressure(&self) -> f64 {
        self.inner.failure_pressure.lock().value()
    }

    pub fn activity(&self) -> f64 {
        self.inner.activity.lock().value()
    }

    pub fn idle_count(&self) -> usize {
        self.inner
            .children
            .lock()
            .iter()
            .filter(|c| c.state() == ChildState::Idle)
            .count()
    }

    pub fn busy_count(&self) -> usize {
        self.inner
            .children
            .lock()
            .iter()
            .filter(|c| c.state() == ChildState::Busy)
            .count()
    }

    pub fn decay_failure_pressure(&self, periods: f64) {
        self.inner.failure_pressure.lock().decay(periods);
    }

    /// A respawn was deferred by the supervisor's rate limit (§4.4): counts
    /// toward `failure_pressure` the same as an outright death, since a
    /// child sitting dead during the throttle window is degraded capacity.
    pub fn observe_respawn_throttled(&self) {
        self.inner.failure_pressure.lock().observe_respawn_throttled();
    }

    pub fn num_children(&self) -> usize {
        self.inner.children.lock().len()
    }

    pub fn live_children(&self) -> usize {
        self.inner
            .children
            .lock()
            .iter()
            .filter(|c| c.state() != ChildState::Dead)
            .count()
    }

    /// Swap in a freshly respawned child at `idx` and make it available.
    pub fn replace_child(&self, idx: usize, handle: Arc<ChildHandle>) {
        self.inner.children.lock()[idx] = handle;
        self.mark_idle(idx);
    }

    pub fn child(&self, idx: usize) -> Arc<ChildHandle> {
        self.inner.children.lock()[idx].clone()
    }

    pub fn children_snapshot(&self) -> Vec<Arc<ChildHandle>> {
        self.inner.children.lock().clone()
    }

    /// Dispatch one request. Returns a stream of [`ReplyFrame`]s ending with
    /// `End`; the child is returned to the idle pool (or retired, on a
    /// timeout/cancel kill) once the terminal frame is observed.
    pub async fn dispatch(
        &self,
        kind: RequestKind,
        headers: BTreeMap<String, String>,
        body_chunks: Vec<Vec<u8>>,
        timeout: Duration,
        cancel: CancelToken,
    ) -> Result<mpsc::UnboundedReceiver<ReplyFrame>, DispatchError> {
        // An idle child is claimed immediately and never counts against
        // `max_waiting`; only a request that actually has to wait occupies a
        // slot in the waiting bound.
        let idx = match self.try_acquire_idle().await {
            Some(idx) => idx,
            None => self.wait_for_child(timeout, &cancel).await?,
        };

        let handle = self.inner.children.lock()[idx].clone();
        handle.set_state(ChildState::Busy);
        self.inner.activity.lock().observe(1.0);
        let id = RequestId::new();
        let inner_rx = match handle.send(id, kind, headers, body_chunks).await {
            Ok(rx) => rx,
            Err(e) => {
                warn!(child_id = idx, error = %e, "send to newly acquired idle child failed, retiring it");
                self.retire(idx);
                return Err(DispatchError::ChildDied);
            }
        };

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        tokio::spawn(serve(self.clone(), idx, id, handle, inner_rx, out_tx, timeout, cancel));
        Ok(out_rx)
    }

    /// Non-blocking: pop an idle child if one is free right now.
    async fn try_acquire_idle(&self) -> Option<usize> {
        self.inner.idle.lock().await.pop_front()
    }

    /// No idle child was available. Joins the FIFO waiting queue, subject to
    /// `max_waiting`, and races the wait against the caller's cancellation
    /// and `timeout`.
    async fn wait_for_child(&self, timeout: Duration, cancel: &CancelToken) -> Result<usize, DispatchError> {
        if self.inner.queue_depth.load(Ordering::SeqCst) >= self.inner.max_waiting {
            return Err(DispatchError::Unavailable);
        }
        self.inner.queue_depth.fetch_add(1, Ordering::SeqCst);
        self.inner.request_pressure.lock().on_enqueue();

        let (tx, rx) = oneshot::channel();
        self.inner.waiters.lock().await.push_back(Waiter { reply: tx });

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(DispatchError::Cancelled),
            () = tokio::time::sleep(timeout) => Err(DispatchError::DeadlineExceeded),
            // The sender side is only ever dropped after successfully
            // sending (see mark_idle), so a closed channel here would be a
            // bug, not a runtime condition; 0 is an arbitrary but harmless
            // fallback index.
            idx = rx => Ok(idx.unwrap_or(0)),
        };
        self.inner.queue_depth.fetch_sub(1, Ordering::SeqCst);
        self.inner.request_pressure.lock().on_dequeue();
        result
    }

    /// Hand `idx` to the oldest waiter if any, else return it to the idle
    /// pool. FIFO fairness: a waiter that arrived first is served first,
    /// even if a different child frees up later.
    fn mark_idle(&self, idx: usize) {
        self.inner.children.lock()[idx].set_state(ChildState::Idle);
        self.inner.activity.lock().observe(0.0);
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let mut waiters = inner.waiters.lock().await;
            while let Some(waiter) = waiters.pop_front() {
                if waiter.reply.send(idx).is_ok() {
                    return;
                }
            }
            drop(waiters);
            inner.idle.lock().await.push_back(idx);
        });
    }

    fn retire(&self, idx: usize) {
        self.inner.failure_pressure.lock().observe_death();
        let _ = self.inner.dead.send(idx);
    }
}

async fn serve(
    dispatcher: Dispatcher,
    idx: usize,
    id: RequestId,
    handle: Arc<ChildHandle>,
    mut inner_rx: mpsc::UnboundedReceiver<ReplyFrame>,
    out_tx: mpsc::UnboundedSender<ReplyFrame>,
    timeout: Duration,
    cancel: CancelToken,
) {
    let cancel_timeout = dispatcher.inner.cancel_timeout;
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                kill_and_retire(&dispatcher, idx, id, &handle, &mut inner_rx, &out_tx, cancel_timeout, KillReason::Cancelled).await;
                return;
            }
            () = &mut deadline => {
                kill_and_retire(&dispatcher, idx, id, &handle, &mut inner_rx, &out_tx, cancel_timeout, KillReason::Timeout).await;
                return;
            }
            frame = inner_rx.recv() => {
                match frame {
                    Some(frame) => {
                        let terminal = matches!(frame, ReplyFrame::End { .. });
                        let _ = out_tx.send(frame);
                        if terminal {
                            dispatcher.mark_idle(idx);
                            return;
                        }
                    }
                    None => {
                        warn!(child_id = idx, request = %id, "child stream ended without ReplyEnd");
                        dispatcher.retire(idx);
                        return;
                    }
                }
            }
        }
    }
}

/// Why [`serve`] is winding a request down early, carried through to the
/// terminal [`ReplyFrame`] so the gRPC layer can pick the right status (§7).
#[derive(Clone, Copy)]
enum KillReason {
    Timeout,
    Cancelled,
}

impl KillReason {
    fn message(self) -> &'static str {
        match self {
            KillReason::Timeout => "request exceeded server.timeout",
            KillReason::Cancelled => "request was cancelled",
        }
    }

    fn timed_out(self) -> bool {
        matches!(self, KillReason::Timeout)
    }
}

/// Sends `CancelOp` and gives the child `cancel_timeout` to wind down
/// cooperatively; escalates to SIGTERM then SIGKILL if it doesn't. Either
/// way, the caller always sees exactly one terminal `ReplyFrame::End` —
/// the whole point of this function is that `out_tx` never gets dropped
/// silently on a kill path.
async fn kill_and_retire(
    dispatcher: &Dispatcher,
    idx: usize,
    id: RequestId,
    handle: &Arc<ChildHandle>,
    inner_rx: &mut mpsc::UnboundedReceiver<ReplyFrame>,
    out_tx: &mpsc::UnboundedSender<ReplyFrame>,
    cancel_timeout: Duration,
    reason: KillReason,
) {
    let _ = handle.cancel(id).await;
    let timed_out = reason.timed_out();
    match tokio::time::timeout(cancel_timeout, inner_rx.recv()).await {
        Ok(Some(ReplyFrame::End { error, .. })) => {
            let error = error.or_else(|| Some(reason.message().to_string()));
            let _ = out_tx.send(ReplyFrame::End { ok: false, error, timed_out });
            dispatcher.mark_idle(idx);
        }
        _ => {
            info!(child_id = idx, request = %id, "child did not wind down in time, escalating to kill");
            let _ = handle.terminate();
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = handle.kill();
            handle.join().await;
            handle.set_state(ChildState::Dead);
            let _ = out_tx.send(ReplyFrame::End { ok: false, error: Some(reason.message().to_string()), timed_out });
            dispatcher.retire(idx);
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
