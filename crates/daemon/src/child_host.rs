// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C2: owns one child process end to end — spawn, banner handshake,
//! request/cache-op/ping over the framed pipe, cancel-then-kill, and
//! EOF-based liveness.
//!
//! The pipe is an anonymous `UnixStream::pair()`, not the child's real
//! stdin/stdout in the usual sense: one end is wired to both the child's
//! stdin and stdout (duplicated via the safe `OwnedFd::try_clone`, never
//! `FromRawFd`) so the child can read and write the same socket. The parent
//! keeps the other end as a genuine `std::os::unix::net::UnixStream` it
//! already owns, which `tokio::net::UnixStream::from_std` adopts without any
//! `unsafe` reconstruction from a raw fd.

use std::collections::BTreeMap;
use std::os::fd::OwnedFd;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex as SyncMutex;
use tessera_core::RequestId;
use tessera_wire::{read_message, write_message, Frame, FramingError, RequestKind};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::error::ChildHostError;

/// Dispatcher-visible lifecycle state of one child (§3, §4.4 diagram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
    Starting,
    Idle,
    Busy,
    Draining,
    Dead,
}

/// One frame of a request's reply, as handed to the dispatcher's caller.
///
/// `timed_out` distinguishes a terminal frame the dispatcher produced
/// because `server.timeout` fired from any other `ok: false` outcome (a
/// child-reported failure, or a cooperative cancellation), so the gRPC
/// layer can map it to `DEADLINE_EXCEEDED` rather than `Internal` (§7).
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyFrame {
    Headers { status: u16, headers: BTreeMap<String, String> },
    Chunk(Vec<u8>),
    End { ok: bool, error: Option<String>, timed_out: bool },
}

/// A live child process plus the plumbing to talk to it.
pub struct ChildHandle {
    pub id: usize,
    pid: u32,
    state: Arc<SyncMutex<ChildState>>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    /// The reply channel for whatever request/ping is currently in flight;
    /// `None` means the child is free to accept one. The reader task clears
    /// this itself once it forwards a terminal `ReplyEnd`.
    current: Arc<Mutex<Option<mpsc::UnboundedSender<ReplyFrame>>>>,
    process: Mutex<Child>,
    reader_task: tokio::task::JoinHandle<()>,
}

/// Spawn one child, wire its pipe, and wait for its startup banner.
///
/// `child_config_json` is the `EngineConfig` JSON passed via
/// `TESSERA_CHILD_CONFIG`, identical for every child in the pool.
pub async fn spawn(
    id: usize,
    child_binary: &std::path::Path,
    child_config_json: &str,
    start_timeout: Duration,
) -> Result<ChildHandle, ChildHostError> {
    let (parent_sock, child_sock) =
        std::os::unix::net::UnixStream::pair().map_err(ChildHostError::SpawnFailed)?;
    parent_sock.set_nonblocking(true).map_err(ChildHostError::SpawnFailed)?;

    let stdin_fd: OwnedFd = child_sock.into();
    let stdout_fd = stdin_fd.try_clone().map_err(ChildHostError::SpawnFailed)?;

    let mut command = Command::new(child_binary);
    command
        .stdin(Stdio::from(stdin_fd))
        .stdout(Stdio::from(stdout_fd))
        .stderr(Stdio::inherit())
        .env("TESSERA_CHILD_CONFIG", child_config_json)
        .kill_on_drop(true);

    let mut process = command.spawn().map_err(ChildHostError::SpawnFailed)?;
    let pid = process.id().unwrap_or(0);

    let stream =
        tokio::net::UnixStream::from_std(parent_sock).map_err(ChildHostError::SpawnFailed)?;
    let (mut read_half, write_half) = stream.into_split();

    let banner = tokio::time::timeout(start_timeout, read_message(&mut read_half)).await;
    let engine_version = match banner {
        Ok(Ok(Frame::Banner { engine_version, .. })) => engine_version,
        Ok(Ok(_other)) => return Err(ChildHostError::BannerTimeout),
        Ok(Err(_)) => return Err(ChildHostError::BannerTimeout),
        Err(_elapsed) => {
            let _ = process.start_kill();
            return Err(ChildHostError::BannerTimeout);
        }
    };
    info!(child_id = id, pid, engine_version, "child banner received");

    let state = Arc::new(SyncMutex::new(ChildState::Idle));
    let current: Arc<Mutex<Option<mpsc::UnboundedSender<ReplyFrame>>>> = Arc::new(Mutex::new(None));
    let reader_task = tokio::spawn(reader_loop(id, read_half, current.clone(), state.clone()));

    Ok(ChildHandle {
        id,
        pid,
        state,
        writer: Arc::new(Mutex::new(write_half)),
        current,
        process: Mutex::new(process),
        reader_task,
    })
}

async fn reader_loop(
    id: usize,
    mut read_half: OwnedReadHalf,
    current: Arc<Mutex<Option<mpsc::UnboundedSender<ReplyFrame>>>>,
    state: Arc<SyncMutex<ChildState>>,
) {
    loop {
        match read_message(&mut read_half).await {
            Ok(Frame::ReplyHeaders { status, headers, .. }) => {
                send_reply(&current, ReplyFrame::Headers { status, headers }).await;
            }
            Ok(Frame::ReplyChunk { bytes, .. }) => {
                send_reply(&current, ReplyFrame::Chunk(bytes)).await;
            }
            Ok(Frame::ReplyEnd { ok, error, .. }) => {
                send_reply(&current, ReplyFrame::End { ok, error, timed_out: false }).await;
                *current.lock().await = None;
            }
            Ok(Frame::Event { severity, text }) => {
                debug!(child_id = id, ?severity, text, "child event");
            }
            Ok(Frame::Banner { .. } | Frame::Request { .. } | Frame::CacheOp { .. } | Frame::Ping { .. } | Frame::CancelOp { .. }) => {
                warn!(child_id = id, "received a child-only frame from the daemon's own pipe, ignoring");
            }
            Err(FramingError::Truncated) => {
                info!(child_id = id, "child closed its pipe, marking dead");
                *state.lock() = ChildState::Dead;
                return;
            }
            Err(e) => {
                warn!(child_id = id, error = %e, "framing error reading from child, marking dead");
                *state.lock() = ChildState::Dead;
                return;
            }
        }
    }
}

async fn send_reply(current: &Arc<Mutex<Option<mpsc::UnboundedSender<ReplyFrame>>>>, frame: ReplyFrame) {
    if let Some(tx) = current.lock().await.as_ref() {
        let _ = tx.send(frame);
    }
}

impl ChildHandle {
    pub fn state(&self) -> ChildState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: ChildState) {
        *self.state.lock() = state;
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// `send(Request) → Stream<ReplyFrame>` (§4.2): fails with `Busy` if a
    /// previous request has not finished.
    pub async fn send(
        &self,
        id: RequestId,
        kind: RequestKind,
        headers: BTreeMap<String, String>,
        body_chunks: Vec<Vec<u8>>,
    ) -> Result<mpsc::UnboundedReceiver<ReplyFrame>, ChildHostError> {
        let rx = self.reserve().await?;
        let frame = Frame::Request { id, kind, headers, body_chunks };
        if let Err(e) = self.write(&frame).await {
            *self.current.lock().await = None;
            return Err(e.into());
        }
        Ok(rx)
    }

    /// Send a [`tessera_wire::CacheOp`] and collect its reply chunks plus
    /// terminal outcome. Shares the same single-in-flight slot as `send`, so
    /// the admin plane can only have one outstanding cache op per child at a
    /// time — acceptable since broadcast ops already fan out one task per
    /// child rather than pipelining several ops onto the same one.
    pub async fn cache_op(
        &self,
        op: tessera_wire::CacheOp,
        pin: bool,
    ) -> Result<Vec<Vec<u8>>, ChildHostError> {
        let id = RequestId::new();
        let mut rx = self.reserve().await?;
        let frame = Frame::CacheOp { id, op, pin };
        if let Err(e) = self.write(&frame).await {
            *self.current.lock().await = None;
            return Err(e.into());
        }

        let mut chunks = Vec::new();
        loop {
            match rx.recv().await {
                Some(ReplyFrame::Chunk(bytes)) => chunks.push(bytes),
                Some(ReplyFrame::Headers { .. }) => {}
                Some(ReplyFrame::End { ok: true, .. }) => return Ok(chunks),
                Some(ReplyFrame::End { ok: false, error, .. }) => {
                    return Err(ChildHostError::CacheOpFailed(error.unwrap_or_default()))
                }
                None => return Err(ChildHostError::CacheOpFailed("child stream ended".to_string())),
            }
        }
    }

    /// `ping(deadline)` (§4.2): liveness probe sharing the same single-
    /// in-flight slot as a real request.
    pub async fn ping(&self, deadline: Duration) -> Result<(), ChildHostError> {
        let id = RequestId::new();
        let mut rx = self.reserve().await?;
        if let Err(e) = self.write(&Frame::Ping { id }).await {
            *self.current.lock().await = None;
            return Err(e.into());
        }
        match tokio::time::timeout(deadline, rx.recv()).await {
            Ok(Some(ReplyFrame::End { ok: true, .. })) => Ok(()),
            _ => {
                // No terminal frame arrived in time; the slot would
                // otherwise stay occupied forever since nothing else clears
                // it on a ping failure.
                *self.current.lock().await = None;
                Err(ChildHostError::PingFailed)
            }
        }
    }

    /// `cancel(id, grace)` (§4.2): writes a `CancelOp`; the caller (the
    /// dispatcher, which already holds the reply receiver) is responsible
    /// for waiting `grace` and escalating to `terminate`/`kill` if no
    /// `ReplyEnd` arrives in time.
    pub async fn cancel(&self, id: RequestId) -> Result<(), ChildHostError> {
        self.write(&Frame::CancelOp { id }).await.map_err(Into::into)
    }

    /// Send SIGTERM.
    pub fn terminate(&self) -> Result<(), ChildHostError> {
        signal::kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM).map_err(ChildHostError::Signal)
    }

    /// Send SIGKILL.
    pub fn kill(&self) -> Result<(), ChildHostError> {
        signal::kill(Pid::from_raw(self.pid as i32), Signal::SIGKILL).map_err(ChildHostError::Signal)
    }

    /// Wait for the process to actually exit (after `terminate`/`kill`).
    pub async fn join(&self) {
        self.reader_task.abort();
        let _ = self.process.lock().await.wait().await;
    }

    async fn reserve(&self) -> Result<mpsc::UnboundedReceiver<ReplyFrame>, ChildHostError> {
        let mut slot = self.current.lock().await;
        if slot.is_some() {
            return Err(ChildHostError::Busy);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *slot = Some(tx);
        Ok(rx)
    }

    async fn write(&self, frame: &Frame) -> Result<(), FramingError> {
        let mut w = self.writer.lock().await;
        write_message(&mut *w, frame).await
    }
}

#[cfg(test)]
impl ChildHandle {
    /// Build a `ChildHandle` around an already-connected pair (as returned
    /// by `tokio::net::UnixStream::pair()`) instead of a real spawned
    /// process, so the dispatcher's tests can drive a fake child without
    /// forking a binary.
    pub(crate) fn for_test(id: usize, stream: tokio::net::UnixStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        let state = Arc::new(SyncMutex::new(ChildState::Idle));
        let current: Arc<Mutex<Option<mpsc::UnboundedSender<ReplyFrame>>>> = Arc::new(Mutex::new(None));
        let reader_task = tokio::spawn(reader_loop(id, read_half, current.clone(), state.clone()));
        // A real (harmless) process backs `terminate`/`kill`/`join` so tests
        // that exercise the kill escalation path have a live pid to signal
        // instead of an arbitrary, possibly-reused one.
        let mut process = Command::new("sleep")
            .arg("300")
            .spawn()
            .expect("spawning a throwaway `sleep` process for a test double");
        let pid = process.id().unwrap_or(0);
        Self {
            id,
            pid,
            state,
            writer: Arc::new(Mutex::new(write_half)),
            current,
            process: Mutex::new(process),
            reader_task,
        }
    }
}

#[cfg(test)]
#[path = "child_host_tests.rs"]
mod tests;
