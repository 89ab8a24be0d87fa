// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single cancellation primitive shared by every blocking point in a
//! request's lifetime: the gRPC call, the per-request deadline timer, and
//! admin-initiated drains all fire into the same token.
//!
//! Cancellation is idempotent and composes via "first-to-fire wins": once
//! any source cancels, the token is cancelled for good, and every awaiter
//! observes it.

use tokio_util::sync::CancellationToken;

/// Why a request's [`CancelToken`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller aborted the gRPC stream.
    CallerAbort,
    /// `server.timeout` elapsed without a terminal reply.
    DeadlineExceeded,
    /// An admin operation (shutdown drain, rolling replace) cancelled it.
    AdminDrain,
}

/// A cloneable, composable cancellation handle for a single request.
///
/// Wraps [`tokio_util::sync::CancellationToken`] rather than reinventing
/// cancellation machinery; this type exists to pin down the reason a
/// cancellation fired, which the raw token doesn't track.
#[derive(Debug, Clone)]
pub struct CancelToken {
    token: CancellationToken,
    reason: std::sync::Arc<parking_lot::Mutex<Option<CancelReason>>>,
}

impl CancelToken {
    /// Create a new, not-yet-cancelled token.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            reason: std::sync::Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    /// Derive a child token: cancelling the child never cancels the parent,
    /// but cancelling the parent always cancels every child. Used to scope
    /// a sub-operation (e.g. a single cancel-then-kill grace window) to the
    /// lifetime of the parent request.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            reason: self.reason.clone(),
        }
    }

    /// Cancel the token. The first call wins: later calls with a different
    /// reason are no-ops, matching "first-to-fire wins" semantics.
    pub fn cancel(&self, reason: CancelReason) {
        let mut slot = self.reason.lock();
        if slot.is_none() {
            *slot = Some(reason);
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The reason the token was cancelled, if it has been.
    pub fn reason(&self) -> Option<CancelReason> {
        *self.reason.lock()
    }

    /// Resolves once the token is cancelled by any source.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Race `fut` against cancellation; returns `None` if cancelled first.
    pub async fn race<F, T>(&self, fut: F) -> Option<T>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            biased;
            () = self.token.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "cancel_tests.rs"]
mod tests;
