// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomies for the two daemon-internal boundaries (child host,
//! dispatcher) plus the process-exit-code contract (§6).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChildHostError {
    #[error("child is busy with another request")]
    Busy,
    #[error("spawning child process: {0}")]
    SpawnFailed(#[source] std::io::Error),
    #[error("child did not send its banner within the startup timeout")]
    BannerTimeout,
    #[error("ping did not complete within its deadline")]
    PingFailed,
    #[error("sending signal to child: {0}")]
    Signal(#[source] nix::errno::Errno),
    #[error("cache operation failed in child: {0}")]
    CacheOpFailed(String),
    #[error(transparent)]
    Framing(#[from] tessera_wire::FramingError),
}

/// Errors the dispatcher surfaces to a gRPC handler, mapped 1:1 onto the
/// §7 taxonomy.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no idle child and the waiting queue is full")]
    Unavailable,
    #[error("request exceeded server.timeout")]
    DeadlineExceeded,
    #[error("request was cancelled")]
    Cancelled,
    #[error("child died while the request was in flight")]
    ChildDied,
    #[error(transparent)]
    Framing(#[from] tessera_wire::FramingError),
}

impl DispatchError {
    pub fn into_status(self) -> tonic::Status {
        match self {
            DispatchError::Unavailable => tonic::Status::resource_exhausted(self.to_string()),
            DispatchError::DeadlineExceeded => tonic::Status::deadline_exceeded(self.to_string()),
            DispatchError::Cancelled => tonic::Status::cancelled(self.to_string()),
            DispatchError::ChildDied | DispatchError::Framing(_) => {
                tonic::Status::internal("internal error")
            }
        }
    }
}

/// The exit-code contract (§6): every fatal path in `main` constructs one of
/// these and maps it to a process exit code in exactly one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Normal,
    ConfigInvalid,
    FailurePressureAbort,
    FatalSpawnError,
}

impl ExitOutcome {
    pub fn code(self) -> i32 {
        match self {
            ExitOutcome::Normal => 0,
            ExitOutcome::ConfigInvalid => 2,
            ExitOutcome::FailurePressureAbort => 3,
            ExitOutcome::FatalSpawnError => 4,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
