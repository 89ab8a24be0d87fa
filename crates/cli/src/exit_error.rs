// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Custom error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! directly, allowing `main()` to handle process termination.

use std::fmt;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// A `tonic::Status` from a failed RPC, exit code 1.
    pub fn from_status(status: tonic::Status) -> Self {
        Self::new(1, format!("{} ({:?})", status.message(), status.code()))
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

impl From<tonic::Status> for ExitError {
    fn from(status: tonic::Status) -> Self {
        Self::from_status(status)
    }
}

impl From<tonic::transport::Error> for ExitError {
    fn from(err: tonic::transport::Error) -> Self {
        Self::new(1, format!("connecting to tesserad: {err}"))
    }
}
