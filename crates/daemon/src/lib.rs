// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tessera daemon library: everything `tesserad`'s `main.rs` assembles into
//! a running process, plus the gRPC client types `tesserad-ctl` links
//! against.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod admin;
pub mod child_host;
pub mod dispatcher;
pub mod error;
pub mod grpc;
pub mod proto;
pub mod restore;
pub mod state;
pub mod supervisor;

pub use admin::AdminPlane;
pub use child_host::{ChildHandle, ChildState};
pub use dispatcher::Dispatcher;
pub use error::{ChildHostError, DispatchError, ExitOutcome};
pub use grpc::{AdminPlaneService, DataPlaneService};
pub use state::DaemonState;
pub use supervisor::{ReloadHandle, Supervisor};
