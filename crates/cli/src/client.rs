// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connects to a running `tesserad` over gRPC. One [`tonic::transport::
//! Channel`] is shared by both service stubs since the data and admin
//! planes are served on the same listener (see `tesserad`'s `main.rs`).

use tessera_daemon::proto::admin_plane_client::AdminPlaneClient;
use tessera_daemon::proto::data_plane_client::DataPlaneClient;
use tonic::transport::Channel;

use crate::exit_error::ExitError;

/// Matches [`tessera_core::config::ServerConfig`]'s own default.
pub const DEFAULT_ADDR: &str = "http://127.0.0.1:9000";

/// Env var overriding the target, checked when `--addr` is not passed.
pub const ADDR_ENV: &str = "TESSERA_ADDR";

pub fn resolve_addr(addr: Option<String>) -> String {
    addr.or_else(|| std::env::var(ADDR_ENV).ok()).unwrap_or_else(|| DEFAULT_ADDR.to_string())
}

pub struct Clients {
    pub data: DataPlaneClient<Channel>,
    pub admin: AdminPlaneClient<Channel>,
}

pub async fn connect(addr: &str) -> Result<Clients, ExitError> {
    let channel = Channel::from_shared(addr.to_string())
        .map_err(|e| ExitError::new(1, format!("invalid address {addr}: {e}")))?
        .connect()
        .await?;
    Ok(Clients { data: DataPlaneClient::new(channel.clone()), admin: AdminPlaneClient::new(channel) })
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
