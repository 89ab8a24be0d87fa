// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tessera_daemon::proto::PingRequest;

use crate::client::Clients;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, OutputFormat};

pub async fn run(mut clients: Clients, echo: String, format: OutputFormat) -> Result<(), ExitError> {
    let reply = clients.data.ping(PingRequest { echo }).await?.into_inner();
    format_or_json(format, &serde_json::json!({ "echo": reply.echo }), || println!("pong: {}", reply.echo))
        .map_err(|e| ExitError::new(1, e.to_string()))
}
