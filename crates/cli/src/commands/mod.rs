// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tesserad-ctl` command implementations, one module per gRPC surface
//! area (§6). Each function owns exactly one RPC round trip (or, for the
//! broadcast cache ops, one streamed collection of per-child outcomes) and
//! renders it through [`crate::output`].

pub mod admin;
pub mod cache;
pub mod config;
pub mod ping;

use clap::Subcommand;

use crate::client::Clients;
use crate::exit_error::ExitError;
use crate::output::OutputFormat;

#[derive(Subcommand)]
pub enum Command {
    /// Round-trip a Ping through the dispatcher (§6 data plane).
    Ping {
        /// Payload echoed back by the child.
        #[arg(default_value = "ping")]
        echo: String,
    },
    /// Per-child project cache operations (§4.3, §4.5).
    Cache {
        #[command(subcommand)]
        command: cache::CacheCommand,
    },
    /// Active configuration and hot/cold patching (§4.5, §6).
    Config {
        #[command(subcommand)]
        command: config::ConfigCommand,
    },
    /// Registered storage-handler schemes (§4.3).
    Plugins,
    /// Pool health snapshot: active/idle workers, pressure, uptime (§3).
    Stats,
    /// Daemon process environment, as seen by the running children.
    Env,
    /// Flip the gRPC health service's serving status without restarting.
    Serving {
        #[arg(value_enum)]
        state: ServingState,
    },
    /// Rolling child replacement, applying any staged cold config fields.
    Reload,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ServingState {
    Up,
    Down,
}

pub async fn dispatch(command: Command, clients: Clients, format: OutputFormat) -> Result<(), ExitError> {
    match command {
        Command::Ping { echo } => ping::run(clients, echo, format).await,
        Command::Cache { command } => cache::run(clients, command, format).await,
        Command::Config { command } => config::run(clients, command, format).await,
        Command::Plugins => admin::plugins(clients, format).await,
        Command::Stats => admin::stats(clients, format).await,
        Command::Env => admin::env(clients, format).await,
        Command::Serving { state } => admin::set_serving(clients, matches!(state, ServingState::Up), format).await,
        Command::Reload => admin::reload(clients, format).await,
    }
}
