// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tesserad-ctl`: the operator-facing gRPC client for `tesserad` (§6).
//! Thin by design — every subcommand is one admin-plane or data-plane RPC,
//! rendered through [`output`] in text or JSON.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod exit_error;
mod output;

use clap::Parser;
use exit_error::ExitError;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "tesserad-ctl", version, about = "Control plane client for tesserad")]
struct Cli {
    /// Target daemon address, e.g. `http://127.0.0.1:9000`. Falls back to
    /// `TESSERA_ADDR`, then `client::DEFAULT_ADDR`.
    #[arg(long, global = true)]
    addr: Option<String>,

    /// Output format.
    #[arg(long, short = 'o', global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: commands::Command,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.code);
    }
}

async fn run(cli: Cli) -> Result<(), ExitError> {
    let addr = client::resolve_addr(cli.addr);
    let clients = client::connect(&addr).await?;
    commands::dispatch(cli.command, clients, cli.output).await
}
