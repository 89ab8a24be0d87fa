// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tessera-child`: one rendering-engine worker process.
//!
//! Spawned by `tesserad` with an anonymous socket pair wired to its
//! stdin/stdout (§4.2). Reads its engine configuration from
//! `TESSERA_CHILD_CONFIG`, sends a `Banner`, then serves framed requests
//! until the daemon closes the pipe.

mod bootstrap;
mod cache_ops;
mod engine;
mod error;
mod session;

use std::sync::Arc;

use tessera_core::SystemClock;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "tessera-child exiting with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), error::ChildError> {
    let bootstrap = bootstrap::Bootstrap::from_env()?;
    let cache = bootstrap.build_cache_manager(Arc::new(SystemClock))?;

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    session::run(stdin, stdout, cache).await
}
