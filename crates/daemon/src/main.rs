// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tesserad`: load config, bring up the child fleet, serve the gRPC
//! surface, and carry the process-exit-code contract through to a single
//! `std::process::exit` call site (§4.4, §6).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tessera_core::Config;
use tessera_daemon::error::ExitOutcome;
use tessera_daemon::proto::admin_plane_server::AdminPlaneServer;
use tessera_daemon::proto::data_plane_server::DataPlaneServer;
use tessera_daemon::{supervisor, AdminPlane, AdminPlaneService, DataPlaneService, DaemonState, Dispatcher, Supervisor};
use tonic::transport::Server;
use tracing::{error, info};

const CONFIG_PATH_ENV: &str = "TESSERAD_CONFIG";
const CHILD_BINARY_ENV: &str = "TESSERAD_CHILD_BINARY";
const DEFAULT_CONFIG_PATH: &str = "/etc/tessera/tesserad.toml";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let outcome = run().await;
    if outcome != ExitOutcome::Normal {
        error!(code = outcome.code(), "exiting");
    }
    std::process::exit(outcome.code());
}

async fn run() -> ExitOutcome {
    let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = match Config::load_from_file(std::path::Path::new(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %config_path, error = %e, "failed to load config");
            return ExitOutcome::ConfigInvalid;
        }
    };
    if let Err(e) = config.validate() {
        error!(error = %e, "config failed validation");
        return ExitOutcome::ConfigInvalid;
    }

    let child_binary = std::env::var(CHILD_BINARY_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_child_binary());

    let child_config_json = {
        #[derive(serde::Serialize)]
        struct Bootstrap<'a> {
            engine: &'a tessera_core::config::EngineConfig,
        }
        match serde_json::to_string(&Bootstrap { engine: &config.engine }) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to serialize child bootstrap config");
                return ExitOutcome::ConfigInvalid;
            }
        }
    };

    info!(num_processes = config.worker.num_processes, "starting initial child fleet");
    let children = match supervisor::spawn_initial_fleet(
        config.worker.num_processes,
        &child_binary,
        &child_config_json,
        config.worker.process_start_timeout(),
    )
    .await
    {
        Ok(children) => children,
        Err(outcome) => return outcome,
    };

    let restore_uris = match tessera_daemon::restore::resolve(&config.worker) {
        Ok(uris) => uris,
        Err(e) => {
            error!(error = %e, "failed to resolve restore list, starting with an empty cache");
            Vec::new()
        }
    };
    supervisor::replay_restore_list_all(&children, &restore_uris).await;

    let (dispatcher, dead_rx) = Dispatcher::new(
        children,
        config.worker.max_waiting_requests,
        0.3,
        config.worker.cancel_timeout(),
    );

    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    {
        let mut health_reporter = health_reporter.clone();
        health_reporter.set_serving::<DataPlaneServer<DataPlaneService>>().await;
        health_reporter.set_serving::<AdminPlaneServer<AdminPlaneService>>().await;
    }

    let listen_addr = match config.server.listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(listen = %config.server.listen, error = %e, "invalid server.listen address");
            return ExitOutcome::ConfigInvalid;
        }
    };

    let state = Arc::new(DaemonState::new(dispatcher, config, health_reporter, child_binary));
    let (supervisor, reload_handle) = Supervisor::start(state.clone(), dead_rx);

    let data_plane = DataPlaneServer::new(DataPlaneService::new(state.clone()));
    let admin_plane = AdminPlaneServer::new(AdminPlaneService::new(AdminPlane::new(state.clone(), reload_handle)));

    info!(%listen_addr, "tesserad listening");
    let serve_result = Server::builder()
        .add_service(health_service)
        .add_service(data_plane)
        .add_service(admin_plane)
        .serve_with_shutdown(listen_addr, shutdown_signal())
        .await;

    info!("shutdown signal received, draining");
    state.begin_shutdown();
    tokio::time::sleep(state.config.read().server.shutdown_grace_period()).await;
    supervisor.shutdown();

    let children = state.dispatcher.children_snapshot();
    for child in &children {
        let _ = child.terminate();
    }
    for child in &children {
        tokio::time::timeout(Duration::from_secs(5), child.join()).await.ok();
    }

    match serve_result {
        Ok(()) => ExitOutcome::Normal,
        Err(e) => {
            error!(error = %e, "gRPC server exited with an error");
            ExitOutcome::Normal
        }
    }
}

fn default_child_binary() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("tessera-child")))
        .unwrap_or_else(|| PathBuf::from("tessera-child"))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
            } else {
                error!("failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
