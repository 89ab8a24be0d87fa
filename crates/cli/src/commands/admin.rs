// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The remaining admin-plane RPCs (§6) that don't fit `cache` or `config`:
//! plugin listing, pool stats, process env, serving-status override, and
//! rolling reload.

use tessera_daemon::proto::{Empty, ServingStatusRequest};

use crate::client::Clients;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, handle_list, OutputFormat};

pub async fn plugins(mut clients: Clients, format: OutputFormat) -> Result<(), ExitError> {
    let mut stream = clients.admin.list_plugins(Empty {}).await?.into_inner();
    let mut schemes = Vec::new();
    while let Some(item) = stream.message().await? {
        schemes.push(item.scheme);
    }
    handle_list(format, &schemes, "no storage handlers registered", |schemes| {
        for s in schemes {
            println!("{s}");
        }
    })
    .map_err(|e| ExitError::new(1, e.to_string()))
}

pub async fn stats(mut clients: Clients, format: OutputFormat) -> Result<(), ExitError> {
    let s = clients.admin.stats(Empty {}).await?.into_inner();
    format_or_json(
        format,
        &serde_json::json!({
            "active_workers": s.active_workers,
            "idle_workers": s.idle_workers,
            "activity": s.activity,
            "failure_pressure": s.failure_pressure,
            "request_pressure": s.request_pressure,
            "uptime_secs": s.uptime_secs,
        }),
        || {
            println!("active_workers:    {}", s.active_workers);
            println!("idle_workers:      {}", s.idle_workers);
            println!("activity:          {:.3}", s.activity);
            println!("failure_pressure:  {:.3}", s.failure_pressure);
            println!("request_pressure:  {:.3}", s.request_pressure);
            println!("uptime:            {}", format_uptime(s.uptime_secs));
        },
    )
    .map_err(|e| ExitError::new(1, e.to_string()))
}

pub async fn env(mut clients: Clients, format: OutputFormat) -> Result<(), ExitError> {
    let reply = clients.admin.get_env(Empty {}).await?.into_inner();
    let mut values: Vec<(String, String)> = reply.values.into_iter().collect();
    values.sort_by(|a, b| a.0.cmp(&b.0));
    handle_list(format, &values, "no environment variables reported", |values| {
        for (k, v) in values {
            println!("{k}={v}");
        }
    })
    .map_err(|e| ExitError::new(1, e.to_string()))
}

pub async fn set_serving(mut clients: Clients, serving: bool, format: OutputFormat) -> Result<(), ExitError> {
    clients.admin.set_server_serving_status(ServingStatusRequest { serving }).await?;
    format_or_json(format, &serde_json::json!({ "serving": serving }), || {
        println!("health service set to {}", if serving { "SERVING" } else { "NOT_SERVING" });
    })
    .map_err(|e| ExitError::new(1, e.to_string()))
}

pub async fn reload(mut clients: Clients, format: OutputFormat) -> Result<(), ExitError> {
    let reply = clients.admin.reload(Empty {}).await?.into_inner();
    format_or_json(format, &serde_json::json!({ "children_replaced": reply.children_replaced }), || {
        println!("reload complete: {} children replaced", reply.children_replaced);
    })
    .map_err(|e| ExitError::new(1, e.to_string()))
}

fn format_uptime(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    if hours > 0 {
        format!("{hours}h {mins}m {secs}s")
    } else if mins > 0 {
        format!("{mins}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
#[path = "admin_tests.rs"]
mod tests;
