// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tesserad-ctl cache` — the broadcast cache operations (§4.5): every
//! subcommand here returns one outcome per live child and renders them as
//! a per-child table, never collapsing them into a single pass/fail.

use clap::Subcommand;
use serde::Serialize;
use tessera_daemon::proto::{self, CatalogRequest, CheckoutRequest, Empty, UriRequest};

use crate::client::Clients;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, handle_list, OutputFormat};

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Resolve a URI through the search-path table; with `--pull`, advance
    /// the pull state-transition table (§4.3).
    Checkout {
        uri: String,
        #[arg(long)]
        pull: bool,
    },
    /// Remove one entry (pinned or not) on every child.
    Drop { uri: String },
    /// Snapshot every entry held by every child.
    List,
    /// Drop every entry, including pinned ones, on every child.
    Clear,
    /// Re-check every pinned URI's source and reload what needs it.
    Update,
    /// Layers and diagnostics for a loaded project.
    Info { uri: String },
    /// Ask storage handlers to enumerate available projects.
    Catalog {
        #[arg(long)]
        location: Option<String>,
    },
    /// Full per-child cache dump (entries plus identity).
    Dump,
}

/// One child's outcome from a broadcast cache op, reshaped for JSON/text
/// rendering (the generated `proto::ChildInfo` has no `Serialize` impl).
#[derive(Serialize)]
struct ChildInfoView {
    child_id: u32,
    uri: String,
    status: String,
    in_cache: bool,
    pinned: bool,
    hits: u64,
    load_timestamp_ms: Option<i64>,
    last_modified: Option<String>,
    error: Option<String>,
}

impl From<proto::ChildInfo> for ChildInfoView {
    fn from(i: proto::ChildInfo) -> Self {
        Self {
            child_id: i.child_id,
            uri: i.uri,
            status: i.status,
            in_cache: i.in_cache,
            pinned: i.pinned,
            hits: i.hits,
            load_timestamp_ms: i.load_timestamp_ms,
            last_modified: i.last_modified,
            error: i.error,
        }
    }
}

#[derive(Serialize)]
struct UpdateResultView {
    child_id: u32,
    uri: String,
    status: String,
}

impl From<proto::ChildUpdateResult> for UpdateResultView {
    fn from(r: proto::ChildUpdateResult) -> Self {
        Self { child_id: r.child_id, uri: r.uri, status: r.status }
    }
}

#[derive(Serialize)]
struct ProjectInfoView {
    child_id: u32,
    uri: String,
    layers: Vec<String>,
    diagnostics: Vec<String>,
    error: Option<String>,
}

impl From<proto::ChildProjectInfo> for ProjectInfoView {
    fn from(i: proto::ChildProjectInfo) -> Self {
        Self { child_id: i.child_id, uri: i.uri, layers: i.layers, diagnostics: i.diagnostics, error: i.error }
    }
}

#[derive(Serialize)]
struct CatalogItemView {
    uri: String,
    title: Option<String>,
}

impl From<proto::CatalogItem> for CatalogItemView {
    fn from(i: proto::CatalogItem) -> Self {
        Self { uri: i.uri, title: i.title }
    }
}

#[derive(Serialize)]
struct CacheDumpView {
    child_id: u32,
    entries: Vec<ChildInfoView>,
}

impl From<proto::ChildCacheDump> for CacheDumpView {
    fn from(d: proto::ChildCacheDump) -> Self {
        Self { child_id: d.child_id, entries: d.entries.into_iter().map(ChildInfoView::from).collect() }
    }
}

pub async fn run(mut clients: Clients, command: CacheCommand, format: OutputFormat) -> Result<(), ExitError> {
    match command {
        CacheCommand::Checkout { uri, pull } => {
            let items = collect(clients.admin.checkout_project(CheckoutRequest { uri, pull }).await?.into_inner())
                .await?;
            let items: Vec<ChildInfoView> = items.into_iter().map(Into::into).collect();
            handle_list(format, &items, "no children in pool", print_child_info_table)
        }
        CacheCommand::Drop { uri } => {
            let items = collect(clients.admin.drop_project(UriRequest { uri }).await?.into_inner()).await?;
            let items: Vec<ChildInfoView> = items.into_iter().map(Into::into).collect();
            handle_list(format, &items, "no children in pool", print_child_info_table)
        }
        CacheCommand::List => {
            let items = collect(clients.admin.list_cache(Empty {}).await?.into_inner()).await?;
            let items: Vec<ChildInfoView> = items.into_iter().map(Into::into).collect();
            handle_list(format, &items, "cache is empty on every child", print_child_info_table)
        }
        CacheCommand::Clear => {
            let ack = clients.admin.clear_cache(Empty {}).await?.into_inner();
            format_or_json(
                format,
                &serde_json::json!({ "children_acked": ack.children_acked, "children_failed": ack.children_failed }),
                || println!("cleared: {} acked, {} failed", ack.children_acked, ack.children_failed),
            )
        }
        CacheCommand::Update => {
            let items = collect(clients.admin.update_cache(Empty {}).await?.into_inner()).await?;
            let items: Vec<UpdateResultView> = items.into_iter().map(Into::into).collect();
            handle_list(format, &items, "no pinned projects to update", |items| {
                for i in items {
                    println!("child {:>2}  {:<40}  {}", i.child_id, i.uri, i.status);
                }
            })
        }
        CacheCommand::Info { uri } => {
            let items = collect(clients.admin.get_project_info(UriRequest { uri }).await?.into_inner()).await?;
            let items: Vec<ProjectInfoView> = items.into_iter().map(Into::into).collect();
            handle_list(format, &items, "no children in pool", |items| {
                for i in items {
                    if let Some(err) = &i.error {
                        println!("child {:>2}  {:<40}  error: {}", i.child_id, i.uri, err);
                        continue;
                    }
                    println!("child {:>2}  {:<40}  layers: {}", i.child_id, i.uri, i.layers.join(", "));
                    for d in &i.diagnostics {
                        println!("           {d}");
                    }
                }
            })
        }
        CacheCommand::Catalog { location } => {
            let items = collect(clients.admin.catalog(CatalogRequest { location }).await?.into_inner()).await?;
            let items: Vec<CatalogItemView> = items.into_iter().map(Into::into).collect();
            handle_list(format, &items, "no projects found", |items| {
                for i in items {
                    match &i.title {
                        Some(title) => println!("{:<50}  {}", i.uri, title),
                        None => println!("{}", i.uri),
                    }
                }
            })
        }
        CacheCommand::Dump => {
            let items = collect(clients.admin.dump_cache(Empty {}).await?.into_inner()).await?;
            let items: Vec<CacheDumpView> = items.into_iter().map(Into::into).collect();
            handle_list(format, &items, "no children in pool", |items| {
                for dump in items {
                    println!("child {} — {} entries", dump.child_id, dump.entries.len());
                    print_child_info_table(&dump.entries);
                }
            })
        }
    }
    .map_err(|e| ExitError::new(1, e.to_string()))
}

/// Drains a `tonic::Streaming<T>` into a `Vec`; a broadcast op returns one
/// item per live child (§8 invariant 8), never a single pass/fail.
async fn collect<T>(mut stream: tonic::Streaming<T>) -> Result<Vec<T>, tonic::Status> {
    let mut items = Vec::new();
    while let Some(item) = stream.message().await? {
        items.push(item);
    }
    Ok(items)
}

fn print_child_info_table(items: &[ChildInfoView]) {
    for i in items {
        if let Some(err) = &i.error {
            println!("child {:>2}  {:<40}  error: {}", i.child_id, i.uri, err);
            continue;
        }
        println!(
            "child {:>2}  {:<40}  {:<12}  in_cache={:<5}  pinned={:<5}  hits={}",
            i.child_id, i.uri, i.status, i.in_cache, i.pinned, i.hits
        );
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
