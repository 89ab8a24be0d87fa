// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared request/reply payload types carried inside [`crate::Frame`]
//! variants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The four request classes a dispatcher can route (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    OwsOgc,
    Api,
    Collections,
    Admin,
}

/// Log-level-equivalent severity for an out-of-band [`crate::Frame::Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// A cache entry's lifecycle state (§3, §4.3 pull-transition table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheStatus {
    Unknown,
    New,
    NeedUpdate,
    Unchanged,
    Removed,
    NotFound,
}

/// The cache operation set exposed over the framed channel (§4.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum CacheOp {
    /// Resolve `uri` through the search-path table. If `pull`, apply the
    /// pull state-transition table (load/refresh/drop as needed).
    Checkout { uri: String, pull: bool },
    /// Remove the entry, pinned or not.
    Drop { uri: String },
    /// Snapshot every entry currently held.
    List,
    /// Drop every entry, including pinned ones.
    Clear,
    /// Re-check every entry's source; reload any that need it.
    Update,
    /// Ask storage handlers matching `location` to enumerate projects.
    Catalog { location: Option<String> },
    /// Layers and diagnostics for a loaded project.
    Info { uri: String },
}

/// Result of a [`CacheOp::Checkout`] or [`CacheOp::Drop`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub uri: String,
    pub status: CacheStatus,
    pub in_cache: bool,
    pub pinned: bool,
    pub hits: u64,
    /// Unix epoch millis of last load, if ever loaded.
    pub load_timestamp_ms: Option<i64>,
    /// Opaque last-modified marker reported by the storage handler.
    pub last_modified: Option<String>,
}

impl Info {
    /// A fresh, never-seen entry, as `Checkout(pull=false)` returns before
    /// anything has been loaded.
    pub fn unknown(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            status: CacheStatus::New,
            in_cache: false,
            pinned: false,
            hits: 0,
            load_timestamp_ms: None,
            last_modified: None,
        }
    }
}

/// Layers and diagnostics for a loaded project, returned by
/// [`CacheOp::Info`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub uri: String,
    pub layers: Vec<String>,
    pub diagnostics: Vec<String>,
}

/// One URI's outcome from a [`CacheOp::Update`] sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub uri: String,
    pub status: CacheStatus,
}

/// One entry in a [`CacheOp::Catalog`] enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub uri: String,
    pub title: Option<String>,
}

/// Stub payloads the `tessera-child` rendering-engine stand-in understands,
/// carried as the msgpack-encoded bytes of a `RequestKind::Api` request.
/// `Sleep` exists only to make the timeout/cancel scenarios in the test
/// suite exercisable without a real rendering backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum EngineOp {
    Ping { echo: String },
    Sleep { delay_ms: u64 },
    /// Opaque request handled by the real rendering engine in production;
    /// the stub echoes the body back as a single chunk.
    Opaque { headers: BTreeMap<String, String>, body: Vec<u8> },
}

/// Reply payload matching one `EngineOp` variant, carried as the
/// msgpack-encoded bytes of the `ReplyChunk`(s) answering it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum EngineReply {
    Ping { echo: String },
    /// `Sleep` completed without being cancelled.
    Slept { delay_ms: u64 },
    Opaque { headers: BTreeMap<String, String>, body: Vec<u8> },
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
