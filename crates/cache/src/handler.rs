// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The storage-handler capability set (§4.3, §9): `resolve`, `stat`,
//! `open`, `enumerate`. Concrete handlers are registered by URL scheme;
//! callers never downcast to a concrete type, only use the trait.

use async_trait::async_trait;
use tessera_wire::CatalogItem;

use crate::error::CacheError;

/// A URI resolved by a [`StorageHandler`] into something the same handler
/// can `stat`/`open` again without re-parsing the URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub uri: String,
    pub backend_key: String,
}

impl SourceRef {
    pub fn new(uri: impl Into<String>, backend_key: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            backend_key: backend_key.into(),
        }
    }
}

/// Result of checking a source for changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatResult {
    /// Still present; carries an opaque last-modified marker. Equality of
    /// two markers means "unchanged"; the marker's format is handler-specific.
    Modified(String),
    Removed,
}

/// What `open` hands back: the bits the parent needs to answer
/// `CacheOp::Info`. The actual rendering engine object stays inside the
/// child process and is never exposed across the framed boundary (§9).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadedProject {
    pub layers: Vec<String>,
    pub diagnostics: Vec<String>,
}

/// A backend capable of resolving, checking, loading, and enumerating
/// projects for one URL scheme.
#[async_trait]
pub trait StorageHandler: Send + Sync {
    fn scheme(&self) -> &str;

    async fn resolve(&self, uri: &str) -> Result<SourceRef, CacheError>;

    async fn stat(&self, source: &SourceRef) -> Result<StatResult, CacheError>;

    async fn open(&self, source: &SourceRef) -> Result<LoadedProject, CacheError>;

    async fn enumerate(&self, location: Option<&str>) -> Result<Vec<CatalogItem>, CacheError>;
}
