// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A pluggable handler for non-filesystem schemes (object-store, relational
//! project storage, HTTP) behind one uniform in-memory backend trait, so new
//! schemes can be wired up without touching the cache manager.
//!
//! `MapBackend` is a ready-to-use implementation for tests and for schemes
//! whose projects genuinely fit in memory (e.g. a small relational
//! project-storage table read wholesale at startup).

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tessera_wire::CatalogItem;

use crate::error::CacheError;
use crate::handler::{LoadedProject, SourceRef, StatResult, StorageHandler};

/// A versioned record for one project under a [`UrlSchemeHandler`].
#[derive(Debug, Clone)]
pub struct Record {
    pub last_modified: String,
    pub layers: Vec<String>,
}

/// Backend contract a [`UrlSchemeHandler`] delegates to. Kept separate from
/// `StorageHandler` so alternative backends (an object-store client, a SQL
/// connection pool) can implement just this narrower, synchronous surface.
pub trait Backend: Send + Sync {
    fn get(&self, key: &str) -> Option<Record>;
    fn list(&self, prefix: Option<&str>) -> Vec<(String, Record)>;
}

/// An in-memory [`Backend`], handy for tests and for small catalogs.
#[derive(Debug, Default)]
pub struct MapBackend {
    records: RwLock<BTreeMap<String, Record>>,
}

impl MapBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: impl Into<String>, record: Record) {
        self.records.write().unwrap_or_else(|e| e.into_inner()).insert(key.into(), record);
    }

    pub fn remove(&self, key: &str) {
        self.records.write().unwrap_or_else(|e| e.into_inner()).remove(key);
    }
}

impl Backend for MapBackend {
    fn get(&self, key: &str) -> Option<Record> {
        self.records.read().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
    }

    fn list(&self, prefix: Option<&str>) -> Vec<(String, Record)> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(key, _)| prefix.map(|p| key.starts_with(p)).unwrap_or(true))
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect()
    }
}

/// Storage handler for one non-filesystem scheme, backed by a [`Backend`].
pub struct UrlSchemeHandler<B: Backend> {
    scheme: String,
    backend: B,
}

impl<B: Backend> UrlSchemeHandler<B> {
    pub fn new(scheme: impl Into<String>, backend: B) -> Self {
        Self {
            scheme: scheme.into(),
            backend,
        }
    }

    fn key_for(&self, uri: &str) -> String {
        uri.strip_prefix(&format!("{}://", self.scheme)).unwrap_or(uri).to_string()
    }
}

#[async_trait]
impl<B: Backend> StorageHandler for UrlSchemeHandler<B> {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    async fn resolve(&self, uri: &str) -> Result<SourceRef, CacheError> {
        Ok(SourceRef::new(uri, self.key_for(uri)))
    }

    async fn stat(&self, source: &SourceRef) -> Result<StatResult, CacheError> {
        match self.backend.get(&source.backend_key) {
            Some(record) => Ok(StatResult::Modified(record.last_modified)),
            None => Ok(StatResult::Removed),
        }
    }

    async fn open(&self, source: &SourceRef) -> Result<LoadedProject, CacheError> {
        self.backend
            .get(&source.backend_key)
            .map(|record| LoadedProject {
                layers: record.layers,
                diagnostics: Vec::new(),
            })
            .ok_or_else(|| CacheError::Open {
                uri: source.uri.clone(),
                message: "record disappeared between stat and open".to_string(),
            })
    }

    async fn enumerate(&self, location: Option<&str>) -> Result<Vec<CatalogItem>, CacheError> {
        Ok(self
            .backend
            .list(location)
            .into_iter()
            .map(|(key, _)| CatalogItem {
                uri: format!("{}://{}", self.scheme, key),
                title: Some(key),
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "url_scheme_tests.rs"]
mod tests;
