// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-child cache manager (C3): holds pinned and unpinned project
//! entries, resolves URIs through the search-path table, dispatches to the
//! storage handler registered for each URI's scheme, and applies the pull
//! state-transition table.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use rand::Rng;
use tessera_core::Clock;
use tessera_wire::{CacheStatus, CatalogItem, Info, ProjectInfo};
use tracing::{debug, warn};

use crate::entry::{non_pull_status, pull_transition, CacheEntry, PullAction};
use crate::error::CacheError;
use crate::handler::StorageHandler;
use crate::search_path::SearchPathTable;

/// Run a storage-handler call once more, after a short jittered delay, if
/// its first attempt failed with a transient [`CacheError`] (§7). Permanent
/// errors (unknown scheme, not found) are returned immediately.
async fn with_retry<T, Fut>(op: impl Fn() -> Fut) -> Result<T, CacheError>
where
    Fut: std::future::Future<Output = Result<T, CacheError>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(e) if e.is_transient() => {
            let jitter_ms = rand::thread_rng().gen_range(20..=120);
            tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
            op().await
        }
        Err(e) => Err(e),
    }
}

/// Bounds how many unpinned entries a [`CacheManager`] holds; pinned
/// entries are unbounded by this limit (§8 invariant 6).
pub struct CacheManager {
    handlers: HashMap<String, Arc<dyn StorageHandler>>,
    search_path: SearchPathTable,
    entries: IndexMap<String, CacheEntry>,
    max_projects: usize,
    clock: Arc<dyn Clock>,
}

impl CacheManager {
    pub fn new(search_path: SearchPathTable, max_projects: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            handlers: HashMap::new(),
            search_path,
            entries: IndexMap::new(),
            max_projects,
            clock,
        }
    }

    pub fn register_handler(&mut self, handler: Arc<dyn StorageHandler>) {
        self.handlers.insert(handler.scheme().to_string(), handler);
    }

    fn scheme_of(uri: &str) -> Option<&str> {
        uri.split_once("://").map(|(scheme, _)| scheme)
    }

    fn handler_for(&self, uri: &str) -> Result<&Arc<dyn StorageHandler>, CacheError> {
        let scheme = Self::scheme_of(uri).ok_or_else(|| CacheError::UnknownScheme(uri.to_string()))?;
        self.handlers
            .get(scheme)
            .ok_or_else(|| CacheError::UnknownScheme(scheme.to_string()))
    }

    /// Rewrite an incoming path through the search-path table if it
    /// matches a mount prefix; otherwise treat it as an already-resolved
    /// handler URI.
    pub fn canonicalize(&self, path_or_uri: &str) -> String {
        self.search_path.resolve(path_or_uri).unwrap_or_else(|| path_or_uri.to_string())
    }

    /// `Checkout` (§4.3). `pin` is decided by the caller: the admin plane
    /// always pins; implicit autoload on request (`load_project_on_request`)
    /// never does.
    pub async fn checkout(&mut self, uri: &str, pull: bool, pin: bool) -> Result<Info, CacheError> {
        let uri = self.canonicalize(uri);
        let handler = self.handler_for(&uri)?.clone();
        let source = with_retry(|| handler.resolve(&uri)).await?;
        let stat = with_retry(|| handler.stat(&source)).await?;

        let status = non_pull_status(self.entries.get(&uri), &stat);

        if !pull {
            self.ensure_entry_status(&uri, source, status);
            return Ok(self.info_for(&uri));
        }

        let (action, final_status) = pull_transition(status);
        match action {
            PullAction::Load | PullAction::Reload => {
                let project = with_retry(|| handler.open(&source)).await?;
                self.install_loaded(&uri, source, final_status, project, &stat, pin);
            }
            PullAction::Evict => {
                self.entries.shift_remove(&uri);
                return Ok(Info {
                    uri,
                    status: final_status,
                    in_cache: false,
                    pinned: false,
                    hits: 0,
                    load_timestamp_ms: None,
                    last_modified: None,
                });
            }
            PullAction::None => {
                self.ensure_entry_status(&uri, source, final_status);
            }
        }
        Ok(self.info_for(&uri))
    }

    fn ensure_entry_status(&mut self, uri: &str, source: crate::handler::SourceRef, status: CacheStatus) {
        let entry = self
            .entries
            .entry(uri.to_string())
            .or_insert_with(|| CacheEntry::new(uri, source));
        entry.status = status;
    }

    fn install_loaded(
        &mut self,
        uri: &str,
        source: crate::handler::SourceRef,
        status: CacheStatus,
        project: crate::handler::LoadedProject,
        stat: &crate::handler::StatResult,
        pin: bool,
    ) {
        let marker = match stat {
            crate::handler::StatResult::Modified(marker) => Some(marker.clone()),
            crate::handler::StatResult::Removed => None,
        };
        let now_ms = self
            .clock
            .system_now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;

        let entry = self
            .entries
            .entry(uri.to_string())
            .or_insert_with(|| CacheEntry::new(uri, source));
        entry.status = status;
        entry.loaded = Some(project);
        entry.last_modified = marker;
        entry.load_timestamp_ms = Some(now_ms);
        entry.pinned = entry.pinned || pin;

        self.touch(uri);
        self.evict_if_over_capacity();
    }

    /// Move `uri` to the back of the map, marking it most-recently-used.
    fn touch(&mut self, uri: &str) {
        if let Some(entry) = self.entries.shift_remove(uri) {
            self.entries.insert(uri.to_string(), entry);
        }
    }

    fn evict_if_over_capacity(&mut self) {
        loop {
            let unpinned_count = self.entries.values().filter(|e| !e.pinned).count();
            if unpinned_count <= self.max_projects {
                break;
            }
            let oldest_unpinned_key = self
                .entries
                .iter()
                .find(|(_, e)| !e.pinned)
                .map(|(key, _)| key.clone());
            match oldest_unpinned_key {
                Some(key) => {
                    debug!(uri = %key, "evicting unpinned cache entry over capacity");
                    self.entries.shift_remove(&key);
                }
                None => break,
            }
        }
    }

    pub async fn drop_entry(&mut self, uri: &str) -> Result<Info, CacheError> {
        let uri = self.canonicalize(uri);
        self.entries.shift_remove(&uri);
        Ok(Info {
            uri,
            status: CacheStatus::NotFound,
            in_cache: false,
            pinned: false,
            hits: 0,
            load_timestamp_ms: None,
            last_modified: None,
        })
    }

    pub fn list(&self) -> Vec<Info> {
        self.entries.keys().map(|uri| self.info_for(uri)).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// `Update` (§4.3): re-check every held entry's source and reload the
    /// ones that need it. Returns each URI's resulting status.
    pub async fn update_all(&mut self) -> Vec<(String, CacheStatus)> {
        let uris: Vec<String> = self.entries.keys().cloned().collect();
        let mut results = Vec::with_capacity(uris.len());
        for uri in uris {
            let pin = self.entries.get(&uri).map(|e| e.pinned).unwrap_or(false);
            match self.checkout(&uri, true, pin).await {
                Ok(info) => results.push((uri, info.status)),
                Err(e) => {
                    warn!(uri = %uri, error = %e, "update_all: checkout failed");
                    results.push((uri, CacheStatus::Unknown));
                }
            }
        }
        results
    }

    pub async fn catalog(&self, location: Option<&str>) -> Result<Vec<CatalogItem>, CacheError> {
        let mut items = Vec::new();
        for handler in self.handlers.values() {
            if let Some(loc) = location {
                if Self::scheme_of(loc).map(|s| s != handler.scheme()).unwrap_or(false) {
                    continue;
                }
            }
            items.extend(with_retry(|| handler.enumerate(location)).await?);
        }
        Ok(items)
    }

    pub fn project_info(&self, uri: &str) -> Result<ProjectInfo, CacheError> {
        let uri = self.canonicalize(uri);
        let entry = self.entries.get(&uri).ok_or_else(|| CacheError::NotFound(uri.clone()))?;
        let project = entry.loaded.as_ref().ok_or_else(|| CacheError::NotFound(uri.clone()))?;
        Ok(ProjectInfo {
            uri,
            layers: project.layers.clone(),
            diagnostics: project.diagnostics.clone(),
        })
    }

    fn info_for(&self, uri: &str) -> Info {
        match self.entries.get(uri) {
            Some(entry) => Info {
                uri: uri.to_string(),
                status: entry.status,
                in_cache: entry.loaded.is_some(),
                pinned: entry.pinned,
                hits: entry.hits,
                load_timestamp_ms: entry.load_timestamp_ms,
                last_modified: entry.last_modified.clone(),
            },
            None => Info::unknown(uri),
        }
    }

    pub fn pinned_uris(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, e)| e.pinned)
            .map(|(uri, _)| uri.clone())
            .collect()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
