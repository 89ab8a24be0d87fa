// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-URI cache entry and the pull state-transition table (§4.3),
//! factored out as pure functions so the table itself is unit-testable
//! without a real storage handler.

use tessera_wire::CacheStatus;

use crate::handler::{LoadedProject, SourceRef, StatResult};

/// One held project. `pinned` entries are exempt from LRU eviction but not
/// from `Clear`/`Drop` (§4.3).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub uri: String,
    pub status: CacheStatus,
    pub source: SourceRef,
    pub last_modified: Option<String>,
    pub loaded: Option<LoadedProject>,
    pub pinned: bool,
    pub hits: u64,
    pub load_timestamp_ms: Option<i64>,
}

impl CacheEntry {
    pub fn new(uri: impl Into<String>, source: SourceRef) -> Self {
        Self {
            uri: uri.into(),
            status: CacheStatus::New,
            source,
            last_modified: None,
            loaded: None,
            pinned: false,
            hits: 0,
            load_timestamp_ms: None,
        }
    }
}

/// What the manager must do to a [`CacheEntry`] after `stat` has reported
/// the source's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullAction {
    Load,
    Reload,
    Evict,
    None,
}

/// The status an entry would have *without* applying a pull, derived from
/// the prior status (or "no entry yet") and a fresh `stat` result. This is
/// what `Checkout(pull=false)` returns, and what `Checkout(pull=true)`
/// feeds into the pull-transition table below.
pub fn non_pull_status(existing: Option<&CacheEntry>, stat: &StatResult) -> CacheStatus {
    match (existing, stat) {
        (None, StatResult::Modified(_)) => CacheStatus::New,
        (None, StatResult::Removed) => CacheStatus::NotFound,
        (Some(entry), StatResult::Removed) => match entry.status {
            CacheStatus::NotFound => CacheStatus::NotFound,
            _ => CacheStatus::Removed,
        },
        (Some(entry), StatResult::Modified(marker)) => {
            if entry.status == CacheStatus::NotFound {
                CacheStatus::New
            } else if entry.last_modified.as_deref() == Some(marker.as_str()) {
                CacheStatus::Unchanged
            } else {
                CacheStatus::NeedUpdate
            }
        }
    }
}

/// The pull-transition table (§4.3): given the status a `pull=false`
/// checkout would report, what action applying `pull=true` takes and what
/// status it lands on. Idempotent on terminal states (`Unchanged`,
/// `NotFound`) per the spec's invariant 5.
pub fn pull_transition(status: CacheStatus) -> (PullAction, CacheStatus) {
    match status {
        CacheStatus::New => (PullAction::Load, CacheStatus::Unchanged),
        CacheStatus::NeedUpdate => (PullAction::Reload, CacheStatus::Unchanged),
        CacheStatus::Unchanged => (PullAction::None, CacheStatus::Unchanged),
        CacheStatus::Removed => (PullAction::Evict, CacheStatus::NotFound),
        CacheStatus::NotFound => (PullAction::None, CacheStatus::NotFound),
        CacheStatus::Unknown => (PullAction::None, CacheStatus::Unknown),
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
