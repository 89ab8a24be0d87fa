// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no search-path entry matches uri {0:?}")]
    NoMatchingMount(String),

    #[error("no storage handler registered for scheme {0:?}")]
    UnknownScheme(String),

    #[error("project {0:?} not found in cache")]
    NotFound(String),

    #[error("storage handler error resolving {uri:?}: {message}")]
    Resolve { uri: String, message: String },

    #[error("storage handler error loading {uri:?}: {message}")]
    Open { uri: String, message: String },

    #[error("storage handler error enumerating {location:?}: {message}")]
    Enumerate { location: String, message: String },
}

impl CacheError {
    /// Whether a storage-handler call failing this way is worth one retry
    /// (§7): I/O-level hiccups from the handler itself, not structural
    /// errors like an unregistered scheme or a missing project.
    pub fn is_transient(&self) -> bool {
        matches!(self, CacheError::Resolve { .. } | CacheError::Open { .. } | CacheError::Enumerate { .. })
    }
}
