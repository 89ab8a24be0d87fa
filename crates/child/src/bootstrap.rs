// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reads the per-child engine configuration the daemon passes through the
//! environment at spawn time and builds the cache manager's handler
//! registry from it.
//!
//! The wire protocol carries no handshake payload beyond the `Banner`
//! frame (pid + engine version), so anything the child needs before its
//! first frame — the engine sub-block, in particular — has to arrive out
//! of band. `tessera-daemon` serializes `EngineConfig` as JSON into
//! `TESSERA_CHILD_CONFIG` rather than invent a second wire message for a
//! one-shot, pre-connection value.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tessera_cache::handlers::local_fs::LocalFsHandler;
use tessera_cache::handlers::url_scheme::{MapBackend, UrlSchemeHandler};
use tessera_cache::{CacheManager, SearchPathTable, StorageHandler};
use tessera_core::config::EngineConfig;
use tessera_core::Clock;

use crate::error::ChildError;

pub const CONFIG_ENV_VAR: &str = "TESSERA_CHILD_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bootstrap {
    pub engine: EngineConfig,
}

impl Bootstrap {
    pub fn from_env() -> Result<Self, ChildError> {
        let raw = std::env::var(CONFIG_ENV_VAR).map_err(|_| ChildError::MissingConfig)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Build a fresh [`CacheManager`] with every configured handler
    /// registered. Called once at startup and again for each rolling
    /// replacement, since the engine sub-block is immutable within one
    /// child's lifetime (§5) — a config change always respawns.
    pub fn build_cache_manager(&self, clock: Arc<dyn Clock>) -> Result<CacheManager, ChildError> {
        let search_path = SearchPathTable::new(self.engine.search_path.clone());
        let mut manager = CacheManager::new(search_path, self.engine.max_projects, clock);
        for handler_cfg in &self.engine.handlers {
            manager.register_handler(build_handler(&handler_cfg.scheme, &handler_cfg.settings)?);
        }
        Ok(manager)
    }
}

fn build_handler(
    scheme: &str,
    settings: &std::collections::BTreeMap<String, serde_json::Value>,
) -> Result<Arc<dyn StorageHandler>, ChildError> {
    match scheme {
        "file" => {
            let root = settings
                .get("root")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ChildError::MissingHandlerSetting("root".to_string()))?;
            Ok(Arc::new(LocalFsHandler::new(root)))
        }
        other => {
            // Object-store / relational-project-storage / HTTP backends are
            // pluggable but not bundled here (§1 out of scope); any
            // non-`file` scheme gets an in-memory stand-in so the search
            // path and LRU/pin machinery are still exercisable end to end.
            Ok(Arc::new(UrlSchemeHandler::new(other, MapBackend::new())))
        }
    }
}

#[cfg(test)]
#[path = "bootstrap_tests.rs"]
mod tests;
