// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C5: the admin control plane. Cache-affecting operations are broadcast to
//! every live child and tolerant of per-child divergence — one child
//! failing an op never fails the others (§4.5, §5 ordering guarantee 4).

use std::collections::BTreeSet;
use std::sync::Arc;

use tessera_core::config::ConfigPatch;
use tessera_wire::{CacheOp, CatalogItem, Info, ProjectInfo};
use tracing::warn;

use crate::state::DaemonState;
use crate::supervisor::ReloadHandle;

/// One child's outcome from a broadcast op: present, or the error string
/// the child (or the host talking to it) produced.
pub type ChildOutcome<T> = (usize, Result<T, String>);

pub struct AdminPlane {
    state: Arc<DaemonState>,
    reload: ReloadHandle,
}

impl AdminPlane {
    pub fn new(state: Arc<DaemonState>, reload: ReloadHandle) -> Self {
        Self { state, reload }
    }

    fn live_children(&self) -> Vec<Arc<crate::child_host::ChildHandle>> {
        self.state
            .dispatcher
            .children_snapshot()
            .into_iter()
            .filter(|c| c.state() != crate::child_host::ChildState::Dead)
            .collect()
    }

    async fn broadcast<T, F>(&self, op: CacheOp, pin: bool, decode_one: F) -> Vec<ChildOutcome<T>>
    where
        T: Send + 'static,
        F: Fn(Vec<Vec<u8>>) -> Result<T, String> + Send + Sync + 'static,
    {
        let decode_one = Arc::new(decode_one);
        let mut set = tokio::task::JoinSet::new();
        for handle in self.live_children() {
            let op = op.clone();
            let decode_one = decode_one.clone();
            set.spawn(async move {
                let id = handle.id;
                let result = handle
                    .cache_op(op, pin)
                    .await
                    .map_err(|e| e.to_string())
                    .and_then(|chunks| decode_one(chunks));
                (id, result)
            });
        }
        let mut out = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => out.push(outcome),
                Err(e) => warn!(error = %e, "broadcast cache-op task panicked"),
            }
        }
        out.sort_by_key(|(id, _)| *id);
        out
    }

    fn decode_info(chunks: Vec<Vec<u8>>) -> Result<Info, String> {
        chunks
            .into_iter()
            .next()
            .ok_or_else(|| "child returned no Info".to_string())
            .and_then(|bytes| tessera_wire::decode(&bytes).map_err(|e| e.to_string()))
    }

    /// `CheckoutProject` — always pins, per the admin/autoload distinction
    /// `CacheOp` itself doesn't carry (§4.3).
    pub async fn checkout_project(&self, uri: &str, pull: bool) -> Vec<ChildOutcome<Info>> {
        self.broadcast(
            CacheOp::Checkout { uri: uri.to_string(), pull },
            true,
            Self::decode_info,
        )
        .await
    }

    pub async fn drop_project(&self, uri: &str) -> Vec<ChildOutcome<Info>> {
        self.broadcast(CacheOp::Drop { uri: uri.to_string() }, false, Self::decode_info).await
    }

    pub async fn list_cache(&self) -> Vec<ChildOutcome<Vec<Info>>> {
        self.broadcast(CacheOp::List, false, |chunks| {
            chunks
                .into_iter()
                .map(|bytes| tessera_wire::decode::<Info>(&bytes).map_err(|e| e.to_string()))
                .collect()
        })
        .await
    }

    /// `ClearCache` — per-child ack/fail counts, not all-or-nothing (§4.5).
    pub async fn clear_cache(&self) -> (u32, u32) {
        let outcomes = self.broadcast(CacheOp::Clear, false, |_| Ok(())).await;
        let acked = outcomes.iter().filter(|(_, r)| r.is_ok()).count() as u32;
        let failed = outcomes.len() as u32 - acked;
        (acked, failed)
    }

    /// `UpdateCache` (§4.5): compute the union of URIs pinned *anywhere* in
    /// the fleet, then re-checkout(pull=true) each one on *every* child,
    /// returning the full per-child, per-URI status matrix.
    pub async fn update_cache(&self) -> Vec<(usize, String, tessera_wire::CacheStatus)> {
        let per_child_lists = self.list_cache().await;
        let mut pinned_uris: BTreeSet<String> = BTreeSet::new();
        for (_, result) in &per_child_lists {
            if let Ok(infos) = result {
                pinned_uris.extend(infos.iter().filter(|i| i.pinned).map(|i| i.uri.clone()));
            }
        }

        let mut matrix = Vec::new();
        for uri in pinned_uris {
            let outcomes = self.checkout_project(&uri, true).await;
            for (child_id, result) in outcomes {
                let status = match result {
                    Ok(info) => info.status,
                    Err(e) => {
                        warn!(child_id, uri = %uri, error = %e, "update_cache: checkout failed");
                        tessera_wire::CacheStatus::Unknown
                    }
                };
                matrix.push((child_id, uri.clone(), status));
            }
        }
        matrix
    }

    pub fn list_plugins(&self) -> Vec<String> {
        self.state
            .config
            .read()
            .engine
            .handlers
            .iter()
            .map(|h| h.scheme.clone())
            .collect()
    }

    pub fn get_config(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&*self.state.config.read())
    }

    /// `SetConfig`: apply hot fields immediately; cold fields are staged
    /// into the running config value too (so `GetConfig` reflects the
    /// intended state) but only take effect on children after `Reload`
    /// performs rolling replacement (§4.5).
    pub fn set_config(
        &self,
        patch_json: serde_json::Value,
    ) -> Result<(Vec<tessera_core::ConfigField>, bool), tessera_core::ConfigError> {
        let patch = ConfigPatch::from_json(patch_json);
        let (candidate, fields) = {
            let current = self.state.config.read();
            patch.apply(&current)?
        };
        let reload_required = fields
            .iter()
            .any(|f| f.tag == tessera_core::config::FieldTag::Cold);
        *self.state.config.write() = candidate;
        Ok((fields, reload_required))
    }

    pub async fn project_info(&self, uri: &str) -> Vec<ChildOutcome<ProjectInfo>> {
        self.broadcast(CacheOp::Info { uri: uri.to_string() }, false, |chunks| {
            chunks
                .into_iter()
                .next()
                .ok_or_else(|| "child returned no ProjectInfo".to_string())
                .and_then(|bytes| tessera_wire::decode(&bytes).map_err(|e| e.to_string()))
        })
        .await
    }

    /// `Catalog` — every child shares an identical search path and handler
    /// set (§3 invariant), so one child's enumeration is representative;
    /// broadcasting and merge-deduplicating guards against a child that
    /// happens to be mid-reload and would otherwise return a partial list.
    pub async fn catalog(&self, location: Option<&str>) -> Vec<CatalogItem> {
        let loc = location.map(str::to_string);
        let outcomes = self
            .broadcast(CacheOp::Catalog { location: loc }, false, |chunks| {
                chunks
                    .into_iter()
                    .map(|bytes| tessera_wire::decode::<CatalogItem>(&bytes).map_err(|e| e.to_string()))
                    .collect::<Result<Vec<_>, _>>()
            })
            .await;

        let mut seen = BTreeSet::new();
        let mut items = Vec::new();
        for (_, result) in outcomes {
            if let Ok(child_items) = result {
                for item in child_items {
                    if seen.insert(item.uri.clone()) {
                        items.push(item);
                    }
                }
            }
        }
        items
    }

    pub fn get_env(&self) -> std::collections::BTreeMap<String, String> {
        std::env::vars().filter(|(k, _)| k.starts_with("CONF_")).collect()
    }

    pub async fn set_serving_status(&self, serving: bool) {
        use tonic_health::ServingStatus;
        let status = if serving {
            ServingStatus::Serving
        } else {
            ServingStatus::NotServing
        };
        let mut health = self.state.health.clone();
        health.set_service_status("tessera.DataPlane", status).await;
        health.set_service_status("tessera.AdminPlane", status).await;
    }

    pub fn stats(&self) -> Stats {
        Stats {
            active_workers: self.state.dispatcher.busy_count() as u32,
            idle_workers: self.state.dispatcher.idle_count() as u32,
            activity: self.state.dispatcher.activity(),
            failure_pressure: self.state.dispatcher.failure_pressure(),
            request_pressure: self.state.dispatcher.request_pressure(),
            uptime_secs: self.state.uptime().as_secs(),
        }
    }

    /// `Reload`: apply every staged cold field by rolling-replacing every
    /// child. Returns the number of children actually replaced.
    pub async fn reload(&self) -> usize {
        self.reload.request_reload().await
    }

    pub async fn dump_cache(&self) -> Vec<(usize, Vec<Info>)> {
        self.list_cache()
            .await
            .into_iter()
            .map(|(id, result)| (id, result.unwrap_or_default()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub active_workers: u32,
    pub idle_workers: u32,
    pub activity: f64,
    pub failure_pressure: f64,
    pub request_pressure: f64,
    pub uptime_secs: u64,
}

#[cfg(test)]
#[path = "admin_tests.rs"]
mod tests;
