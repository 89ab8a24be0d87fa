// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration schema for the `server`, `worker`, and per-child `engine`
//! sections, plus the machinery `SetConfig`/`Reload` need: JSON-patch-style
//! merging, hot/cold field tagging, and `CONF_`-prefixed environment
//! overrides.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config as TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("applying environment override {key}: {message}")]
    Env { key: String, message: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("merging config patch: {0}")]
    Merge(#[from] serde_json::Error),
}

/// `server.*` — the gRPC front-end's own knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, e.g. `"0.0.0.0:9000"`.
    pub listen: String,
    /// Per-request wall-clock timeout, in seconds.
    pub timeout_secs: u64,
    /// How long to drain in-flight requests before a forced shutdown.
    pub shutdown_grace_period_secs: u64,
    /// Supervisor aborts with exit code 3 once failure_pressure exceeds this.
    pub max_failure_pressure: f64,
    pub enable_admin_services: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:9000".to_string(),
            timeout_secs: 30,
            shutdown_grace_period_secs: 10,
            max_failure_pressure: 0.5,
            enable_admin_services: true,
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn shutdown_grace_period(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_period_secs)
    }
}

/// `worker.*` — pool sizing and child-lifecycle knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub num_processes: usize,
    pub process_start_timeout_secs: u64,
    pub cancel_timeout_secs: u64,
    pub max_waiting_requests: usize,
    pub max_failure_pressure: f64,
    /// Minimum spacing between respawns of the same child index (§4.4): a
    /// child that keeps dying faster than this is thrashing, so the
    /// supervisor defers its next respawn and feeds the gap into
    /// `failure_pressure` instead of respawning back-to-back.
    pub respawn_min_interval_secs: u64,
    pub restore_projects: Vec<String>,
    /// Optional source of additional pinned URIs, loaded once at startup
    /// and merged with `restore_projects` (§4.8): a `!`-prefixed shell
    /// command whose stdout is parsed the same way, or otherwise a file
    /// path. Newline-delimited, `#`-prefixed lines are comments.
    pub restore_list_source: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            num_processes: 4,
            process_start_timeout_secs: 10,
            cancel_timeout_secs: 2,
            max_waiting_requests: 64,
            max_failure_pressure: 0.5,
            respawn_min_interval_secs: 5,
            restore_projects: Vec::new(),
            restore_list_source: None,
        }
    }
}

impl WorkerConfig {
    pub fn process_start_timeout(&self) -> Duration {
        Duration::from_secs(self.process_start_timeout_secs)
    }

    pub fn cancel_timeout(&self) -> Duration {
        Duration::from_secs(self.cancel_timeout_secs)
    }

    pub fn respawn_min_interval(&self) -> Duration {
        Duration::from_secs(self.respawn_min_interval_secs)
    }
}

/// One entry of the search-path table: a mount prefix (which may contain
/// `{var}` placeholders) and the template URL it rewrites to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPathEntry {
    pub mount_prefix: String,
    pub template_url: String,
}

/// Per-handler settings, keyed by URL scheme (`"file"`, `"s3"`, ...).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HandlerConfig {
    pub scheme: String,
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
}

/// Per-child engine sub-block, identical across every child of a pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_projects: usize,
    pub load_project_on_request: bool,
    pub reload_outdated_project_on_request: bool,
    pub max_chunk_size: usize,
    pub ignore_interrupt_signal: bool,
    pub search_path: Vec<SearchPathEntry>,
    pub handlers: Vec<HandlerConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_projects: 64,
            load_project_on_request: true,
            reload_outdated_project_on_request: true,
            max_chunk_size: 1 << 20,
            ignore_interrupt_signal: false,
            search_path: Vec::new(),
            handlers: Vec::new(),
        }
    }
}

/// The full configuration tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub worker: WorkerConfig,
    pub engine: EngineConfig,
}

impl Config {
    /// Load from a TOML file, then apply `CONF_`-prefixed environment
    /// overrides on top.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Config = toml::from_str(&text)?;
        config.apply_env_overrides(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides of the form `CONF_SERVER__TIMEOUT_SECS=30`.
    /// List/map values are accepted as JSON-encoded strings.
    pub fn apply_env_overrides(
        &mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<(), ConfigError> {
        const PREFIX: &str = "CONF_";
        let mut value = serde_json::to_value(&*self).map_err(ConfigError::Merge)?;
        for (key, raw) in vars {
            let Some(rest) = key.strip_prefix(PREFIX) else {
                continue;
            };
            let path: Vec<String> = rest.split("__").map(|seg| seg.to_lowercase()).collect();
            set_by_path(&mut value, &path, parse_env_value(&raw)).map_err(|message| {
                ConfigError::Env {
                    key: key.clone(),
                    message,
                }
            })?;
        }
        *self = serde_json::from_value(value).map_err(ConfigError::Merge)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.num_processes == 0 {
            return Err(ConfigError::Invalid(
                "worker.num_processes must be >= 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.server.max_failure_pressure) {
            return Err(ConfigError::Invalid(
                "server.max_failure_pressure must be in [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.worker.max_failure_pressure) {
            return Err(ConfigError::Invalid(
                "worker.max_failure_pressure must be in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Whether a dotted config path can be applied live or requires a `Reload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTag {
    Hot,
    Cold,
}

/// Fields that change the shape of the running pool (child count, engine
/// sub-block, search path) are cold: applying them safely requires rolling
/// child replacement. Everything else defaults to hot.
fn field_tag(path: &str) -> FieldTag {
    const COLD_PATHS: &[&str] = &[
        "worker.num_processes",
        "engine.max_projects",
        "engine.search_path",
        "engine.handlers",
        "engine.ignore_interrupt_signal",
        "server.listen",
    ];
    if COLD_PATHS.iter().any(|p| path == *p || path.starts_with(&format!("{p}."))) {
        FieldTag::Cold
    } else {
        FieldTag::Hot
    }
}

/// One field changed by a [`ConfigPatch`], with its tag and before/after values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigField {
    pub path: String,
    pub tag: FieldTag,
    pub old: serde_json::Value,
    pub new: serde_json::Value,
}

impl Serialize for FieldTag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(match self {
            FieldTag::Hot => "hot",
            FieldTag::Cold => "cold",
        })
    }
}

/// A partial JSON merge patch as accepted by the admin plane's `SetConfig`.
#[derive(Debug, Clone)]
pub struct ConfigPatch(serde_json::Value);

impl ConfigPatch {
    pub fn from_json(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Merge this patch onto `base`, validate the result, and return both
    /// the new config and the list of changed fields (with hot/cold tags).
    ///
    /// The caller is responsible for applying only the hot fields
    /// immediately and staging the cold ones pending a `Reload`.
    pub fn apply(&self, base: &Config) -> Result<(Config, Vec<ConfigField>), ConfigError> {
        let base_value = serde_json::to_value(base).map_err(ConfigError::Merge)?;
        let mut merged = base_value.clone();
        merge_json(&mut merged, &self.0);
        let candidate: Config = serde_json::from_value(merged.clone()).map_err(ConfigError::Merge)?;
        candidate.validate()?;

        let mut fields = Vec::new();
        collect_diff(&base_value, &merged, String::new(), &mut fields);
        Ok((candidate, fields))
    }
}

fn merge_json(base: &mut serde_json::Value, patch: &serde_json::Value) {
    match (base, patch) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                if patch_value.is_null() {
                    base_map.remove(key);
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(existing) => merge_json(existing, patch_value),
                    None => {
                        base_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (base_slot, patch_value) => {
            *base_slot = patch_value.clone();
        }
    }
}

fn collect_diff(
    before: &serde_json::Value,
    after: &serde_json::Value,
    prefix: String,
    out: &mut Vec<ConfigField>,
) {
    match (before, after) {
        (serde_json::Value::Object(before_map), serde_json::Value::Object(after_map)) => {
            for (key, after_value) in after_map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                match before_map.get(key) {
                    Some(before_value) => collect_diff(before_value, after_value, path, out),
                    None => out.push(ConfigField {
                        tag: field_tag(&path),
                        path,
                        old: serde_json::Value::Null,
                        new: after_value.clone(),
                    }),
                }
            }
        }
        (before_value, after_value) if before_value != after_value => {
            out.push(ConfigField {
                tag: field_tag(&prefix),
                path: prefix,
                old: before_value.clone(),
                new: after_value.clone(),
            });
        }
        _ => {}
    }
}

fn parse_env_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn set_by_path(value: &mut serde_json::Value, path: &[String], new: serde_json::Value) -> Result<(), String> {
    let Some((head, rest)) = path.split_first() else {
        return Err("empty config path".to_string());
    };
    let obj = value
        .as_object_mut()
        .ok_or_else(|| format!("cannot index into non-object at {head:?}"))?;
    if rest.is_empty() {
        obj.insert(head.clone(), new);
        return Ok(());
    }
    let slot = obj
        .entry(head.clone())
        .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
    set_by_path(slot, rest, new)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
