// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `file://` storage handler: projects are files under a configured root
//! directory. Loading a project is a stub — the real rendering engine's
//! parser is outside this crate's scope — but staleness detection and
//! enumeration are real filesystem operations.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tessera_wire::CatalogItem;

use crate::error::CacheError;
use crate::handler::{LoadedProject, SourceRef, StatResult, StorageHandler};

#[derive(Debug, Clone)]
pub struct LocalFsHandler {
    root: PathBuf,
}

impl LocalFsHandler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, uri: &str) -> PathBuf {
        let relative = uri.strip_prefix("file://").unwrap_or(uri);
        let relative = relative.trim_start_matches('/');
        self.root.join(relative)
    }
}

#[async_trait]
impl StorageHandler for LocalFsHandler {
    fn scheme(&self) -> &str {
        "file"
    }

    async fn resolve(&self, uri: &str) -> Result<SourceRef, CacheError> {
        let path = self.path_for(uri);
        Ok(SourceRef::new(uri, path.to_string_lossy().into_owned()))
    }

    async fn stat(&self, source: &SourceRef) -> Result<StatResult, CacheError> {
        let path = Path::new(&source.backend_key);
        match std::fs::metadata(path) {
            Ok(meta) => {
                let modified = meta
                    .modified()
                    .map_err(|e| CacheError::Resolve {
                        uri: source.uri.clone(),
                        message: e.to_string(),
                    })?
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis();
                Ok(StatResult::Modified(modified.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StatResult::Removed),
            Err(e) => Err(CacheError::Resolve {
                uri: source.uri.clone(),
                message: e.to_string(),
            }),
        }
    }

    async fn open(&self, source: &SourceRef) -> Result<LoadedProject, CacheError> {
        let path = Path::new(&source.backend_key);
        let contents = std::fs::read_to_string(path).map_err(|e| CacheError::Open {
            uri: source.uri.clone(),
            message: e.to_string(),
        })?;
        let layers = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        Ok(LoadedProject {
            layers,
            diagnostics: Vec::new(),
        })
    }

    async fn enumerate(&self, location: Option<&str>) -> Result<Vec<CatalogItem>, CacheError> {
        let dir = match location {
            Some(loc) => self.path_for(loc),
            None => self.root.clone(),
        };
        let entries = std::fs::read_dir(&dir).map_err(|e| CacheError::Enumerate {
            location: dir.to_string_lossy().into_owned(),
            message: e.to_string(),
        })?;
        let mut items = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::Enumerate {
                location: dir.to_string_lossy().into_owned(),
                message: e.to_string(),
            })?;
            if entry.path().is_file() {
                let name = entry.file_name().to_string_lossy().into_owned();
                items.push(CatalogItem {
                    uri: format!("file:///{name}"),
                    title: Some(name),
                });
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
#[path = "local_fs_tests.rs"]
mod tests;
