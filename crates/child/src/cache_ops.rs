// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executes one [`CacheOp`] against this child's [`CacheManager`] and
//! encodes the result as the sequence of reply-chunk bodies the session
//! loop should send back, ending with an ok/err outcome for the
//! `ReplyEnd`.

use tessera_cache::CacheManager;
use tessera_wire::{encode, CacheOp, FramingError, UpdateResult};

/// Either pins the result of a [`CacheOp::Checkout`] (admin-plane callers
/// always pin) or loads transiently for implicit autoload on request;
/// `cache_ops::run` takes the caller's choice explicitly rather than
/// guessing from the op, since `CacheOp` itself carries no pin bit (§4.3).
pub async fn run(manager: &mut CacheManager, op: CacheOp, pin: bool) -> Result<Vec<Vec<u8>>, FramingError> {
    match op {
        CacheOp::Checkout { uri, pull } => {
            let info = manager
                .checkout(&uri, pull, pin)
                .await
                .map_err(|e| FramingError::Io(std::io::Error::other(e.to_string())))?;
            Ok(vec![encode(&info)?])
        }
        CacheOp::Drop { uri } => {
            let info = manager
                .drop_entry(&uri)
                .await
                .map_err(|e| FramingError::Io(std::io::Error::other(e.to_string())))?;
            Ok(vec![encode(&info)?])
        }
        CacheOp::List => manager.list().iter().map(encode).collect(),
        CacheOp::Clear => {
            manager.clear();
            Ok(Vec::new())
        }
        CacheOp::Update => {
            let results = manager.update_all().await;
            results
                .into_iter()
                .map(|(uri, status)| encode(&UpdateResult { uri, status }))
                .collect()
        }
        CacheOp::Catalog { location } => {
            let items = manager
                .catalog(location.as_deref())
                .await
                .map_err(|e| FramingError::Io(std::io::Error::other(e.to_string())))?;
            items.iter().map(encode).collect()
        }
        CacheOp::Info { uri } => {
            let info = manager
                .project_info(&uri)
                .map_err(|e| FramingError::Io(std::io::Error::other(e.to_string())))?;
            Ok(vec![encode(&info)?])
        }
    }
}

#[cfg(test)]
#[path = "cache_ops_tests.rs"]
mod tests;
