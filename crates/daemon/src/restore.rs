// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C8: the restore list. Loaded once at startup and replayed into every
//! child — including ones spawned later for self-healing — via
//! `Checkout(pull=true, pin=true)` for each URI (§3 Lifecycles, §4.8).
//!
//! `worker.restore_projects` already names a literal list of URIs in the
//! config schema; `worker.restore_list_source` additionally supports the
//! file-path/external-command form §4.8 describes, merged on top.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestoreListError {
    #[error("reading restore list file {path:?}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("running restore list command {command:?}: {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("restore list command {command:?} exited with status {status}")]
    CommandStatus { command: String, status: i32 },
}

/// Parse newline-delimited URIs, skipping blank lines and `#`-comments.
fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Load URIs from `source`: a `!`-prefixed string runs the rest as a shell
/// command and parses its stdout; otherwise `source` is a file path.
pub fn load(source: &str) -> Result<Vec<String>, RestoreListError> {
    match source.strip_prefix('!') {
        Some(command) => {
            let output = std::process::Command::new("sh")
                .arg("-c")
                .arg(command)
                .output()
                .map_err(|source| RestoreListError::Command {
                    command: command.to_string(),
                    source,
                })?;
            if !output.status.success() {
                return Err(RestoreListError::CommandStatus {
                    command: command.to_string(),
                    status: output.status.code().unwrap_or(-1),
                });
            }
            Ok(parse_lines(&String::from_utf8_lossy(&output.stdout)))
        }
        None => {
            let text = std::fs::read_to_string(source).map_err(|source| RestoreListError::Read {
                path: source.to_string(),
                source,
            })?;
            Ok(parse_lines(&text))
        }
    }
}

/// The full startup restore set: the config's literal `restore_projects`
/// plus whatever `restore_list_source` resolves to, deduplicated.
pub fn resolve(worker: &tessera_core::config::WorkerConfig) -> Result<Vec<String>, RestoreListError> {
    let mut uris = worker.restore_projects.clone();
    if let Some(source) = &worker.restore_list_source {
        uris.extend(load(source)?);
    }
    uris.sort();
    uris.dedup();
    Ok(uris)
}

#[cfg(test)]
#[path = "restore_tests.rs"]
mod tests;
