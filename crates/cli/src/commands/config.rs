// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tesserad-ctl config` — `GetConfig`/`SetConfig` (§4.5, §6). `set` prints
//! the hot/cold diff the daemon actually applied; cold fields are staged,
//! not live, until a `reload`.

use clap::Subcommand;
use tessera_daemon::proto::{ConfigPatchRequest, Empty};

use crate::client::Clients;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the currently active configuration as TOML.
    Get,
    /// Apply a JSON merge patch. Pass `-` to read the patch from stdin.
    Set {
        /// JSON merge patch, e.g. `{"worker":{"max_waiting_requests":64}}`.
        patch: String,
    },
}

pub async fn run(mut clients: Clients, command: ConfigCommand, format: OutputFormat) -> Result<(), ExitError> {
    match command {
        ConfigCommand::Get => {
            let reply = clients.admin.get_config(Empty {}).await?.into_inner();
            let toml_text = String::from_utf8(reply.config_toml)
                .map_err(|e| ExitError::new(1, format!("daemon returned non-UTF-8 config: {e}")))?;
            format_or_json(format, &serde_json::json!({ "config_toml": toml_text }), || print!("{toml_text}"))
                .map_err(|e| ExitError::new(1, e.to_string()))
        }
        ConfigCommand::Set { patch } => {
            let raw = if patch == "-" {
                use std::io::Read;
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(|e| ExitError::new(1, format!("reading patch from stdin: {e}")))?;
                buf
            } else {
                patch
            };
            let patch_json: serde_json::Value =
                serde_json::from_str(&raw).map_err(|e| ExitError::new(2, format!("invalid JSON patch: {e}")))?;
            let request = ConfigPatchRequest { patch_json: serde_json::to_vec(&patch_json).unwrap_or_default() };
            let reply = clients.admin.set_config(request).await?.into_inner();

            format_or_json(
                format,
                &serde_json::json!({
                    "reload_required": reply.reload_required,
                    "fields": reply.fields.iter().map(|f| serde_json::json!({
                        "path": f.path,
                        "tag": f.tag,
                        "old": serde_json::from_slice::<serde_json::Value>(&f.old_json).unwrap_or(serde_json::Value::Null),
                        "new": serde_json::from_slice::<serde_json::Value>(&f.new_json).unwrap_or(serde_json::Value::Null),
                    })).collect::<Vec<_>>(),
                }),
                || {
                    if reply.fields.is_empty() {
                        println!("no fields changed");
                    }
                    for f in &reply.fields {
                        let old: serde_json::Value =
                            serde_json::from_slice(&f.old_json).unwrap_or(serde_json::Value::Null);
                        let new: serde_json::Value =
                            serde_json::from_slice(&f.new_json).unwrap_or(serde_json::Value::Null);
                        println!("[{}] {}: {old} -> {new}", f.tag, f.path);
                    }
                    if reply.reload_required {
                        println!("\nsome fields are cold; run `tesserad-ctl reload` to apply them");
                    }
                },
            )
            .map_err(|e| ExitError::new(1, e.to_string()))
        }
    }
}
