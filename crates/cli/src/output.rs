// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::ValueEnum;
use serde::Serialize;

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Format-branch helper for non-list commands (stats, config, info).
///
/// Renders as JSON when `format` is `Json`, otherwise calls `text_fn`.
pub fn format_or_json<T: Serialize>(
    format: OutputFormat,
    data: &T,
    text_fn: impl FnOnce(),
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
        OutputFormat::Text => text_fn(),
    }
    Ok(())
}

/// Render a list as a text table or a JSON array. Handles the empty-list
/// branch so callers only write the non-empty text path.
pub fn handle_list<T: Serialize>(
    format: OutputFormat,
    items: &[T],
    empty_msg: &str,
    render_text: impl FnOnce(&[T]),
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
        OutputFormat::Text => {
            if items.is_empty() {
                println!("{empty_msg}");
            } else {
                render_text(items);
            }
        }
    }
    Ok(())
}
