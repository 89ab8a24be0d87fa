// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The search-path table (§3): an ordered list of `(mount-prefix,
//! template-URL)` pairs. Mount prefixes may contain `{var}` placeholders;
//! at lookup the longest matching prefix wins and the template is
//! instantiated with the same bindings.

use std::collections::BTreeMap;

use tessera_core::SearchPathEntry;

/// An immutable, cloneable view of the search-path table. Reloads replace
/// the whole table atomically (§5) — there is no incremental mutation API.
#[derive(Debug, Clone, Default)]
pub struct SearchPathTable {
    entries: Vec<SearchPathEntry>,
}

impl SearchPathTable {
    pub fn new(entries: Vec<SearchPathEntry>) -> Self {
        Self { entries }
    }

    /// Resolve an incoming path to a handler URI, per the longest-prefix
    /// rule. Returns `None` if no mount prefix's placeholders bind.
    pub fn resolve(&self, path: &str) -> Option<String> {
        self.entries
            .iter()
            .filter_map(|entry| {
                bind(&entry.mount_prefix, path).map(|vars| (entry.mount_prefix.len(), entry, vars))
            })
            .max_by_key(|(len, _, _)| *len)
            .map(|(_, entry, vars)| instantiate(&entry.template_url, &vars))
    }
}

/// Match `pattern` (which may contain `{var}` placeholders) against `input`
/// as a prefix match, returning the captured variable bindings if it binds.
fn bind(pattern: &str, input: &str) -> Option<BTreeMap<String, String>> {
    let mut vars = BTreeMap::new();
    let mut pat_chars = pattern.char_indices().peekable();
    let mut in_pos = 0usize;
    let input_bytes = input.as_bytes();

    while let Some(&(pat_pos, ch)) = pat_chars.peek() {
        if ch == '{' {
            let close = pattern[pat_pos..].find('}')? + pat_pos;
            let var_name = &pattern[pat_pos + 1..close];
            // Advance the pattern iterator past the placeholder.
            while pat_chars.peek().map(|&(p, _)| p < close + 1).unwrap_or(false) {
                pat_chars.next();
            }
            // The value runs until the next literal character in the
            // pattern (or end of pattern/input).
            let next_literal = pattern[close + 1..].chars().next();
            let value_end = match next_literal {
                Some(lit) => input[in_pos..].find(lit).map(|i| in_pos + i).unwrap_or(input.len()),
                None => input.len(),
            };
            if value_end < in_pos {
                return None;
            }
            vars.insert(var_name.to_string(), input[in_pos..value_end].to_string());
            in_pos = value_end;
        } else {
            if in_pos >= input_bytes.len() || input[in_pos..].chars().next() != Some(ch) {
                return None;
            }
            in_pos += ch.len_utf8();
            pat_chars.next();
        }
    }
    Some(vars)
}

fn instantiate(template: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

#[cfg(test)]
#[path = "search_path_tests.rs"]
mod tests;
