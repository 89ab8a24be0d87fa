// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn default_format_is_text() {
    assert_eq!(OutputFormat::default(), OutputFormat::Text);
}

#[test]
fn handle_list_reports_empty_message_without_calling_render() {
    let items: Vec<String> = vec![];
    let mut rendered = false;
    handle_list(OutputFormat::Text, &items, "nothing here", |_| rendered = true).unwrap();
    assert!(!rendered);
}

#[test]
fn handle_list_renders_non_empty_text() {
    let items = vec!["a".to_string(), "b".to_string()];
    let mut seen = Vec::new();
    handle_list(OutputFormat::Text, &items, "nothing here", |xs| seen = xs.to_vec()).unwrap();
    assert_eq!(seen, items);
}

#[test]
fn format_or_json_calls_text_fn_for_text_format() {
    let mut called = false;
    format_or_json(OutputFormat::Text, &serde_json::json!({"a": 1}), || called = true).unwrap();
    assert!(called);
}
