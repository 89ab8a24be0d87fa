// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn child_info_view_carries_the_error_case_through() {
    let info = proto::ChildInfo {
        child_id: 2,
        uri: "file:///tmp/a.qgs".to_string(),
        status: "unknown".to_string(),
        in_cache: false,
        pinned: false,
        hits: 0,
        load_timestamp_ms: None,
        last_modified: None,
        error: Some("connection reset".to_string()),
    };
    let view = ChildInfoView::from(info);
    assert_eq!(view.child_id, 2);
    assert_eq!(view.error.as_deref(), Some("connection reset"));
}

#[test]
fn cache_dump_view_converts_nested_entries() {
    let dump = proto::ChildCacheDump {
        child_id: 0,
        entries: vec![proto::ChildInfo {
            child_id: 0,
            uri: "file:///a.qgs".to_string(),
            status: "unchanged".to_string(),
            in_cache: true,
            pinned: true,
            hits: 3,
            load_timestamp_ms: Some(1000),
            last_modified: None,
            error: None,
        }],
    };
    let view = CacheDumpView::from(dump);
    assert_eq!(view.entries.len(), 1);
    assert!(view.entries[0].pinned);
}
