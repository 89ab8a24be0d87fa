use super::*;

fn entry(mount_prefix: &str, template_url: &str) -> SearchPathEntry {
    SearchPathEntry {
        mount_prefix: mount_prefix.to_string(),
        template_url: template_url.to_string(),
    }
}

#[test]
fn resolves_simple_placeholder() {
    let table = SearchPathTable::new(vec![entry("/projects/{name}/", "file:///data/{name}.qgs")]);
    let resolved = table.resolve("/projects/alpha/").unwrap();
    assert_eq!(resolved, "file:///data/alpha.qgs");
}

#[test]
fn no_match_returns_none() {
    let table = SearchPathTable::new(vec![entry("/projects/{name}/", "file:///data/{name}.qgs")]);
    assert!(table.resolve("/other/alpha/").is_none());
}

#[test]
fn longest_prefix_wins_among_overlapping_entries() {
    let table = SearchPathTable::new(vec![
        entry("/projects/{name}/", "file:///data/{name}.qgs"),
        entry("/projects/special/{name}/", "store://special/{name}"),
    ]);
    let resolved = table.resolve("/projects/special/alpha/").unwrap();
    assert_eq!(resolved, "store://special/alpha");
}

#[test]
fn literal_mount_prefix_with_no_placeholder() {
    let table = SearchPathTable::new(vec![entry("/fixed/", "file:///data/fixed.qgs")]);
    assert_eq!(table.resolve("/fixed/"), Some("file:///data/fixed.qgs".to_string()));
}

#[test]
fn multiple_placeholders_bind_independently() {
    let table = SearchPathTable::new(vec![entry(
        "/tenants/{tenant}/projects/{name}/",
        "store://{tenant}/{name}",
    )]);
    let resolved = table.resolve("/tenants/acme/projects/alpha/").unwrap();
    assert_eq!(resolved, "store://acme/alpha");
}
