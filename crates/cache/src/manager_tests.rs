use super::*;
use std::sync::Arc;

use tessera_core::FakeClock;

use crate::handlers::local_fs::LocalFsHandler;

fn manager_with_root(root: &std::path::Path, max_projects: usize) -> CacheManager {
    let mut manager = CacheManager::new(SearchPathTable::default(), max_projects, Arc::new(FakeClock::new()));
    manager.register_handler(Arc::new(LocalFsHandler::new(root)));
    manager
}

#[tokio::test]
async fn checkout_pull_false_on_clean_cache_is_new_and_not_in_cache() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.qgs"), "layerA\n").unwrap();
    let mut manager = manager_with_root(dir.path(), 10);

    let info = manager.checkout("file:///a.qgs", false, false).await.unwrap();
    assert_eq!(info.status, CacheStatus::New);
    assert!(!info.in_cache);
}

#[tokio::test]
async fn full_pull_transition_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.qgs");
    std::fs::write(&path, "layerA\n").unwrap();
    let mut manager = manager_with_root(dir.path(), 10);
    let uri = "file:///a.qgs";

    let info = manager.checkout(uri, false, false).await.unwrap();
    assert_eq!(info.status, CacheStatus::New);

    let info = manager.checkout(uri, true, true).await.unwrap();
    assert_eq!(info.status, CacheStatus::Unchanged);
    assert!(info.in_cache);
    assert!(info.pinned);

    // Touch the file so its mtime (our staleness marker) changes.
    std::thread::sleep(std::time::Duration::from_millis(10));
    std::fs::write(&path, "layerA\nlayerB\n").unwrap();

    let info = manager.checkout(uri, false, false).await.unwrap();
    assert_eq!(info.status, CacheStatus::NeedUpdate);

    let info = manager.checkout(uri, true, false).await.unwrap();
    assert_eq!(info.status, CacheStatus::Unchanged);

    std::fs::remove_file(&path).unwrap();

    let info = manager.checkout(uri, false, false).await.unwrap();
    assert_eq!(info.status, CacheStatus::Removed);

    let info = manager.checkout(uri, true, false).await.unwrap();
    assert_eq!(info.status, CacheStatus::NotFound);
    assert!(!info.in_cache);
}

#[tokio::test]
async fn drop_removes_entry_regardless_of_pin() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.qgs"), "layerA\n").unwrap();
    let mut manager = manager_with_root(dir.path(), 10);
    manager.checkout("file:///a.qgs", true, true).await.unwrap();

    let info = manager.drop_entry("file:///a.qgs").await.unwrap();
    assert!(!info.in_cache);
    assert!(manager.list().is_empty());
}

#[tokio::test]
async fn unpinned_entries_are_bounded_by_max_projects() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a", "b", "c"] {
        std::fs::write(dir.path().join(format!("{name}.qgs")), "x\n").unwrap();
    }
    let mut manager = manager_with_root(dir.path(), 2);

    manager.checkout("file:///a.qgs", true, false).await.unwrap();
    manager.checkout("file:///b.qgs", true, false).await.unwrap();
    manager.checkout("file:///c.qgs", true, false).await.unwrap();

    assert_eq!(manager.list().len(), 2);
}

#[tokio::test]
async fn pinned_entries_are_exempt_from_lru_eviction() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a", "b", "c"] {
        std::fs::write(dir.path().join(format!("{name}.qgs")), "x\n").unwrap();
    }
    let mut manager = manager_with_root(dir.path(), 1);

    manager.checkout("file:///a.qgs", true, true).await.unwrap();
    manager.checkout("file:///b.qgs", true, false).await.unwrap();
    manager.checkout("file:///c.qgs", true, false).await.unwrap();

    let uris: Vec<String> = manager.list().into_iter().map(|i| i.uri).collect();
    assert!(uris.contains(&"file:///a.qgs".to_string()));
}

#[tokio::test]
async fn clear_drops_pinned_entries_too() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.qgs"), "x\n").unwrap();
    let mut manager = manager_with_root(dir.path(), 10);
    manager.checkout("file:///a.qgs", true, true).await.unwrap();

    manager.clear();
    assert!(manager.list().is_empty());
}

#[tokio::test]
async fn project_info_returns_layers_for_loaded_project() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.qgs"), "layerA\nlayerB\n").unwrap();
    let mut manager = manager_with_root(dir.path(), 10);
    manager.checkout("file:///a.qgs", true, false).await.unwrap();

    let info = manager.project_info("file:///a.qgs").unwrap();
    assert_eq!(info.layers, vec!["layerA".to_string(), "layerB".to_string()]);
}

#[tokio::test]
async fn update_all_reloads_stale_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.qgs");
    std::fs::write(&path, "layerA\n").unwrap();
    let mut manager = manager_with_root(dir.path(), 10);
    manager.checkout("file:///a.qgs", true, false).await.unwrap();

    std::thread::sleep(std::time::Duration::from_millis(10));
    std::fs::write(&path, "layerA\nlayerB\n").unwrap();

    let results = manager.update_all().await;
    assert_eq!(results, vec![("file:///a.qgs".to_string(), CacheStatus::Unchanged)]);

    let info = manager.project_info("file:///a.qgs").unwrap();
    assert_eq!(info.layers.len(), 2);
}
