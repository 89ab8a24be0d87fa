use super::*;

#[tokio::test]
async fn resolve_and_open_reads_layer_lines() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.qgs"), "# comment\nlayerA\nlayerB\n").unwrap();
    let handler = LocalFsHandler::new(dir.path());

    let source = handler.resolve("file:///a.qgs").await.unwrap();
    let project = handler.open(&source).await.unwrap();

    assert_eq!(project.layers, vec!["layerA".to_string(), "layerB".to_string()]);
}

#[tokio::test]
async fn stat_reports_removed_for_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let handler = LocalFsHandler::new(dir.path());
    let source = handler.resolve("file:///missing.qgs").await.unwrap();

    let stat = handler.stat(&source).await.unwrap();
    assert_eq!(stat, StatResult::Removed);
}

#[tokio::test]
async fn stat_reports_modified_marker_for_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.qgs"), "layerA\n").unwrap();
    let handler = LocalFsHandler::new(dir.path());
    let source = handler.resolve("file:///a.qgs").await.unwrap();

    let stat = handler.stat(&source).await.unwrap();
    assert!(matches!(stat, StatResult::Modified(_)));
}

#[tokio::test]
async fn enumerate_lists_files_in_root() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.qgs"), "x").unwrap();
    std::fs::write(dir.path().join("b.qgs"), "y").unwrap();
    let handler = LocalFsHandler::new(dir.path());

    let mut items = handler.enumerate(None).await.unwrap();
    items.sort_by(|a, b| a.uri.cmp(&b.uri));

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].uri, "file:///a.qgs");
}
