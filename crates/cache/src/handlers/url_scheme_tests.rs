use super::*;

fn handler() -> UrlSchemeHandler<MapBackend> {
    let backend = MapBackend::new();
    backend.put(
        "proj-a",
        Record {
            last_modified: "v1".to_string(),
            layers: vec!["roads".to_string()],
        },
    );
    UrlSchemeHandler::new("store", backend)
}

#[tokio::test]
async fn resolve_strips_scheme_prefix() {
    let handler = handler();
    let source = handler.resolve("store://proj-a").await.unwrap();
    assert_eq!(source.backend_key, "proj-a");
}

#[tokio::test]
async fn stat_removed_for_unknown_key() {
    let handler = handler();
    let source = handler.resolve("store://missing").await.unwrap();
    assert_eq!(handler.stat(&source).await.unwrap(), StatResult::Removed);
}

#[tokio::test]
async fn open_returns_layers_from_backend() {
    let handler = handler();
    let source = handler.resolve("store://proj-a").await.unwrap();
    let project = handler.open(&source).await.unwrap();
    assert_eq!(project.layers, vec!["roads".to_string()]);
}

#[tokio::test]
async fn enumerate_filters_by_prefix() {
    let backend = MapBackend::new();
    backend.put("a/1", Record { last_modified: "v1".into(), layers: vec![] });
    backend.put("b/1", Record { last_modified: "v1".into(), layers: vec![] });
    let handler = UrlSchemeHandler::new("store", backend);

    let items = handler.enumerate(Some("a/")).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].uri, "store://a/1");
}
