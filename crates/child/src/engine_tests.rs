use std::collections::BTreeMap;
use std::time::Duration;

use tessera_core::CancelReason;

use super::*;

#[tokio::test]
async fn ping_echoes_immediately() {
    let cancel = CancelToken::new();
    let reply = run(EngineOp::Ping { echo: "abc".to_string() }, &cancel).await;
    assert_eq!(reply, Some(EngineReply::Ping { echo: "abc".to_string() }));
}

#[tokio::test]
async fn opaque_echoes_headers_and_body() {
    let cancel = CancelToken::new();
    let mut headers = BTreeMap::new();
    headers.insert("content-type".to_string(), "application/json".to_string());
    let reply = run(
        EngineOp::Opaque {
            headers: headers.clone(),
            body: vec![1, 2, 3],
        },
        &cancel,
    )
    .await;
    assert_eq!(reply, Some(EngineReply::Opaque { headers, body: vec![1, 2, 3] }));
}

#[tokio::test]
async fn sleep_completes_without_cancellation() {
    let cancel = CancelToken::new();
    let reply = run(EngineOp::Sleep { delay_ms: 1 }, &cancel).await;
    assert_eq!(reply, Some(EngineReply::Slept { delay_ms: 1 }));
}

#[tokio::test]
async fn sleep_returns_none_once_cancelled() {
    let cancel = CancelToken::new();
    let child = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        child.cancel(CancelReason::DeadlineExceeded);
    });
    let reply = run(EngineOp::Sleep { delay_ms: 60_000 }, &cancel).await;
    assert_eq!(reply, None);
}
