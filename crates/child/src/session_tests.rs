use std::sync::Arc;

use tessera_cache::{CacheManager, SearchPathTable};
use tessera_core::{FakeClock, RequestId};
use tessera_wire::{encode, EngineOp, Frame, RequestKind};

use super::*;

fn manager() -> CacheManager {
    CacheManager::new(SearchPathTable::new(Vec::new()), 8, Arc::new(FakeClock::new()))
}

/// Drives a `session::run` instance over an in-memory duplex pipe so tests
/// can write frames as the daemon would and read the child's replies back.
struct Harness {
    to_child: tokio::io::DuplexStream,
    from_child: tokio::io::DuplexStream,
    _task: tokio::task::JoinHandle<()>,
}

impl Harness {
    async fn new() -> Self {
        let (daemon_write, child_read) = tokio::io::duplex(64 * 1024);
        let (child_write, daemon_read) = tokio::io::duplex(64 * 1024);
        let task = tokio::spawn(async move {
            let _ = run(child_read, child_write, manager()).await;
        });
        let mut harness = Self {
            to_child: daemon_write,
            from_child: daemon_read,
            _task: task,
        };
        // Drain the startup banner.
        let frame = tessera_wire::read_message(&mut harness.from_child).await.expect("banner");
        assert!(matches!(frame, Frame::Banner { .. }));
        harness
    }

    async fn send(&mut self, frame: &Frame) {
        tessera_wire::write_message(&mut self.to_child, frame).await.expect("write");
    }

    async fn recv(&mut self) -> Frame {
        tessera_wire::read_message(&mut self.from_child).await.expect("read")
    }
}

#[tokio::test]
async fn ping_round_trips() {
    let mut h = Harness::new().await;
    let id = RequestId::new();
    h.send(&Frame::Ping { id }).await;
    let reply = h.recv().await;
    assert_eq!(reply, Frame::ReplyEnd { id, ok: true, error: None });
}

#[tokio::test]
async fn request_runs_engine_op_and_streams_a_chunk() {
    let mut h = Harness::new().await;
    let id = RequestId::new();
    let body = encode(&EngineOp::Ping { echo: "hi".to_string() }).unwrap();
    h.send(&Frame::Request {
        id,
        kind: RequestKind::Api,
        headers: Default::default(),
        body_chunks: vec![body],
    })
    .await;

    let headers = h.recv().await;
    assert!(matches!(headers, Frame::ReplyHeaders { id: rid, status: 200, .. } if rid == id));
    let chunk = h.recv().await;
    assert!(matches!(chunk, Frame::ReplyChunk { id: rid, .. } if rid == id));
    let end = h.recv().await;
    assert_eq!(end, Frame::ReplyEnd { id, ok: true, error: None });
}

#[tokio::test]
async fn cancel_op_interrupts_a_sleeping_request() {
    let mut h = Harness::new().await;
    let id = RequestId::new();
    let body = encode(&EngineOp::Sleep { delay_ms: 60_000 }).unwrap();
    h.send(&Frame::Request {
        id,
        kind: RequestKind::Api,
        headers: Default::default(),
        body_chunks: vec![body],
    })
    .await;

    // Give the request task a moment to register itself as in flight.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    h.send(&Frame::CancelOp { id }).await;

    let end = h.recv().await;
    assert_eq!(
        end,
        Frame::ReplyEnd {
            id,
            ok: false,
            error: Some("cancelled".to_string()),
        }
    );
}

#[tokio::test]
async fn malformed_request_body_fails_the_reply_without_killing_the_loop() {
    let mut h = Harness::new().await;
    let id = RequestId::new();
    h.send(&Frame::Request {
        id,
        kind: RequestKind::Api,
        headers: Default::default(),
        body_chunks: vec![vec![0xff, 0xff, 0xff]],
    })
    .await;
    let end = h.recv().await;
    assert!(matches!(end, Frame::ReplyEnd { id: rid, ok: false, .. } if rid == id));

    // The loop is still alive: a ping after the failure still replies.
    let ping_id = RequestId::new();
    h.send(&Frame::Ping { id: ping_id }).await;
    let reply = h.recv().await;
    assert_eq!(
        reply,
        Frame::ReplyEnd {
            id: ping_id,
            ok: true,
            error: None,
        }
    );
}
