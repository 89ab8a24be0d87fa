use std::time::Duration;

use tessera_core::{CancelReason, CancelToken, RequestId};
use tessera_wire::{decode, encode, EngineOp, EngineReply, Frame};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex as AsyncMutex;

use super::*;

/// Drives the *other* end of a `ChildHandle::for_test` socket as a
/// minimal stand-in for `tessera-child`'s session loop: enough to answer
/// `Ping`, `Request{Ping|Sleep|Opaque}`, and `CancelOp` for dispatcher
/// tests, without depending on the real `tessera-child` binary.
async fn fake_child(mut read: OwnedReadHalf, write: OwnedWriteHalf) {
    let write = Arc::new(AsyncMutex::new(write));
    let current: Arc<AsyncMutex<Option<(RequestId, CancelToken)>>> = Arc::new(AsyncMutex::new(None));
    loop {
        match tessera_wire::read_message(&mut read).await {
            Ok(Frame::Ping { id }) => {
                send_end(&write, id, true, None).await;
            }
            Ok(Frame::Request { id, body_chunks, .. }) => {
                let cancel = CancelToken::new();
                *current.lock().await = Some((id, cancel.clone()));
                let write = write.clone();
                let current = current.clone();
                tokio::spawn(async move {
                    let body: Vec<u8> = body_chunks.into_iter().flatten().collect();
                    let op: EngineOp = decode(&body).expect("test body decodes");
                    match op {
                        EngineOp::Ping { echo } => {
                            reply_ok(&write, id, EngineReply::Ping { echo }).await;
                        }
                        EngineOp::Sleep { delay_ms } => {
                            match cancel.race(tokio::time::sleep(Duration::from_millis(delay_ms))).await {
                                Some(()) => reply_ok(&write, id, EngineReply::Slept { delay_ms }).await,
                                None => send_end(&write, id, false, Some("cancelled".to_string())).await,
                            }
                        }
                        EngineOp::Opaque { headers, body } => {
                            reply_ok(&write, id, EngineReply::Opaque { headers, body }).await;
                        }
                    }
                    let mut slot = current.lock().await;
                    if matches!(slot.as_ref(), Some((cur, _)) if *cur == id) {
                        *slot = None;
                    }
                });
            }
            Ok(Frame::CancelOp { id }) => {
                if let Some((current_id, token)) = current.lock().await.as_ref() {
                    if *current_id == id {
                        token.cancel(CancelReason::CallerAbort);
                    }
                }
            }
            Ok(_) | Err(_) => return,
        }
    }
}

async fn reply_ok(write: &Arc<AsyncMutex<OwnedWriteHalf>>, id: RequestId, reply: EngineReply) {
    let bytes = encode(&reply).expect("test reply encodes");
    let mut w = write.lock().await;
    let _ = tessera_wire::write_message(&mut *w, &Frame::ReplyHeaders { id, status: 200, headers: Default::default() }).await;
    let _ = tessera_wire::write_message(&mut *w, &Frame::ReplyChunk { id, bytes }).await;
    let _ = tessera_wire::write_message(&mut *w, &Frame::ReplyEnd { id, ok: true, error: None }).await;
}

async fn send_end(write: &Arc<AsyncMutex<OwnedWriteHalf>>, id: RequestId, ok: bool, error: Option<String>) {
    let mut w = write.lock().await;
    let _ = tessera_wire::write_message(&mut *w, &Frame::ReplyEnd { id, ok, error }).await;
}

async fn spawn_pool(n: usize) -> Vec<Arc<ChildHandle>> {
    let mut children = Vec::new();
    for idx in 0..n {
        let (daemon_side, child_side) = tokio::net::UnixStream::pair().expect("unix socketpair");
        let (read, write) = child_side.into_split();
        tokio::spawn(fake_child(read, write));
        children.push(Arc::new(ChildHandle::for_test(idx, daemon_side)));
    }
    children
}

async fn collect(mut rx: mpsc::UnboundedReceiver<ReplyFrame>) -> Vec<ReplyFrame> {
    let mut out = Vec::new();
    while let Some(frame) = rx.recv().await {
        let terminal = matches!(frame, ReplyFrame::End { .. });
        out.push(frame);
        if terminal {
            break;
        }
    }
    out
}

fn ping_body(echo: &str) -> Vec<Vec<u8>> {
    vec![encode(&EngineOp::Ping { echo: echo.to_string() }).unwrap()]
}

fn sleep_body(delay_ms: u64) -> Vec<Vec<u8>> {
    vec![encode(&EngineOp::Sleep { delay_ms }).unwrap()]
}

#[tokio::test]
async fn two_concurrent_pings_complete_on_separate_children() {
    let children = spawn_pool(2).await;
    let (dispatcher, _dead) = Dispatcher::new(children, 8, 0.3, Duration::from_secs(1));

    let a = dispatcher.dispatch(
        RequestKind::Api,
        Default::default(),
        ping_body("abc"),
        Duration::from_secs(5),
        CancelToken::new(),
    );
    let b = dispatcher.dispatch(
        RequestKind::Api,
        Default::default(),
        ping_body("abc"),
        Duration::from_secs(5),
        CancelToken::new(),
    );
    let (rx_a, rx_b) = tokio::join!(a, b);
    let frames_a = collect(rx_a.expect("first ping dispatches")).await;
    let frames_b = collect(rx_b.expect("second ping dispatches")).await;

    assert!(matches!(frames_a.last(), Some(ReplyFrame::End { ok: true, .. })));
    assert!(matches!(frames_b.last(), Some(ReplyFrame::End { ok: true, .. })));
}

#[tokio::test]
async fn queue_saturation_rejects_the_second_request_immediately() {
    let children = spawn_pool(1).await;
    let (dispatcher, _dead) = Dispatcher::new(children, 0, 0.3, Duration::from_secs(1));

    // Occupy the single child with a slow request so the next one has
    // nowhere to go and no room to wait (max_waiting = 0).
    let busy = dispatcher
        .dispatch(RequestKind::Api, Default::default(), sleep_body(200), Duration::from_secs(5), CancelToken::new())
        .await
        .expect("first request dispatches");

    let rejected = dispatcher
        .dispatch(RequestKind::Api, Default::default(), ping_body("x"), Duration::from_secs(5), CancelToken::new())
        .await;
    assert!(matches!(rejected, Err(DispatchError::Unavailable)));

    collect(busy).await;
}

#[tokio::test]
async fn timeout_kills_the_child_and_it_is_reported_dead() {
    let children = spawn_pool(1).await;
    let (dispatcher, mut dead) = Dispatcher::new(children, 8, 0.3, Duration::from_millis(50));

    let rx = dispatcher
        .dispatch(
            RequestKind::Api,
            Default::default(),
            sleep_body(10_000),
            Duration::from_millis(50),
            CancelToken::new(),
        )
        .await
        .expect("dispatches onto the only child");

    // The fake child honors CancelOp by racing it against its own Sleep and
    // replying well within cancel_timeout, so the dispatcher should not need
    // to escalate to a kill signal.
    let frames = collect(rx).await;
    assert!(matches!(frames.last(), Some(ReplyFrame::End { ok: false, .. })));
    assert!(dead.try_recv().is_err(), "cooperative cancellation should not retire the child");
}

#[tokio::test]
async fn caller_cancellation_interrupts_a_sleeping_request() {
    let children = spawn_pool(1).await;
    let (dispatcher, _dead) = Dispatcher::new(children, 8, 0.3, Duration::from_secs(1));

    let cancel = CancelToken::new();
    let rx = dispatcher
        .dispatch(RequestKind::Api, Default::default(), sleep_body(10_000), Duration::from_secs(5), cancel.clone())
        .await
        .expect("dispatches");

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel(tessera_core::CancelReason::CallerAbort);

    let frames = collect(rx).await;
    assert!(matches!(frames.last(), Some(ReplyFrame::End { ok: false, .. })));
}

#[tokio::test]
async fn a_freed_child_is_handed_to_the_oldest_waiter_first() {
    let children = spawn_pool(1).await;
    let (dispatcher, _dead) = Dispatcher::new(children, 8, 0.3, Duration::from_secs(1));

    let first = dispatcher
        .dispatch(RequestKind::Api, Default::default(), sleep_body(50), Duration::from_secs(5), CancelToken::new())
        .await
        .expect("first request occupies the only child");

    // Two more requests queue up behind it; both must eventually succeed
    // once the child frees up, in FIFO order.
    let d2 = dispatcher.clone();
    let second = tokio::spawn(async move {
        d2.dispatch(RequestKind::Api, Default::default(), ping_body("q2"), Duration::from_secs(5), CancelToken::new())
            .await
    });
    tokio::time::sleep(Duration::from_millis(5)).await;
    let d3 = dispatcher.clone();
    let third = tokio::spawn(async move {
        d3.dispatch(RequestKind::Api, Default::default(), ping_body("q3"), Duration::from_secs(5), CancelToken::new())
            .await
    });

    collect(first).await;
    let rx2 = second.await.unwrap().expect("second request eventually dispatches");
    let frames2 = collect(rx2).await;
    assert!(matches!(frames2.last(), Some(ReplyFrame::End { ok: true, .. })));
    let rx3 = third.await.unwrap().expect("third request eventually dispatches");
    let frames3 = collect(rx3).await;
    assert!(matches!(frames3.last(), Some(ReplyFrame::End { ok: true, .. })));
}
