use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tessera_core::Config;
use tessera_wire::{CacheOp, Frame};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex as AsyncMutex;

use super::*;
use crate::child_host::ChildHandle;
use crate::dispatcher::Dispatcher;

/// Drives the other end of a `ChildHandle::for_test` socket, recording every
/// `Checkout` URI it's asked for instead of maintaining real cache state —
/// enough to observe what [`replay_restore_list`] sent.
async fn recording_child(mut read: OwnedReadHalf, write: OwnedWriteHalf, recorded: Arc<AsyncMutex<Vec<String>>>) {
    let write = Arc::new(AsyncMutex::new(write));
    loop {
        match tessera_wire::read_message(&mut read).await {
            Ok(Frame::CacheOp { id, op: CacheOp::Checkout { uri, .. }, .. }) => {
                recorded.lock().await.push(uri.clone());
                let info = tessera_wire::Info::unknown(uri);
                let bytes = tessera_wire::encode(&info).expect("test Info encodes");
                let mut w = write.lock().await;
                let _ = tessera_wire::write_message(&mut *w, &Frame::ReplyHeaders { id, status: 200, headers: Default::default() }).await;
                let _ = tessera_wire::write_message(&mut *w, &Frame::ReplyChunk { id, bytes }).await;
                let _ = tessera_wire::write_message(&mut *w, &Frame::ReplyEnd { id, ok: true, error: None }).await;
            }
            Ok(_) | Err(_) => return,
        }
    }
}

fn fake_recording_child(id: usize) -> (Arc<ChildHandle>, Arc<AsyncMutex<Vec<String>>>) {
    let (daemon_side, child_side) = tokio::net::UnixStream::pair().expect("unix socketpair");
    let (read, write) = child_side.into_split();
    let recorded = Arc::new(AsyncMutex::new(Vec::new()));
    let recorded_clone = recorded.clone();
    tokio::spawn(async move {
        recording_child(read, write, recorded_clone).await;
    });
    (Arc::new(ChildHandle::for_test(id, daemon_side)), recorded)
}

#[tokio::test]
async fn spawn_initial_fleet_fails_fast_on_a_missing_binary() {
    let result = spawn_initial_fleet(
        2,
        std::path::Path::new("/nonexistent/tessera-child"),
        "{}",
        Duration::from_millis(200),
    )
    .await;
    assert!(matches!(result, Err(ExitOutcome::FatalSpawnError)));
}

#[tokio::test]
async fn replay_restore_list_checks_out_every_uri_on_one_child() {
    let (handle, recorded) = fake_recording_child(0);
    let uris = vec!["file:///a.qgs".to_string(), "file:///b.qgs".to_string()];
    replay_restore_list(&handle, &uris).await;
    assert_eq!(*recorded.lock().await, uris);
}

#[tokio::test]
async fn replay_restore_list_all_reaches_every_child_in_the_fleet() {
    let (handle_a, recorded_a) = fake_recording_child(0);
    let (handle_b, recorded_b) = fake_recording_child(1);
    let children = vec![handle_a, handle_b];
    let uris = vec!["file:///a.qgs".to_string()];
    replay_restore_list_all(&children, &uris).await;
    assert_eq!(*recorded_a.lock().await, uris);
    assert_eq!(*recorded_b.lock().await, uris);
}

#[tokio::test]
async fn reload_handle_returns_whatever_the_supervisor_replies() {
    let (tx, mut rx) = mpsc::channel::<oneshot::Sender<usize>>(1);
    tokio::spawn(async move {
        if let Some(reply) = rx.recv().await {
            let _ = reply.send(3);
        }
    });
    let handle = ReloadHandle::new(tx);
    assert_eq!(handle.request_reload().await, 3);
}

#[tokio::test]
async fn reload_handle_returns_zero_if_the_supervisor_is_gone() {
    let (tx, rx) = mpsc::channel::<oneshot::Sender<usize>>(1);
    drop(rx);
    let handle = ReloadHandle::new(tx);
    assert_eq!(handle.request_reload().await, 0);
}

#[tokio::test]
async fn supervisor_shutdown_aborts_its_background_tasks() {
    let (handle, _recorded) = fake_recording_child(0);
    let (dispatcher, dead_rx) = Dispatcher::new(vec![handle], 8, 0.3, Duration::from_secs(1));
    let (health, _health_server) = tonic_health::server::health_reporter();
    let state = Arc::new(DaemonState::new(dispatcher, Config::default(), health, PathBuf::from("/nonexistent")));

    let (supervisor, _reload) = Supervisor::start(state, dead_rx);
    supervisor.shutdown();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(supervisor.self_heal.is_finished());
    assert!(supervisor.reload_task.is_finished());
}
