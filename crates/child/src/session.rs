// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame read loop: the only thing talking to the daemon over the inherited
//! stdin/stdout pipe.
//!
//! The parent's `ChildHost` only ever has one `Request` in flight per child
//! (§4.2: `send` "serializes one request at a time"), but a `CancelOp` for
//! that request can arrive while it is still running. So the read loop
//! never blocks on a request's completion: each `Request` is spawned onto
//! its own task and the loop goes straight back to `read_message`, or a
//! `CancelOp` would be stuck behind the very request it is meant to
//! interrupt. `CacheOp` and `Ping` are cheap and handled inline.

use std::collections::BTreeMap;
use std::sync::Arc;

use tessera_cache::CacheManager;
use tessera_core::{CancelReason, CancelToken, RequestId};
use tessera_wire::{decode, encode, EngineOp, Frame, FramingError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::ChildError;
use crate::{cache_ops, engine};

type Writer<W> = Arc<Mutex<W>>;
type InFlight = Arc<Mutex<Option<(RequestId, CancelToken)>>>;

/// Drive the frame loop to completion. Returns once the parent closes its
/// end of the pipe (the ordinary shutdown path: the daemon stops writing
/// and the child observes EOF).
pub async fn run<R, W>(mut reader: R, writer: W, mut cache: CacheManager) -> Result<(), ChildError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer: Writer<W> = Arc::new(Mutex::new(writer));
    let in_flight: InFlight = Arc::new(Mutex::new(None));

    send_banner(&writer).await?;

    loop {
        let frame = match tessera_wire::read_message(&mut reader).await {
            Ok(frame) => frame,
            Err(FramingError::Truncated) => {
                info!("parent closed the pipe, exiting");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        match frame {
            Frame::Ping { id } => {
                let _ = send_reply_end(&writer, id, true, None).await;
            }
            Frame::Request {
                id,
                kind: _,
                headers,
                body_chunks,
            } => {
                let cancel = CancelToken::new();
                *in_flight.lock().await = Some((id, cancel.clone()));
                let writer = writer.clone();
                let in_flight = in_flight.clone();
                tokio::spawn(async move {
                    handle_request(id, headers, body_chunks, &cancel, &writer).await;
                    let mut slot = in_flight.lock().await;
                    if matches!(slot.as_ref(), Some((cur, _)) if *cur == id) {
                        *slot = None;
                    }
                });
            }
            Frame::CacheOp { id, op, pin } => {
                handle_cache_op(id, op, pin, &mut cache, &writer).await;
            }
            Frame::CancelOp { id } => {
                let slot = in_flight.lock().await;
                if let Some((current, token)) = slot.as_ref() {
                    if *current == id {
                        token.cancel(CancelReason::CallerAbort);
                    }
                }
            }
            Frame::Banner { .. } | Frame::Event { .. } | Frame::ReplyChunk { .. } | Frame::ReplyHeaders { .. } | Frame::ReplyEnd { .. } => {
                warn!(?frame, "received a parent-only frame from the daemon, ignoring");
            }
        }
    }
}

async fn handle_request<W>(
    id: RequestId,
    _headers: BTreeMap<String, String>,
    body_chunks: Vec<Vec<u8>>,
    cancel: &CancelToken,
    writer: &Writer<W>,
) where
    W: AsyncWrite + Unpin,
{
    let body: Vec<u8> = body_chunks.into_iter().flatten().collect();
    let op: EngineOp = match decode(&body) {
        Ok(op) => op,
        Err(e) => {
            let _ = send_reply_end(writer, id, false, Some(e.to_string())).await;
            return;
        }
    };

    match engine::run(op, cancel).await {
        Some(reply) => match encode(&reply) {
            Ok(bytes) => {
                if send_reply_headers(writer, id, 200).await.is_err() {
                    return;
                }
                if send_reply_chunk(writer, id, bytes).await.is_err() {
                    return;
                }
                let _ = send_reply_end(writer, id, true, None).await;
            }
            Err(e) => {
                let _ = send_reply_end(writer, id, false, Some(e.to_string())).await;
            }
        },
        None => {
            let _ = send_reply_end(writer, id, false, Some("cancelled".to_string())).await;
        }
    }
}

async fn handle_cache_op<W>(
    id: RequestId,
    op: tessera_wire::CacheOp,
    pin: bool,
    cache: &mut CacheManager,
    writer: &Writer<W>,
) where
    W: AsyncWrite + Unpin,
{
    match cache_ops::run(cache, op, pin).await {
        Ok(chunks) => {
            if send_reply_headers(writer, id, 200).await.is_err() {
                return;
            }
            for bytes in chunks {
                if send_reply_chunk(writer, id, bytes).await.is_err() {
                    return;
                }
            }
            let _ = send_reply_end(writer, id, true, None).await;
        }
        Err(e) => {
            let _ = send_reply_end(writer, id, false, Some(e.to_string())).await;
        }
    }
}

async fn send_banner<W>(writer: &Writer<W>) -> Result<(), ChildError>
where
    W: AsyncWrite + Unpin,
{
    let frame = Frame::Banner {
        pid: std::process::id(),
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let mut w = writer.lock().await;
    tessera_wire::write_message(&mut *w, &frame).await?;
    Ok(())
}

async fn send_reply_headers<W>(writer: &Writer<W>, id: RequestId, status: u16) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    let frame = Frame::ReplyHeaders {
        id,
        status,
        headers: BTreeMap::new(),
    };
    let mut w = writer.lock().await;
    tessera_wire::write_message(&mut *w, &frame).await
}

async fn send_reply_chunk<W>(writer: &Writer<W>, id: RequestId, bytes: Vec<u8>) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    let frame = Frame::ReplyChunk { id, bytes };
    let mut w = writer.lock().await;
    tessera_wire::write_message(&mut *w, &frame).await
}

async fn send_reply_end<W>(writer: &Writer<W>, id: RequestId, ok: bool, error: Option<String>) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    let frame = Frame::ReplyEnd { id, ok, error };
    let mut w = writer.lock().await;
    tessera_wire::write_message(&mut *w, &frame).await
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
