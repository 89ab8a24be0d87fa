// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tagged-sum frame body exchanged over the parent-child wire protocol
//! (§4.1): every message on the stream is one of these variants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tessera_core::RequestId;

use crate::types::{CacheOp, RequestKind, Severity};

/// One frame body. Serialized as `len(u32 BE) || msgpack(Frame)` by
/// [`crate::codec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// A child-handshake banner, sent once by the child immediately after
    /// spawn. Not itself part of the request/reply exchange.
    Banner { pid: u32, engine_version: String },

    /// A unit of work dispatched to an idle child. `body_chunks` lets a
    /// caller stream a large request body without buffering it whole.
    Request {
        id: RequestId,
        kind: RequestKind,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        #[serde(default)]
        body_chunks: Vec<Vec<u8>>,
    },

    /// A cache-manager operation, addressed to the child's own cache.
    /// `pin` is decided by the sender: the admin plane always pins
    /// entries it loads; implicit autoload on request never does (§4.3).
    CacheOp {
        id: RequestId,
        op: CacheOp,
        #[serde(default)]
        pin: bool,
    },

    /// Liveness probe; expects a bare `ReplyEnd { ok: true, .. }` back.
    Ping { id: RequestId },

    /// Ask the child to abandon the in-flight request named by `id`.
    CancelOp { id: RequestId },

    /// One chunk of a streamed reply body. Zero or more precede the
    /// terminal `ReplyEnd`.
    ReplyChunk { id: RequestId, bytes: Vec<u8> },

    /// The first frame of any reply: an HTTP-equivalent status plus headers.
    ReplyHeaders {
        id: RequestId,
        status: u16,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },

    /// Terminal frame for a request. Exactly one is sent per request,
    /// whether it succeeded, failed, or was cancelled.
    ReplyEnd {
        id: RequestId,
        ok: bool,
        #[serde(default)]
        error: Option<String>,
    },

    /// Out-of-band diagnostic, not tied to any one request id.
    Event { severity: Severity, text: String },
}

impl Frame {
    /// The request id this frame belongs to, if any (banners and events
    /// carry none).
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Frame::Request { id, .. }
            | Frame::CacheOp { id, .. }
            | Frame::Ping { id }
            | Frame::CancelOp { id }
            | Frame::ReplyChunk { id, .. }
            | Frame::ReplyHeaders { id, .. }
            | Frame::ReplyEnd { id, .. } => Some(id),
            Frame::Banner { .. } | Frame::Event { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Frame::ReplyEnd { .. })
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
