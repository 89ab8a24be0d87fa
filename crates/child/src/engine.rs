// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stand-in for the embedded rendering engine (§9: "treat the rendering
//! engine as an opaque blocking callable"). The real engine is out of
//! scope; this module exists so the dispatcher's timeout, cancellation,
//! and streaming-reply contracts are exercisable end to end.

use tessera_core::CancelToken;
use tessera_wire::{EngineOp, EngineReply};

/// Run one [`EngineOp`] to completion, or return `None` if `cancel` fired
/// first. A real engine call would be a blocking FFI invocation on a
/// dedicated thread; here `Sleep` is the only op that actually suspends.
pub async fn run(op: EngineOp, cancel: &CancelToken) -> Option<EngineReply> {
    match op {
        EngineOp::Ping { echo } => Some(EngineReply::Ping { echo }),
        EngineOp::Sleep { delay_ms } => {
            cancel
                .race(tokio::time::sleep(std::time::Duration::from_millis(delay_ms)))
                .await?;
            Some(EngineReply::Slept { delay_ms })
        }
        EngineOp::Opaque { headers, body } => Some(EngineReply::Opaque { headers, body }),
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
