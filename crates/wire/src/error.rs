// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors from the length-prefixed msgpack codec in [`crate::codec`].
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    OversizedFrame { len: u32, max: u32 },

    #[error("stream ended mid-frame")]
    Truncated,

    #[error("i/o error reading or writing a frame: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding frame body: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("decoding frame body: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}
