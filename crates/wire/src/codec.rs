// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `len(u32, big-endian) || msgpack(body)` framing over any
//! `AsyncRead`/`AsyncWrite` byte stream, per the parent-child wire protocol.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FramingError;
use crate::envelope::Frame;

/// Default oversized-frame limit: 16 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Serialize a value to msgpack. Field names are kept (not shortened to
/// positional tuples) so frames stay debuggable on the wire.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, FramingError> {
    Ok(rmp_serde::to_vec_named(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, FramingError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Read one length-prefixed frame's raw body (no decoding), enforcing
/// `max_frame_size`.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: u32) -> Result<Vec<u8>, FramingError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(FramingError::Truncated),
        Err(e) => return Err(FramingError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > max_frame_size {
        return Err(FramingError::OversizedFrame {
            len,
            max: max_frame_size,
        });
    }
    let mut body = vec![0u8; len as usize];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => FramingError::Truncated,
            _ => FramingError::Io(e),
        })?;
    Ok(body)
}

/// Write one length-prefixed frame from a raw body.
pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(body.len()).map_err(|_| FramingError::OversizedFrame {
        len: u32::MAX,
        max: DEFAULT_MAX_FRAME_SIZE,
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read and decode one [`Frame`] from the stream.
pub async fn read_message<R>(reader: &mut R) -> Result<Frame, FramingError>
where
    R: AsyncRead + Unpin,
{
    read_message_with_limit(reader, DEFAULT_MAX_FRAME_SIZE).await
}

pub async fn read_message_with_limit<R>(reader: &mut R, max_frame_size: u32) -> Result<Frame, FramingError>
where
    R: AsyncRead + Unpin,
{
    let body = read_frame(reader, max_frame_size).await?;
    decode(&body)
}

/// Encode and write one [`Frame`] to the stream.
pub async fn write_message<W>(writer: &mut W, frame: &Frame) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    let body = encode(frame)?;
    write_frame(writer, &body).await
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
