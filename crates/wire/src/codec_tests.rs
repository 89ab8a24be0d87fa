use super::*;
use crate::envelope::Frame;
use crate::types::{CacheOp, RequestKind};
use tessera_core::RequestId;

#[test]
fn encode_returns_msgpack_without_length_prefix() {
    let frame = Frame::Ping { id: RequestId::new() };
    let encoded = encode(&frame).expect("encode failed");
    // msgpack has no leading length word the way write_frame's output does
    assert!(!encoded.is_empty());
    let decoded: Frame = decode(&encoded).expect("decode failed");
    assert_eq!(decoded, frame);
}

#[tokio::test]
async fn read_write_frame_roundtrip() {
    let original = b"hello world";

    let mut buffer = Vec::new();
    write_frame(&mut buffer, original).await.expect("write failed");

    assert_eq!(buffer.len(), 4 + original.len());

    let mut cursor = std::io::Cursor::new(buffer);
    let read_back = read_frame(&mut cursor, DEFAULT_MAX_FRAME_SIZE).await.expect("read failed");

    assert_eq!(read_back, original);
}

#[tokio::test]
async fn write_frame_adds_length_prefix() {
    let data = b"test data";

    let mut buffer = Vec::new();
    write_frame(&mut buffer, data).await.expect("write failed");

    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;

    assert_eq!(len, data.len());
    assert_eq!(&buffer[4..], data);
}

#[tokio::test]
async fn read_frame_rejects_oversized_frame() {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&100u32.to_be_bytes());
    buffer.extend_from_slice(&[0u8; 100]);

    let mut cursor = std::io::Cursor::new(buffer);
    let err = read_frame(&mut cursor, 10).await.unwrap_err();
    assert!(matches!(err, FramingError::OversizedFrame { len: 100, max: 10 }));
}

#[tokio::test]
async fn read_frame_reports_truncated_stream() {
    let mut cursor = std::io::Cursor::new(vec![0u8, 0, 0, 5, b'a', b'b']);
    let err = read_frame(&mut cursor, DEFAULT_MAX_FRAME_SIZE).await.unwrap_err();
    assert!(matches!(err, FramingError::Truncated));
}

#[tokio::test]
async fn read_write_message_roundtrip() {
    let frame = Frame::ReplyEnd {
        id: RequestId::new(),
        ok: true,
        error: None,
    };

    let mut buffer = Vec::new();
    write_message(&mut buffer, &frame).await.expect("write failed");

    let mut cursor = std::io::Cursor::new(buffer);
    let read_back = read_message(&mut cursor).await.expect("read failed");

    assert_eq!(read_back, frame);
}

#[tokio::test]
async fn read_write_message_preserves_cache_op_payload() {
    let frame = Frame::CacheOp {
        id: RequestId::new(),
        op: CacheOp::Checkout {
            uri: "file:///tmp/project.qgs".to_string(),
            pull: true,
        },
    };

    let mut buffer = Vec::new();
    write_message(&mut buffer, &frame).await.unwrap();
    let mut cursor = std::io::Cursor::new(buffer);
    let read_back = read_message(&mut cursor).await.unwrap();

    assert_eq!(read_back, frame);
}

#[tokio::test]
async fn two_messages_back_to_back_are_read_independently() {
    let a = Frame::Ping { id: RequestId::new() };
    let b = Frame::Request {
        id: RequestId::new(),
        kind: RequestKind::Api,
        headers: Default::default(),
        body_chunks: vec![b"chunk".to_vec()],
    };

    let mut buffer = Vec::new();
    write_message(&mut buffer, &a).await.unwrap();
    write_message(&mut buffer, &b).await.unwrap();

    let mut cursor = std::io::Cursor::new(buffer);
    let read_a = read_message(&mut cursor).await.unwrap();
    let read_b = read_message(&mut cursor).await.unwrap();

    assert_eq!(read_a, a);
    assert_eq!(read_b, b);
}
