use super::*;
use tessera_core::RequestId;

#[test]
fn request_id_extracts_from_addressed_variants() {
    let id = RequestId::new();
    let frame = Frame::Ping { id };
    assert_eq!(frame.request_id(), Some(&id));
}

#[test]
fn banner_and_event_have_no_request_id() {
    assert_eq!(
        Frame::Banner { pid: 1, engine_version: "1.0".into() }.request_id(),
        None
    );
    assert_eq!(
        Frame::Event { severity: crate::types::Severity::Info, text: "hi".into() }.request_id(),
        None
    );
}

#[test]
fn only_reply_end_is_terminal() {
    let id = RequestId::new();
    assert!(Frame::ReplyEnd { id, ok: true, error: None }.is_terminal());
    assert!(!Frame::ReplyChunk { id, bytes: vec![] }.is_terminal());
    assert!(!Frame::Ping { id }.is_terminal());
}
