// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property tests for the frame codec: arbitrary byte payloads always
//! survive an encode/decode round trip, and the length prefix always
//! matches the encoded body length.

use proptest::prelude::*;
use tessera_core::RequestId;

use crate::codec::{decode, encode};
use crate::envelope::Frame;

proptest! {
    #[test]
    fn reply_chunk_round_trips_for_arbitrary_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let frame = Frame::ReplyChunk { id: RequestId::new(), bytes };
        let encoded = encode(&frame).expect("encode");
        let decoded: Frame = decode(&encoded).expect("decode");
        prop_assert_eq!(decoded, frame);
    }

    #[test]
    fn reply_end_round_trips_for_arbitrary_error_text(ok in any::<bool>(), error in proptest::option::of("[a-zA-Z0-9 _-]{0,64}")) {
        let frame = Frame::ReplyEnd { id: RequestId::new(), ok, error };
        let encoded = encode(&frame).expect("encode");
        let decoded: Frame = decode(&encoded).expect("decode");
        prop_assert_eq!(decoded, frame);
    }
}
