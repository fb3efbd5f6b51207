//! Fuzz target for IRC message parsing
//!
//! Feeds arbitrary input to the parser and the line codec and checks that
//! neither panics, and that anything that parses composes into a line
//! that parses again.

#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use std::str;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Framing must cope with any bytes, valid UTF-8 or not.
    let mut codec = bounce::IrcCodec::new();
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = codec.decode(&mut buf) {}

    if let Ok(input) = str::from_utf8(data) {
        if input.len() > bounce::MAX_IRC_LINE_LEN {
            return;
        }

        if let Ok(message) = input.parse::<bounce::Message>() {
            let line = message.to_line();
            let _ = line.parse::<bounce::Message>();
        }
    }
});
