//! Fuzz target: `Frame` decoding and `Command::decode`
//!
//! Loads arbitrary bytes as a request frame, routes them to the command
//! named by the first byte and asserts that decoding never panics and never
//! moves the cursor past the end of the frame.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use factory_provision::app::commands::Command;
use factory_provision::rpc::codec::Frame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(mut frame) = Frame::<2048>::from_bytes(data) else {
        return;
    };
    let Ok(id) = frame.get_header() else {
        assert!(data.is_empty());
        return;
    };

    let mut command = Command::for_id(id);
    let before = frame.position();
    if command.decode(&mut frame).is_err() {
        assert!(frame.position() >= before);
    }
    assert!(frame.position() <= frame.len());

    // Rewinding must allow the header to be read again.
    frame.rewind();
    assert_eq!(frame.get_header(), Ok(id));
});
