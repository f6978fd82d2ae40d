#![no_main]

use gemway_net::parse_header;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Must not panic on any header bytes.
    if let Some(header) = parse_header(data) {
        assert!(header.status.code() <= 99);
    }
});
