#![no_main]

use gemway_browser::Document;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Must not panic on any text/gemini input.
        let doc = Document::parse(input);
        let _ = doc.title();
        let _ = Document::parse(&doc.to_gemtext());
    }
});
