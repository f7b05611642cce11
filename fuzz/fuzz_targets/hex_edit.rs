#![no_main]
use libfuzzer_sys::fuzz_target;
use memview::core::row::{format_hex, parse_hex, Row};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(bytes) = parse_hex(text) {
            assert_eq!(parse_hex(&format_hex(&bytes)).ok(), Some(bytes));
        }
    }
    for index in 0..=data.len() / 16 {
        let _ = Row::resolve(index, 0x1000, data.len(), data);
    }
});
