//! Fuzz target for the console command parser
//!
//! # Invariants
//!
//! - Parsing never panics, whatever the input
//! - Any action id that parses prints back to an equal id

#![no_main]

use libfuzzer_sys::fuzz_target;
use masque_server::{ActionId, parse_line};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = parse_line(text);

    if let Ok(id) = text.parse::<ActionId>() {
        let reparsed: ActionId = id.to_string().parse().expect("printed id must parse");
        assert_eq!(id, reparsed);
    }
});
