#![no_main]

use libfuzzer_sys::fuzz_target;
use trix::index::{AnyIndex, Triple, WILDCARD};

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary bytes must fail cleanly or yield a usable index
    if let Ok(index) = AnyIndex::from_bytes(data) {
        let _ = index.is_member(&Triple::new(0, 0, 0));
        let _ = index.select(&Triple::new(0, WILDCARD, WILDCARD)).take(16).count();
    }
});
