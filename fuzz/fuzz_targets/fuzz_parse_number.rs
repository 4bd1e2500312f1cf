#![no_main]
use libfuzzer_sys::fuzz_target;
use tapeson::number::parse_number;

fuzz_target!(|data: &[u8]| {
    let _ = parse_number(data, 0);

    // Also probe from a few non-zero offsets, since the scanner is callable
    // mid-buffer wherever the indexer points it.
    for offset in [1, 2, 8] {
        if offset < data.len() {
            let _ = parse_number(data, offset);
        }
    }
});
