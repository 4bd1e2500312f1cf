#![no_main]
use libfuzzer_sys::fuzz_target;
use tapeson::indexer::build_structural_index;

fuzz_target!(|data: &[u8]| {
    let _ = build_structural_index(data);
});
