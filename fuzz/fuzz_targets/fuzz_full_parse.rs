#![no_main]
use libfuzzer_sys::fuzz_target;
use tapeson::indexer::validate_utf8;
use tapeson::parser::{parse, ParserConfig};

fuzz_target!(|data: &[u8]| {
    // Exercise the full parse path: structural index, UTF-8 validation,
    // whitespace/string/number scanning, container matching, tape building.
    let _ = parse(data, ParserConfig::default());

    // UTF-8 validation is also reachable on its own ahead of a parse.
    let _ = validate_utf8(data);
});
