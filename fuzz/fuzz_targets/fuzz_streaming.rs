#![no_main]
use libfuzzer_sys::fuzz_target;
use tapeson::parser::ParserConfig;
use tapeson::streaming::StreamState;

fuzz_target!(|data: &[u8]| {
    // Split the input at a data-dependent point and feed it in two chunks,
    // to exercise the accumulate-then-reparse path across a chunk boundary
    // instead of only ever seeing whole documents at once.
    let split = if data.is_empty() { 0 } else { data[0] as usize % (data.len() + 1) };
    let mut stream = StreamState::new(ParserConfig::default());
    let _ = stream.feed(&data[..split]);
    let _ = stream.feed(&data[split..]);
});
