#![no_main]
use libfuzzer_sys::fuzz_target;
use tapeson::stringify::Stringifier;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let mut stringifier = Stringifier::new();
        let _ = stringifier.push_string(s);
        let _ = stringifier.finish();

        let mut key_stringifier = Stringifier::new();
        if key_stringifier.object_start().is_ok() {
            let _ = key_stringifier.push_key(s);
            let _ = key_stringifier.push_null();
            let _ = key_stringifier.object_end();
            let _ = key_stringifier.finish();
        }
    }
});
