//! Spec 6's external interface: a stable, ABI-style surface addressable
//! from any host that can call C functions and share a byte buffer. This
//! replaces the teacher's Erlang NIF surface (`rustler::init!`, atoms,
//! `#[rustler::nif]` exports) with `extern "C"` exports over a single
//! thread-local core instance, matching spec 5's "single-threaded
//! cooperative per parser instance; a host MAY run multiple independent
//! instances in parallel on separate threads" — a `thread_local!` gives
//! each host thread its own instance for free.
//!
//! The global-allocator wiring below is carried over verbatim from the
//! teacher's `lib.rs`: which allocator backs the process is an operational
//! concern independent of the ABI surface sitting on top of it.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[cfg(feature = "snmalloc")]
#[global_allocator]
static GLOBAL: snmalloc_rs::SnMalloc = snmalloc_rs::SnMalloc;

mod arena;
pub mod error;
pub mod indexer;
pub mod number;
pub mod parser;
pub mod simd_utils;
pub mod streaming;
pub mod stringify;
pub mod tape;
pub mod token_iter;

use std::cell::RefCell;
use std::collections::HashMap;

use arena::Arena;
use error::ParseError;
use parser::{parse as parse_document, ParserConfig};
use streaming::{StreamState, StreamStatus};
use stringify::Stringifier;
use tape::{Tape, TapeReader, TapeValue};

/// Everything one "parser instance" (spec 5) owns: the input arena, the
/// most recently parsed tape plus its source bytes (string tape words cite
/// offsets into this, so it must outlive the tape), a token-walk cursor,
/// the active stream registry, and an in-progress stringifier buffer.
struct CoreState {
    arena: Arena,
    last_source: Vec<u8>,
    last_tape: Option<Tape>,
    reader_pos: usize,
    current_token: Option<TapeValue>,
    error_code: i32,
    streams: HashMap<u64, StreamState>,
    next_stream_id: u64,
    stringifier: Option<Stringifier>,
    stringify_error: i32,
    stringify_result: Vec<u8>,
}

impl CoreState {
    fn new() -> Self {
        CoreState {
            arena: Arena::new(),
            last_source: Vec::new(),
            last_tape: None,
            reader_pos: 0,
            current_token: None,
            error_code: 0,
            streams: HashMap::new(),
            next_stream_id: 1,
            stringifier: None,
            stringify_error: 0,
            stringify_result: Vec::new(),
        }
    }
}

thread_local! {
    static CORE: RefCell<CoreState> = RefCell::new(CoreState::new());
}

/// Tag values returned by `get_next_token`, in the order spec 3's tape word
/// layout lists them; 0 means "no more tokens" (the document's root closed).
const TAG_END: i32 = 0;
const TAG_OBJECT_OPEN: i32 = 1;
const TAG_OBJECT_CLOSE: i32 = 2;
const TAG_ARRAY_OPEN: i32 = 3;
const TAG_ARRAY_CLOSE: i32 = 4;
const TAG_STRING: i32 = 5;
const TAG_NUMBER: i32 = 6;
const TAG_TRUE: i32 = 7;
const TAG_FALSE: i32 = 8;
const TAG_NULL: i32 = 9;

fn tag_of(value: &TapeValue) -> i32 {
    match value {
        TapeValue::ObjectOpen { .. } => TAG_OBJECT_OPEN,
        TapeValue::ObjectClose => TAG_OBJECT_CLOSE,
        TapeValue::ArrayOpen { .. } => TAG_ARRAY_OPEN,
        TapeValue::ArrayClose => TAG_ARRAY_CLOSE,
        TapeValue::String { .. } => TAG_STRING,
        TapeValue::Unsigned(_) | TapeValue::Signed(_) | TapeValue::Double(_) => TAG_NUMBER,
        TapeValue::True => TAG_TRUE,
        TapeValue::False => TAG_FALSE,
        TapeValue::Null => TAG_NULL,
    }
}

// ---------------------------------------------------------------------
// Allocator
// ---------------------------------------------------------------------

/// Bump-allocate `size` bytes from the calling thread's arena and return a
/// pointer a host can write input bytes into ahead of `parse`.
#[no_mangle]
pub extern "C" fn alloc(size: u32) -> *mut u8 {
    CORE.with(|core| core.borrow_mut().arena.alloc(size as usize).1)
}

/// Bookkeeping hook only: the arena is a bump/region allocator, reclaimed
/// in bulk on the next `parse`/`stream_create`, not per-call.
#[no_mangle]
pub extern "C" fn dealloc(ptr: *mut u8, size: u32) {
    CORE.with(|core| {
        let mut core = core.borrow_mut();
        let offset = (ptr as usize).saturating_sub(core.arena.as_slice().as_ptr() as usize);
        core.arena.dealloc(offset, size as usize);
    });
}

// ---------------------------------------------------------------------
// One-shot parse + tape accessors
// ---------------------------------------------------------------------

/// Parse the bytes at `ptr..ptr+len` into the core's tape. Returns 0 on
/// success, a non-zero `ParseError::code()` otherwise.
///
/// # Safety
/// `ptr` must point at `len` readable, initialized bytes (typically the
/// region returned by a prior `alloc` call, already written by the host).
#[no_mangle]
pub unsafe extern "C" fn parse(ptr: *const u8, len: u32) -> i32 {
    let bytes = std::slice::from_raw_parts(ptr, len as usize);
    CORE.with(|core| {
        let mut core = core.borrow_mut();
        match parse_document(bytes, ParserConfig::default()) {
            Ok(tape) => {
                // `TapeReader::new` skips the root-open word; start the
                // cursor there so the first `get_next_token` yields the
                // document's first real value, not an immediate `TAG_END`.
                core.reader_pos = TapeReader::new(&tape.words).position();
                core.last_source = bytes.to_vec();
                core.last_tape = Some(tape);
                core.current_token = None;
                core.error_code = 0;
                0
            }
            Err(err) => {
                core.last_tape = None;
                core.error_code = err.code();
                err.code()
            }
        }
    })
}

/// Advance the tape cursor and return the tag of the next token, or
/// `TAG_END` (0) once the document's top-level value has fully closed.
#[no_mangle]
pub extern "C" fn get_next_token() -> i32 {
    CORE.with(|core| {
        let mut core = core.borrow_mut();
        let pos = core.reader_pos;
        let (next, new_pos) = match &core.last_tape {
            Some(tape) => {
                let mut reader = TapeReader::at(&tape.words, pos);
                let next = reader.next();
                (next, reader.position())
            }
            None => (None, pos),
        };
        core.reader_pos = new_pos;
        let tag = next.as_ref().map(tag_of).unwrap_or(TAG_END);
        core.current_token = next;
        tag
    })
}

/// The current token's numeric value, or 0.0 if it isn't a number.
#[no_mangle]
pub extern "C" fn get_token_number() -> f64 {
    CORE.with(|core| {
        match core.borrow().current_token {
            Some(TapeValue::Unsigned(v)) => v as f64,
            Some(TapeValue::Signed(v)) => v as f64,
            Some(TapeValue::Double(v)) => v,
            _ => 0.0,
        }
    })
}

/// The current token's boolean value: 1 true, 0 false, -1 if it isn't a bool.
#[no_mangle]
pub extern "C" fn get_token_bool() -> i32 {
    CORE.with(|core| match core.borrow().current_token {
        Some(TapeValue::True) => 1,
        Some(TapeValue::False) => 0,
        _ => -1,
    })
}

/// Pointer to the current token's string body within the last-parsed
/// source, or null if the current token isn't a string.
#[no_mangle]
pub extern "C" fn get_token_string_ptr() -> *const u8 {
    CORE.with(|core| {
        let core = core.borrow();
        match core.current_token {
            Some(TapeValue::String { offset, .. }) => unsafe {
                core.last_source.as_ptr().add(offset as usize)
            },
            _ => std::ptr::null(),
        }
    })
}

/// Byte length of the current token's string body, or 0 if the current
/// token isn't a string.
#[no_mangle]
pub extern "C" fn get_token_string_len() -> u32 {
    CORE.with(|core| match core.borrow().current_token {
        Some(TapeValue::String { len, .. }) => len,
        _ => 0,
    })
}

/// Child count of the current token if it opens a container, else 0.
#[no_mangle]
pub extern "C" fn get_container_count() -> u32 {
    CORE.with(|core| match core.borrow().current_token {
        Some(TapeValue::ObjectOpen { child_count, .. })
        | Some(TapeValue::ArrayOpen { child_count, .. }) => child_count,
        _ => 0,
    })
}

/// Rewind the one-shot tape cursor to the start of the document.
#[no_mangle]
pub extern "C" fn reset_tape() {
    CORE.with(|core| {
        let mut core = core.borrow_mut();
        core.reader_pos = core
            .last_tape
            .as_ref()
            .map(|tape| TapeReader::new(&tape.words).position())
            .unwrap_or(0);
        core.current_token = None;
    });
}

/// The most recent one-shot parse error code, or 0 if the last parse
/// succeeded (or none has run yet).
#[no_mangle]
pub extern "C" fn get_error_code() -> i32 {
    CORE.with(|core| core.borrow().error_code)
}

// ---------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------

/// Create a new stream and return its id. Ids are assigned monotonically
/// and never recycled (spec 9), so a stale id a host forgot to `destroy`
/// never silently aliases a later stream.
#[no_mangle]
pub extern "C" fn stream_create() -> u64 {
    CORE.with(|core| {
        let mut core = core.borrow_mut();
        let id = core.next_stream_id;
        core.next_stream_id += 1;
        core.streams.insert(id, StreamState::new(ParserConfig::default()));
        id
    })
}

/// Feed `len` bytes at `ptr` into `stream_id`'s accumulated buffer and
/// reparse. Returns the resulting `StreamStatus` as an integer, or -1 if
/// `stream_id` is unknown.
///
/// # Safety
/// `ptr` must point at `len` readable, initialized bytes.
#[no_mangle]
pub unsafe extern "C" fn stream_feed(stream_id: u64, ptr: *const u8, len: u32) -> i32 {
    let bytes = std::slice::from_raw_parts(ptr, len as usize);
    CORE.with(|core| {
        let mut core = core.borrow_mut();
        match core.streams.get_mut(&stream_id) {
            Some(stream) => stream.feed(bytes) as i32,
            None => -1,
        }
    })
}

#[no_mangle]
pub extern "C" fn stream_get_status(stream_id: u64) -> i32 {
    CORE.with(|core| {
        core.borrow()
            .streams
            .get(&stream_id)
            .map(|s| s.status() as i32)
            .unwrap_or(-1)
    })
}

#[no_mangle]
pub extern "C" fn stream_get_buffer_ptr(stream_id: u64) -> *const u8 {
    CORE.with(|core| {
        core.borrow()
            .streams
            .get(&stream_id)
            .map(|s| s.buffer().as_ptr())
            .unwrap_or(std::ptr::null())
    })
}

#[no_mangle]
pub extern "C" fn stream_get_buffer_len(stream_id: u64) -> u32 {
    CORE.with(|core| {
        core.borrow()
            .streams
            .get(&stream_id)
            .map(|s| s.buffer().len() as u32)
            .unwrap_or(0)
    })
}

/// Length of the complete value currently at the head of the stream's
/// buffer. The streaming controller always parses the whole autocompleted
/// buffer as a single document, so this equals the buffer length.
#[no_mangle]
pub extern "C" fn stream_get_value_len(stream_id: u64) -> u32 {
    stream_get_buffer_len(stream_id)
}

#[no_mangle]
pub extern "C" fn stream_get_remaining_ptr(stream_id: u64) -> *const u8 {
    CORE.with(|core| {
        core.borrow()
            .streams
            .get(&stream_id)
            .map(|s| s.remaining_bytes().as_ptr())
            .unwrap_or(std::ptr::null())
    })
}

#[no_mangle]
pub extern "C" fn stream_get_remaining_len(stream_id: u64) -> u32 {
    CORE.with(|core| {
        core.borrow()
            .streams
            .get(&stream_id)
            .map(|s| s.remaining_bytes().len() as u32)
            .unwrap_or(0)
    })
}

#[no_mangle]
pub extern "C" fn stream_get_error_code(stream_id: u64) -> i32 {
    CORE.with(|core| {
        core.borrow()
            .streams
            .get(&stream_id)
            .map(|s| s.error_code())
            .unwrap_or(0)
    })
}

#[no_mangle]
pub extern "C" fn stream_destroy(stream_id: u64) {
    CORE.with(|core| {
        core.borrow_mut().streams.remove(&stream_id);
    });
}

// ---------------------------------------------------------------------
// Stringifier
// ---------------------------------------------------------------------

fn with_stringifier<F: FnOnce(&mut Stringifier) -> Result<(), ParseError>>(f: F) -> i32 {
    CORE.with(|core| {
        let mut core = core.borrow_mut();
        let mut stringifier = match core.stringifier.take() {
            Some(s) => s,
            None => Stringifier::new(),
        };
        let result = f(&mut stringifier);
        let code = match &result {
            Ok(()) => 0,
            Err(e) => e.code(),
        };
        core.stringify_error = code;
        core.stringifier = Some(stringifier);
        code
    })
}

#[no_mangle]
pub extern "C" fn stringify_init() {
    CORE.with(|core| {
        let mut core = core.borrow_mut();
        core.stringifier = Some(Stringifier::new());
        core.stringify_error = 0;
        core.stringify_result.clear();
    });
}

#[no_mangle]
pub extern "C" fn stringify_null() -> i32 {
    with_stringifier(|s| s.push_null())
}

#[no_mangle]
pub extern "C" fn stringify_bool(value: i32) -> i32 {
    with_stringifier(|s| s.push_bool(value != 0))
}

#[no_mangle]
pub extern "C" fn stringify_number(value: f64) -> i32 {
    with_stringifier(|s| s.push_number(value))
}

/// # Safety
/// `ptr` must point at `len` readable bytes forming valid UTF-8.
#[no_mangle]
pub unsafe extern "C" fn stringify_string(ptr: *const u8, len: u32) -> i32 {
    let bytes = std::slice::from_raw_parts(ptr, len as usize);
    let text = match std::str::from_utf8(bytes) {
        Ok(t) => t,
        Err(_) => return ParseError::InvalidUtf8(0).code(),
    };
    with_stringifier(|s| s.push_string(text))
}

/// # Safety
/// `ptr` must point at `len` readable bytes forming valid UTF-8.
#[no_mangle]
pub unsafe extern "C" fn stringify_key(ptr: *const u8, len: u32) -> i32 {
    let bytes = std::slice::from_raw_parts(ptr, len as usize);
    let text = match std::str::from_utf8(bytes) {
        Ok(t) => t,
        Err(_) => return ParseError::InvalidUtf8(0).code(),
    };
    with_stringifier(|s| s.push_key(text))
}

#[no_mangle]
pub extern "C" fn stringify_object_start() -> i32 {
    with_stringifier(|s| s.object_start())
}

#[no_mangle]
pub extern "C" fn stringify_object_end() -> i32 {
    with_stringifier(|s| s.object_end())
}

#[no_mangle]
pub extern "C" fn stringify_array_start() -> i32 {
    with_stringifier(|s| s.array_start())
}

#[no_mangle]
pub extern "C" fn stringify_array_end() -> i32 {
    with_stringifier(|s| s.array_end())
}

/// Takes the in-progress stringifier and finalizes it into
/// `stringify_result`, if it hasn't been finalized already. Idempotent, so
/// `stringify_result_ptr`/`stringify_result_len` agree regardless of call
/// order after the last write.
fn finalize_stringify(core: &mut CoreState) {
    if let Some(stringifier) = core.stringifier.take() {
        match stringifier.finish() {
            Ok(bytes) => {
                core.stringify_error = 0;
                core.stringify_result = bytes;
            }
            Err(e) => {
                core.stringify_error = e.code();
                core.stringify_result.clear();
            }
        }
    }
}

/// Pointer to the finished output buffer. Finalizes the stringifier: call
/// after the last `stringify_*` write, before `stringify_free`.
#[no_mangle]
pub extern "C" fn stringify_result_ptr() -> *const u8 {
    CORE.with(|core| {
        let mut core = core.borrow_mut();
        finalize_stringify(&mut core);
        core.stringify_result.as_ptr()
    })
}

/// Byte length of the finished output buffer. Finalizes the stringifier
/// just like `stringify_result_ptr`, so a host may call either accessor
/// first.
#[no_mangle]
pub extern "C" fn stringify_result_len() -> u32 {
    CORE.with(|core| {
        let mut core = core.borrow_mut();
        finalize_stringify(&mut core);
        core.stringify_result.len() as u32
    })
}

#[no_mangle]
pub extern "C" fn stringify_error_code() -> i32 {
    CORE.with(|core| core.borrow().stringify_error)
}

/// Release the stringifier's output buffer.
#[no_mangle]
pub extern "C" fn stringify_free() {
    CORE.with(|core| {
        let mut core = core.borrow_mut();
        core.stringifier = None;
        core.stringify_result = Vec::new();
        core.stringify_error = 0;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_roundtrip_through_the_abi() {
        let input = br#"{"a":1,"b":[true,false,null]}"#;
        let rc = unsafe { parse(input.as_ptr(), input.len() as u32) };
        assert_eq!(rc, 0);
        assert_eq!(get_error_code(), 0);

        assert_eq!(get_next_token(), TAG_OBJECT_OPEN);
        assert_eq!(get_container_count(), 2);
        assert_eq!(get_next_token(), TAG_STRING);
        assert_eq!(get_token_string_len(), 1);
        assert_eq!(get_next_token(), TAG_NUMBER);
        assert_eq!(get_token_number(), 1.0);
        assert_eq!(get_next_token(), TAG_STRING);
        assert_eq!(get_next_token(), TAG_ARRAY_OPEN);
        assert_eq!(get_next_token(), TAG_TRUE);
        assert_eq!(get_token_bool(), 1);
        assert_eq!(get_next_token(), TAG_FALSE);
        assert_eq!(get_token_bool(), 0);
        assert_eq!(get_next_token(), TAG_NULL);
        assert_eq!(get_next_token(), TAG_ARRAY_CLOSE);
        assert_eq!(get_next_token(), TAG_OBJECT_CLOSE);
        assert_eq!(get_next_token(), TAG_END);
    }

    #[test]
    fn parse_error_surfaces_a_nonzero_code_and_clears_the_tape() {
        let input = b"{";
        let rc = unsafe { parse(input.as_ptr(), input.len() as u32) };
        assert_ne!(rc, 0);
        assert_eq!(get_error_code(), rc);
        assert_eq!(get_next_token(), TAG_END);
    }

    #[test]
    fn reset_tape_rewinds_the_cursor() {
        let input = b"[1,2]";
        unsafe { parse(input.as_ptr(), input.len() as u32) };
        assert_eq!(get_next_token(), TAG_ARRAY_OPEN);
        reset_tape();
        assert_eq!(get_next_token(), TAG_ARRAY_OPEN);
    }

    #[test]
    fn streaming_lifecycle_through_the_abi() {
        let id = stream_create();
        let chunk1 = br#"{"a":1,"b""#;
        let rc1 = unsafe { stream_feed(id, chunk1.as_ptr(), chunk1.len() as u32) };
        assert_eq!(rc1, StreamStatus::NeedsMore as i32);
        assert_eq!(stream_get_status(id), StreamStatus::NeedsMore as i32);

        let chunk2 = br#":2}"#;
        let rc2 = unsafe { stream_feed(id, chunk2.as_ptr(), chunk2.len() as u32) };
        assert_eq!(rc2, StreamStatus::Complete as i32);
        assert_eq!(stream_get_buffer_len(id), stream_get_value_len(id));

        stream_destroy(id);
        assert_eq!(stream_get_status(id), -1);
    }

    #[test]
    fn stringify_roundtrip_through_the_abi() {
        stringify_init();
        assert_eq!(stringify_object_start(), 0);
        let key = b"x";
        assert_eq!(unsafe { stringify_key(key.as_ptr(), key.len() as u32) }, 0);
        assert_eq!(stringify_number(1.0), 0);
        assert_eq!(stringify_object_end(), 0);

        let len = stringify_result_len();
        let ptr = stringify_result_ptr();
        let out = unsafe { std::slice::from_raw_parts(ptr, len as usize) };
        assert_eq!(out, br#"{"x":1}"#);
        assert_eq!(stringify_error_code(), 0);
        stringify_free();
    }

    #[test]
    fn stringify_result_len_is_correct_even_when_queried_before_ptr() {
        stringify_init();
        assert_eq!(stringify_object_start(), 0);
        let key = b"y";
        assert_eq!(unsafe { stringify_key(key.as_ptr(), key.len() as u32) }, 0);
        assert_eq!(stringify_bool(true as i32), 0);
        assert_eq!(stringify_object_end(), 0);

        // Query length first, the reverse of `stringify_roundtrip_through_the_abi`.
        let len = stringify_result_len();
        let ptr = stringify_result_ptr();
        let out = unsafe { std::slice::from_raw_parts(ptr, len as usize) };
        assert_eq!(out, br#"{"y":true}"#);
        stringify_free();
    }

    #[test]
    fn stringify_reports_errors_via_nonzero_codes() {
        stringify_init();
        assert_eq!(stringify_array_start(), 0);
        // closing the wrong kind of container is an IncorrectType error.
        assert_ne!(stringify_object_end(), 0);
        stringify_free();
    }

    #[test]
    fn arena_roundtrips_bytes_through_raw_alloc() {
        let ptr = alloc(3);
        unsafe {
            std::ptr::copy_nonoverlapping(b"123".as_ptr(), ptr, 3);
        }
        let rc = unsafe { parse(ptr, 3) };
        assert_eq!(rc, 0);
        assert_eq!(get_next_token(), TAG_NUMBER);
        assert_eq!(get_token_number(), 123.0);
        dealloc(ptr, 3);
    }
}
