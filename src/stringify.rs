//! Push-based compact JSON stringifier (spec 6's `stringify_*` ABI): a
//! state machine that accepts one value/key/container event at a time and
//! writes compact (no insignificant whitespace) JSON bytes, inserting
//! commas and colons itself.
//!
//! Number and string formatting are ported from the teacher's
//! `direct_json.rs` (`write_integer` via `itoa`, `write_float` via `ryu`
//! with a `is_finite()` guard, and the scan-then-escape loop from
//! `write_json_string_escaped`) narrowed to the single `Json` escape mode —
//! `HtmlSafe`/`UnicodeSafe`/`JavaScriptSafe` have no selector anywhere in
//! spec 6's surface. Pretty-printing (`FormatOptions::pretty`) is dropped
//! for the same reason: the spec requires compact-only output.

use crate::error::{ParseError, Result};
use crate::number::NumberValue;
use crate::simd_utils;
use crate::tape::{Tape, TapeReader, TapeValue, DEFAULT_MAX_DEPTH};
use std::io::Write;

enum Ctx {
    Object { expect_key: bool, wrote_any: bool },
    Array { wrote_any: bool },
}

/// Push-based JSON writer. One instance corresponds to one `stringify_*`
/// session in the ABI (spec 6): `stringify_init` constructs it, each
/// `stringify_*` call is one method, `stringify_result_ptr/len` read the
/// finished buffer, `stringify_free` drops it.
pub struct Stringifier {
    out: Vec<u8>,
    ctx: Vec<Ctx>,
    pending_value: bool,
    wrote_root: bool,
    max_depth: usize,
}

impl Stringifier {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Stringifier {
            out: Vec::new(),
            ctx: Vec::new(),
            pending_value: false,
            wrote_root: false,
            max_depth,
        }
    }

    fn before_value(&mut self) -> Result<()> {
        if self.pending_value {
            self.pending_value = false;
            return Ok(());
        }
        match self.ctx.last_mut() {
            Some(Ctx::Array { wrote_any }) => {
                if *wrote_any {
                    self.out.push(b',');
                }
                *wrote_any = true;
                Ok(())
            }
            Some(Ctx::Object { .. }) => Err(ParseError::IncorrectType),
            None => {
                if self.wrote_root {
                    return Err(ParseError::IncorrectType);
                }
                self.wrote_root = true;
                Ok(())
            }
        }
    }

    fn before_key(&mut self) -> Result<()> {
        match self.ctx.last_mut() {
            Some(Ctx::Object { expect_key, wrote_any }) => {
                if !*expect_key {
                    return Err(ParseError::IncorrectType);
                }
                if *wrote_any {
                    self.out.push(b',');
                }
                *wrote_any = true;
                *expect_key = false;
                Ok(())
            }
            _ => Err(ParseError::IncorrectType),
        }
    }

    /// Called once a value (scalar or container) has been fully written:
    /// the enclosing object, if any, is now expecting its next key.
    fn after_value(&mut self) {
        if let Some(Ctx::Object { expect_key, .. }) = self.ctx.last_mut() {
            *expect_key = true;
        }
    }

    pub fn object_start(&mut self) -> Result<()> {
        self.before_value()?;
        if self.ctx.len() >= self.max_depth {
            return Err(ParseError::ExceededDepth);
        }
        self.out.push(b'{');
        self.ctx.push(Ctx::Object {
            expect_key: true,
            wrote_any: false,
        });
        Ok(())
    }

    pub fn object_end(&mut self) -> Result<()> {
        match self.ctx.last() {
            Some(Ctx::Object { expect_key, .. }) if *expect_key => {}
            Some(Ctx::Object { .. }) => return Err(ParseError::IncorrectType),
            _ => return Err(ParseError::IncorrectType),
        }
        self.ctx.pop();
        self.out.push(b'}');
        self.after_value();
        Ok(())
    }

    pub fn array_start(&mut self) -> Result<()> {
        self.before_value()?;
        if self.ctx.len() >= self.max_depth {
            return Err(ParseError::ExceededDepth);
        }
        self.out.push(b'[');
        self.ctx.push(Ctx::Array { wrote_any: false });
        Ok(())
    }

    pub fn array_end(&mut self) -> Result<()> {
        match self.ctx.last() {
            Some(Ctx::Array { .. }) => {}
            _ => return Err(ParseError::IncorrectType),
        }
        self.ctx.pop();
        self.out.push(b']');
        self.after_value();
        Ok(())
    }

    pub fn push_null(&mut self) -> Result<()> {
        self.before_value()?;
        self.out.extend_from_slice(b"null");
        self.after_value();
        Ok(())
    }

    pub fn push_bool(&mut self, value: bool) -> Result<()> {
        self.before_value()?;
        self.out.extend_from_slice(if value { b"true" } else { b"false" });
        self.after_value();
        Ok(())
    }

    /// `stringify_number(f64)` (spec 6): the ABI only ever carries doubles,
    /// so a host-side integer is expected to already have been widened.
    pub fn push_number(&mut self, value: f64) -> Result<()> {
        self.before_value()?;
        write_double(&mut self.out, value)?;
        self.after_value();
        Ok(())
    }

    /// Internal counterpart of `push_number` that keeps a tape's
    /// unsigned/signed/double distinction, formatting integers with
    /// `itoa` the way the teacher's `write_integer` does instead of
    /// round-tripping them through `ryu`. Used by [`stringify_tape`].
    pub fn push_number_value(&mut self, value: &NumberValue) -> Result<()> {
        self.before_value()?;
        write_number_value(&mut self.out, value)?;
        self.after_value();
        Ok(())
    }

    /// `stringify_string(ptr, len)`: `text` is host-decoded UTF-8 that may
    /// contain raw control characters or quotes, so it is escaped here.
    pub fn push_string(&mut self, text: &str) -> Result<()> {
        self.before_value()?;
        write_escaped_string(&mut self.out, text);
        self.after_value();
        Ok(())
    }

    /// `stringify_key(ptr, len)`.
    pub fn push_key(&mut self, text: &str) -> Result<()> {
        self.before_key()?;
        write_escaped_string(&mut self.out, text);
        self.out.push(b':');
        self.pending_value = true;
        Ok(())
    }

    /// Writes `text` verbatim between quotes with no escape scan. Only
    /// safe when `text` is already a validated JSON string body — the raw
    /// byte span a tape string cites, whose indexer already rejected any
    /// unescaped control byte or stray quote ([`crate::indexer`]). Used by
    /// [`stringify_tape`], where escaped and unescaped tape strings alike
    /// can be copied straight from the source instead of being re-escaped.
    pub fn push_string_raw(&mut self, text: &str) -> Result<()> {
        self.before_value()?;
        self.out.push(b'"');
        self.out.extend_from_slice(text.as_bytes());
        self.out.push(b'"');
        self.after_value();
        Ok(())
    }

    pub fn push_key_raw(&mut self, text: &str) -> Result<()> {
        self.before_key()?;
        self.out.push(b'"');
        self.out.extend_from_slice(text.as_bytes());
        self.out.push(b'"');
        self.out.push(b':');
        self.pending_value = true;
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.out
    }

    /// `stringify_result_ptr/len` read from the buffer mid-flight; this is
    /// the owning counterpart used once no more `stringify_*` calls follow.
    pub fn finish(self) -> Result<Vec<u8>> {
        if !self.ctx.is_empty() {
            return Err(ParseError::IncorrectType);
        }
        Ok(self.out)
    }
}

impl Default for Stringifier {
    fn default() -> Self {
        Self::new()
    }
}

fn write_double(out: &mut Vec<u8>, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(ParseError::NumberOutOfRange(0));
    }
    let mut buf = ryu::Buffer::new();
    out.extend_from_slice(buf.format(value).as_bytes());
    Ok(())
}

fn write_number_value(out: &mut Vec<u8>, value: &NumberValue) -> Result<()> {
    match value {
        NumberValue::Signed(n) => {
            let mut buf = itoa::Buffer::new();
            out.extend_from_slice(buf.format(*n).as_bytes());
            Ok(())
        }
        NumberValue::Unsigned(n) => {
            let mut buf = itoa::Buffer::new();
            out.extend_from_slice(buf.format(*n).as_bytes());
            Ok(())
        }
        NumberValue::Double(f) => write_double(out, *f),
    }
}

/// Scan-then-copy escaping loop, ported from the teacher's
/// `write_json_string_escaped`'s `EscapeMode::Json` arm: `find_escape_json`
/// (kept verbatim in `simd_utils`) locates the next byte needing escape and
/// everything in between is copied in one `extend_from_slice`.
fn write_escaped_string(out: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    out.push(b'"');
    let mut pos = 0;
    while pos < bytes.len() {
        let next = simd_utils::find_escape_json(bytes, pos);
        if next > pos {
            out.extend_from_slice(&bytes[pos..next]);
        }
        if next >= bytes.len() {
            break;
        }
        write_escape_byte(out, bytes[next]);
        pos = next + 1;
    }
    out.push(b'"');
}

fn write_escape_byte(out: &mut Vec<u8>, byte: u8) {
    match byte {
        b'"' => out.extend_from_slice(b"\\\""),
        b'\\' => out.extend_from_slice(b"\\\\"),
        b'\n' => out.extend_from_slice(b"\\n"),
        b'\r' => out.extend_from_slice(b"\\r"),
        b'\t' => out.extend_from_slice(b"\\t"),
        0x08 => out.extend_from_slice(b"\\b"),
        0x0c => out.extend_from_slice(b"\\f"),
        _ => {
            let _ = write!(out, "\\u{:04x}", byte);
        }
    }
}

/// Serializes a built [`Tape`] straight back to compact JSON, reading
/// string payloads from `source` (the bytes the tape's offsets cite — spec
/// 3's "strings as source references"). Every tape string, escaped or not,
/// is copied verbatim via `push_*_raw`: the indexer already guarantees the
/// cited span contains no unescaped control byte or stray quote, so the
/// original span is already a valid JSON string body regardless of
/// `has_escapes`, and copying it is both simpler and more faithful than
/// unescaping and re-escaping (full unescaping is a host-side concern spec
/// 9 deliberately keeps out of the core).
pub fn stringify_tape(tape: &Tape, source: &[u8]) -> Result<Vec<u8>> {
    let mut writer = Stringifier::new();
    let mut reader = TapeReader::new(&tape.words);
    let mut ctx: Vec<bool> = Vec::new(); // true = object, false = array
    let mut expect_key: Vec<bool> = Vec::new();

    while let Some(value) = reader.next() {
        let is_key_position = matches!(ctx.last(), Some(true)) && matches!(expect_key.last(), Some(true));
        match value {
            TapeValue::ObjectOpen { .. } => {
                writer.object_start()?;
                ctx.push(true);
                expect_key.push(true);
            }
            TapeValue::ObjectClose => {
                writer.object_end()?;
                ctx.pop();
                expect_key.pop();
                note_value_written(&ctx, &mut expect_key);
            }
            TapeValue::ArrayOpen { .. } => {
                writer.array_start()?;
                ctx.push(false);
                expect_key.push(false);
            }
            TapeValue::ArrayClose => {
                writer.array_end()?;
                ctx.pop();
                expect_key.pop();
                note_value_written(&ctx, &mut expect_key);
            }
            TapeValue::String { offset, len, .. } => {
                let span = source
                    .get(offset as usize..offset as usize + len as usize)
                    .ok_or(ParseError::IndexOutOfBounds)?;
                let text = std::str::from_utf8(span)
                    .map_err(|e| ParseError::InvalidUtf8(offset as usize + e.valid_up_to()))?;
                if is_key_position {
                    writer.push_key_raw(text)?;
                    if let Some(last) = expect_key.last_mut() {
                        *last = false;
                    }
                } else {
                    writer.push_string_raw(text)?;
                    note_value_written(&ctx, &mut expect_key);
                }
            }
            TapeValue::Unsigned(n) => {
                writer.push_number_value(&NumberValue::Unsigned(n))?;
                note_value_written(&ctx, &mut expect_key);
            }
            TapeValue::Signed(n) => {
                writer.push_number_value(&NumberValue::Signed(n))?;
                note_value_written(&ctx, &mut expect_key);
            }
            TapeValue::Double(f) => {
                writer.push_number_value(&NumberValue::Double(f))?;
                note_value_written(&ctx, &mut expect_key);
            }
            TapeValue::True => {
                writer.push_bool(true)?;
                note_value_written(&ctx, &mut expect_key);
            }
            TapeValue::False => {
                writer.push_bool(false)?;
                note_value_written(&ctx, &mut expect_key);
            }
            TapeValue::Null => {
                writer.push_null()?;
                note_value_written(&ctx, &mut expect_key);
            }
        }
    }

    writer.finish()
}

fn note_value_written(ctx: &[bool], expect_key: &mut [bool]) {
    if matches!(ctx.last(), Some(true)) {
        if let Some(last) = expect_key.last_mut() {
            *last = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, ParserConfig};

    #[test]
    fn writes_scalars() {
        let mut w = Stringifier::new();
        w.push_null().unwrap();
        assert_eq!(w.finish().unwrap(), b"null");

        let mut w = Stringifier::new();
        w.push_bool(true).unwrap();
        assert_eq!(w.finish().unwrap(), b"true");

        let mut w = Stringifier::new();
        w.push_number(1.5).unwrap();
        assert_eq!(w.finish().unwrap(), b"1.5");
    }

    #[test]
    fn writes_nested_object_and_array() {
        let mut w = Stringifier::new();
        w.object_start().unwrap();
        w.push_key("a").unwrap();
        w.push_number_value(&NumberValue::Signed(1)).unwrap();
        w.push_key("b").unwrap();
        w.array_start().unwrap();
        w.push_number_value(&NumberValue::Signed(2)).unwrap();
        w.push_number_value(&NumberValue::Signed(3)).unwrap();
        w.array_end().unwrap();
        w.object_end().unwrap();
        assert_eq!(w.finish().unwrap(), br#"{"a":1,"b":[2,3]}"#);
    }

    #[test]
    fn escapes_control_characters_and_quotes() {
        let mut w = Stringifier::new();
        w.push_string("line\nbreak \"quoted\"").unwrap();
        assert_eq!(w.finish().unwrap(), b"\"line\\nbreak \\\"quoted\\\"\"");
    }

    #[test]
    fn rejects_value_without_preceding_key_inside_object() {
        let mut w = Stringifier::new();
        w.object_start().unwrap();
        assert!(w.push_number(1.0).is_err());
    }

    #[test]
    fn rejects_key_outside_object() {
        let mut w = Stringifier::new();
        assert!(w.push_key("a").is_err());
    }

    #[test]
    fn enforces_depth_limit() {
        let mut w = Stringifier::with_max_depth(2);
        w.array_start().unwrap();
        w.array_start().unwrap();
        assert_eq!(w.array_start().unwrap_err(), ParseError::ExceededDepth);
    }

    #[test]
    fn rejects_non_finite_number() {
        let mut w = Stringifier::new();
        assert!(w.push_number(f64::NAN).is_err());
    }

    #[test]
    fn stringify_tape_round_trips_parsed_document() {
        let source = br#"{"a":1,"b":[2,3]}"#;
        let tape = parse(source, ParserConfig::default()).unwrap();
        let out = stringify_tape(&tape, source).unwrap();
        assert_eq!(out, source);
    }

    #[test]
    fn stringify_tape_handles_nested_empty_containers() {
        let source = br#"{"a":{},"b":[]}"#;
        let tape = parse(source, ParserConfig::default()).unwrap();
        let out = stringify_tape(&tape, source).unwrap();
        assert_eq!(out, source);
    }
}
