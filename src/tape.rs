//! The tape: a flat, append-only array of tagged 64-bit words representing
//! a parsed JSON document (spec 3). No pointer tree is ever built; every
//! value is one or two words, and container words store the index of their
//! counterpart so a reader can skip a whole container in O(1).
//!
//! Grounded on spec 3's word-layout table directly — the teacher has no
//! analog (it builds `rustler::Term` trees bottom-up and never patches a
//! parent word in place) — but reuses the teacher's depth-tracking /
//! capacity-estimation style from `direct_decode.rs`'s `parse_array`/
//! `parse_object` (`MAX_DEPTH`, `estimate_container_capacity`).

use crate::error::{ParseError, Result};
use smallvec::SmallVec;

/// Tag occupying the low 8 bits of a tape word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    Root = 0,
    ObjectOpen = 1,
    ObjectClose = 2,
    ArrayOpen = 3,
    ArrayClose = 4,
    String = 5,
    Unsigned = 6,
    Signed = 7,
    Double = 8,
    True = 9,
    False = 10,
    Null = 11,
}

impl Tag {
    fn from_u8(v: u8) -> Option<Tag> {
        Some(match v {
            0 => Tag::Root,
            1 => Tag::ObjectOpen,
            2 => Tag::ObjectClose,
            3 => Tag::ArrayOpen,
            4 => Tag::ArrayClose,
            5 => Tag::String,
            6 => Tag::Unsigned,
            7 => Tag::Signed,
            8 => Tag::Double,
            9 => Tag::True,
            10 => Tag::False,
            11 => Tag::Null,
            _ => return None,
        })
    }
}

const PTR_BITS: u32 = 32;
const LEN_BITS: u32 = 24;
const PTR_MAX: u32 = (1u32 << PTR_BITS) - 1;
const LEN_MAX: u32 = (1u32 << LEN_BITS) - 1;

/// Maximum input size in bytes (spec 6): 2^32.
pub const MAX_INPUT_BYTES: u64 = 1u64 << 32;

/// Default maximum nesting depth (spec 6); overridable via `ParserConfig`.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Pack a tag + 32-bit pointer + 24-bit length into one 64-bit tape word.
/// Layout: `{tag:8, ptr:32, len:24}`, tag in the low byte.
#[inline]
fn pack(tag: Tag, ptr: u32, len: u32) -> u64 {
    debug_assert!(ptr <= PTR_MAX);
    debug_assert!(len <= LEN_MAX);
    (tag as u64) | ((ptr as u64) << 8) | ((len as u64) << 40)
}

#[inline]
fn unpack(word: u64) -> (Tag, u32, u32) {
    let tag = Tag::from_u8((word & 0xFF) as u8).expect("corrupt tape word");
    let ptr = ((word >> 8) & 0xFFFF_FFFF) as u32;
    let len = ((word >> 40) & 0xFF_FFFF) as u32;
    (tag, ptr, len)
}

/// One entry on the depth stack: the container's tag, the index of its
/// still-unpatched open word, and its running child count (saturating at
/// 2^24, spec 6).
struct Frame {
    tag: Tag,
    open_word_index: u32,
    child_count: u32,
}

/// Flat tape plus the builder state needed to construct it.
pub struct Tape {
    pub words: Vec<u64>,
    stack: SmallVec<[Frame; 16]>,
    max_depth: usize,
}

impl Tape {
    pub fn new(max_depth: usize) -> Self {
        Tape {
            words: Vec::new(),
            stack: SmallVec::new(),
            max_depth,
        }
    }

    pub fn with_capacity(capacity: usize, max_depth: usize) -> Self {
        Tape {
            words: Vec::with_capacity(capacity),
            stack: SmallVec::new(),
            max_depth,
        }
    }

    #[inline]
    fn next_index(&self) -> Result<u32> {
        u32::try_from(self.words.len()).map_err(|_| ParseError::ExceededCapacity)
    }

    pub fn push_root_open(&mut self) -> Result<()> {
        let idx = self.next_index()?;
        self.words.push(pack(Tag::Root, 0, 0));
        self.stack.push(Frame {
            tag: Tag::Root,
            open_word_index: idx,
            child_count: 0,
        });
        Ok(())
    }

    pub fn close_root(&mut self) -> Result<()> {
        let frame = self.stack.pop().expect("close_root without matching open");
        let close_idx = self.next_index()?;
        self.words.push(pack(Tag::Root, frame.open_word_index, 0));
        self.words[frame.open_word_index as usize] = pack(Tag::Root, close_idx, 0);
        Ok(())
    }

    pub fn open_container(&mut self, is_object: bool) -> Result<()> {
        // The synthetic root frame `push_root_open` puts on the stack isn't
        // a level of user nesting, so it must not count against
        // `max_depth` — subtract it here rather than skip pushing it, so
        // `close_root`'s `stack.pop()` stays symmetric with `push_root_open`.
        if self.stack.len().saturating_sub(1) >= self.max_depth {
            return Err(ParseError::ExceededDepth);
        }
        let tag = if is_object {
            Tag::ObjectOpen
        } else {
            Tag::ArrayOpen
        };
        let idx = self.next_index()?;
        self.words.push(pack(tag, 0, 0));
        self.stack.push(Frame {
            tag,
            open_word_index: idx,
            child_count: 0,
        });
        Ok(())
    }

    /// Record one more child in the currently-open container (called once
    /// per comma, per spec 4.D's transition table).
    pub fn bump_child_count(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.child_count = frame.child_count.saturating_add(1).min(LEN_MAX);
        }
    }

    pub fn close_container(&mut self, is_object: bool) -> Result<()> {
        let frame = self.stack.pop().expect("close_container without matching open");
        let expected = if is_object {
            Tag::ObjectOpen
        } else {
            Tag::ArrayOpen
        };
        debug_assert_eq!(frame.tag, expected);
        let close_tag = if is_object {
            Tag::ObjectClose
        } else {
            Tag::ArrayClose
        };
        let close_idx = self.next_index()?;
        self.words
            .push(pack(close_tag, frame.open_word_index, 0));
        self.words[frame.open_word_index as usize] =
            pack(frame.tag, close_idx, frame.child_count);
        Ok(())
    }

    /// Increment the enclosing container's child count by one and return
    /// whether an object key is still expected next (only meaningful to the
    /// tape builder's own state machine, not stored on the tape).
    pub fn current_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn visit_string(&mut self, offset: u32, raw_len: u32, has_escapes: bool) -> Result<()> {
        if raw_len > LEN_MAX {
            return Err(ParseError::ExceededCapacity);
        }
        let mut len = raw_len;
        if has_escapes {
            // Reserve the top bit of the 24-bit length field as the
            // has_escapes flag (spec 3: "raw length + has_escapes bit").
            len |= 1 << 23;
        }
        self.words.push(pack(Tag::String, offset, len));
        Ok(())
    }

    pub fn visit_unsigned(&mut self, value: u64) -> Result<()> {
        self.words.push(pack(Tag::Unsigned, 0, 0));
        self.words.push(value);
        Ok(())
    }

    pub fn visit_signed(&mut self, value: i64) -> Result<()> {
        self.words.push(pack(Tag::Signed, 0, 0));
        self.words.push(value as u64);
        Ok(())
    }

    pub fn visit_double(&mut self, value: f64) -> Result<()> {
        self.words.push(pack(Tag::Double, 0, 0));
        self.words.push(value.to_bits());
        Ok(())
    }

    pub fn visit_true(&mut self) {
        self.words.push(pack(Tag::True, 0, 0));
    }

    pub fn visit_false(&mut self) {
        self.words.push(pack(Tag::False, 0, 0));
    }

    pub fn visit_null(&mut self) {
        self.words.push(pack(Tag::Null, 0, 0));
    }

    pub fn is_balanced(&self) -> bool {
        self.stack.is_empty()
    }

    /// Pre-reserve tape word capacity for an upcoming container given an
    /// estimated child count (spec 4.D's `estimate_container_capacity`
    /// analog). Each child is at minimum a one-word scalar, so reserving
    /// `children` additional words is a conservative floor; this is a
    /// throughput hint, never a correctness requirement.
    pub fn reserve_hint(&mut self, children: usize) {
        self.words.reserve(children);
    }
}

/// A read-only cursor over a built tape, used both by the one-shot ABI
/// accessors (`get_next_token` etc.) and by tests asserting tape shape.
pub struct TapeReader<'a> {
    words: &'a [u64],
    pos: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapeValue {
    ObjectOpen { child_count: u32, close_index: u32 },
    ObjectClose,
    ArrayOpen { child_count: u32, close_index: u32 },
    ArrayClose,
    String { offset: u32, len: u32, has_escapes: bool },
    Unsigned(u64),
    Signed(i64),
    Double(f64),
    True,
    False,
    Null,
}

impl<'a> TapeReader<'a> {
    pub fn new(words: &'a [u64]) -> Self {
        // Skip the root-open word; callers iterate the document's values.
        let pos = if matches!(words.first().map(|w| unpack(*w).0), Some(Tag::Root)) {
            1
        } else {
            0
        };
        TapeReader { words, pos }
    }

    /// Resume a cursor at a raw word index, for callers (the ABI's
    /// `get_next_token`) that must keep their position across calls without
    /// holding a live `TapeReader` borrow between them.
    pub fn at(words: &'a [u64], pos: usize) -> Self {
        TapeReader { words, pos }
    }

    /// Current raw word index, to be handed back to a future `at` call.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn next(&mut self) -> Option<TapeValue> {
        let word = *self.words.get(self.pos)?;
        let (tag, ptr, len) = unpack(word);
        let value = match tag {
            // The root's closing word always terminates the tape (it is
            // appended once, after every top-level value is fully closed).
            Tag::Root => return None,
            Tag::ObjectOpen => {
                self.pos += 1;
                return Some(TapeValue::ObjectOpen {
                    child_count: len,
                    close_index: ptr,
                });
            }
            Tag::ObjectClose => {
                self.pos += 1;
                return Some(TapeValue::ObjectClose);
            }
            Tag::ArrayOpen => {
                self.pos += 1;
                return Some(TapeValue::ArrayOpen {
                    child_count: len,
                    close_index: ptr,
                });
            }
            Tag::ArrayClose => {
                self.pos += 1;
                return Some(TapeValue::ArrayClose);
            }
            Tag::String => {
                self.pos += 1;
                return Some(TapeValue::String {
                    offset: ptr,
                    len: len & !(1 << 23),
                    has_escapes: len & (1 << 23) != 0,
                });
            }
            Tag::Unsigned => {
                let payload = self.words.get(self.pos + 1).copied().unwrap_or(0);
                self.pos += 2;
                TapeValue::Unsigned(payload)
            }
            Tag::Signed => {
                let payload = self.words.get(self.pos + 1).copied().unwrap_or(0) as i64;
                self.pos += 2;
                TapeValue::Signed(payload)
            }
            Tag::Double => {
                let payload = self.words.get(self.pos + 1).copied().unwrap_or(0);
                self.pos += 2;
                TapeValue::Double(f64::from_bits(payload))
            }
            Tag::True => {
                self.pos += 1;
                TapeValue::True
            }
            Tag::False => {
                self.pos += 1;
                TapeValue::False
            }
            Tag::Null => {
                self.pos += 1;
                TapeValue::Null
            }
        };
        Some(value)
    }
}
