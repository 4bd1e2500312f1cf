use thiserror::Error;

/// Structural, numeric, and resource errors a parse or stringify call can
/// return. Mirrors the error code table in the external interface: every
/// variant maps to a stable non-zero `i32` via [`ParseError::code`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty input")]
    Empty,

    #[error("invalid UTF-8 at byte {0}")]
    InvalidUtf8(usize),

    #[error("unescaped control character in string at byte {0}")]
    FoundUnescapedChars(usize),

    #[error("unterminated string starting at byte {0}")]
    ExpectedStringEnd(usize),

    #[error("expected object key at byte {0}")]
    ExpectedKey(usize),

    #[error("expected ':' at byte {0}")]
    ExpectedColon(usize),

    #[error("expected ',' or '}}' at byte {0}")]
    ExpectedObjectCommaOrEnd(usize),

    #[error("expected ',' or ']' at byte {0}")]
    ExpectedArrayCommaOrEnd(usize),

    #[error("trailing content after value at byte {0}")]
    TrailingContent(usize),

    #[error("document exceeds the maximum input size")]
    ExceededCapacity,

    #[error("document exceeds the configured maximum nesting depth")]
    ExceededDepth,

    #[error("number out of representable range at byte {0}")]
    NumberOutOfRange(usize),

    #[error("invalid number literal at byte {0}")]
    InvalidNumberLiteral(usize),

    #[error("value at this tape position has a different type than requested")]
    IncorrectType,

    #[error("tape index out of bounds")]
    IndexOutOfBounds,

    #[error("missing required field {0:?}")]
    MissingField(String),

    #[error("unexpected character at byte {0}")]
    UnexpectedCharacter(usize),
}

impl ParseError {
    /// Stable ABI error code. 0 is reserved for success and is never
    /// returned here.
    pub fn code(&self) -> i32 {
        match self {
            ParseError::Empty => 1,
            ParseError::InvalidUtf8(_) => 2,
            ParseError::FoundUnescapedChars(_) => 3,
            ParseError::ExpectedStringEnd(_) => 4,
            ParseError::ExpectedKey(_) => 5,
            ParseError::ExpectedColon(_) => 6,
            ParseError::ExpectedObjectCommaOrEnd(_) => 7,
            ParseError::ExpectedArrayCommaOrEnd(_) => 8,
            ParseError::TrailingContent(_) => 9,
            ParseError::ExceededCapacity => 10,
            ParseError::ExceededDepth => 11,
            ParseError::NumberOutOfRange(_) => 12,
            ParseError::InvalidNumberLiteral(_) => 13,
            ParseError::IncorrectType => 14,
            ParseError::IndexOutOfBounds => 15,
            ParseError::MissingField(_) => 16,
            ParseError::UnexpectedCharacter(_) => 17,
        }
    }

    /// Byte offset at which the error was detected, if the variant carries one.
    pub fn position(&self) -> Option<usize> {
        match self {
            ParseError::InvalidUtf8(p)
            | ParseError::FoundUnescapedChars(p)
            | ParseError::ExpectedStringEnd(p)
            | ParseError::ExpectedKey(p)
            | ParseError::ExpectedColon(p)
            | ParseError::ExpectedObjectCommaOrEnd(p)
            | ParseError::ExpectedArrayCommaOrEnd(p)
            | ParseError::TrailingContent(p)
            | ParseError::NumberOutOfRange(p)
            | ParseError::InvalidNumberLiteral(p)
            | ParseError::UnexpectedCharacter(p) => Some(*p),
            _ => None,
        }
    }

    /// True for structural-error variants (taxonomy group 1 in the error
    /// handling design): these are the ones the streaming controller may
    /// decide to interpret as `needs_more` rather than a hard `error`.
    ///
    /// `InvalidUtf8` is deliberately excluded here even though it's a
    /// "ran out of bytes mid-token" shape in the truncated-tail case: whether
    /// it's recoverable depends on *where* the invalid byte is (a multi-byte
    /// sequence cut off at the buffer's end vs. a genuinely malformed byte
    /// earlier on), which this variant alone can't express. The streaming
    /// controller makes that call itself, using `std::str::from_utf8`'s
    /// `valid_up_to()` against the buffer length (see `streaming.rs`).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ParseError::Empty
                | ParseError::FoundUnescapedChars(_)
                | ParseError::ExpectedStringEnd(_)
                | ParseError::ExpectedKey(_)
                | ParseError::ExpectedColon(_)
                | ParseError::ExpectedObjectCommaOrEnd(_)
                | ParseError::ExpectedArrayCommaOrEnd(_)
                | ParseError::TrailingContent(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_nonzero_and_stable() {
        assert_eq!(ParseError::Empty.code(), 1);
        assert_eq!(ParseError::ExceededDepth.code(), 11);
        assert_eq!(ParseError::MissingField("x".into()).code(), 16);
        assert_eq!(ParseError::UnexpectedCharacter(0).code(), 17);
    }

    #[test]
    fn position_extraction() {
        assert_eq!(ParseError::ExpectedColon(42).position(), Some(42));
        assert_eq!(ParseError::ExceededCapacity.position(), None);
    }

    #[test]
    fn structural_classification() {
        assert!(ParseError::ExpectedKey(0).is_structural());
        assert!(!ParseError::ExceededDepth.is_structural());
        assert!(!ParseError::NumberOutOfRange(0).is_structural());
        assert!(!ParseError::UnexpectedCharacter(0).is_structural());
    }

    #[test]
    fn invalid_utf8_is_not_unconditionally_structural() {
        // Whether a truncated-looking UTF-8 run is recoverable depends on
        // its distance from the buffer's tail, which only the streaming
        // controller can judge — `is_structural` alone must not claim it.
        assert!(!ParseError::InvalidUtf8(0).is_structural());
    }
}
