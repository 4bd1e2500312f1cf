//! Number literal parsing (spec 4.C): a fast inline path for common integer
//! shapes, falling back to `lexical_core` (which implements Eisel-Lemire
//! internally) for floats and wide integers, and `num_bigint::BigInt` for
//! magnitudes that overflow both `i64` and `u64`.
//!
//! Ported from the teacher's `parse_number_fast`/`parse_number` in
//! `direct_decode.rs`, generalized to return a tagged [`NumberValue`]
//! instead of building an `rustler::Term`.

use crate::error::{ParseError, Result};
use crate::simd_utils;
use num_bigint::BigInt;

/// Digit-count ceiling above which an integer literal is rejected as
/// `NumberOutOfRange` rather than parsed into a `BigInt` tape payload. The
/// tape has no arbitrary-precision word shape (spec 3 only names `unsigned`,
/// `signed`, `double`), so a `BigInt` result is itself out of scope for the
/// tape and is downgraded to a `double` if it fits, else rejected.
const MAX_INTEGER_DIGITS: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub enum NumberValue {
    Unsigned(u64),
    Signed(i64),
    Double(f64),
}

/// Parse a JSON number literal starting at `input[start]`. Returns the
/// parsed value and the exclusive end offset of the literal.
pub fn parse_number(input: &[u8], start: usize) -> Result<(NumberValue, usize)> {
    let len = input.len();
    let mut pos = start;

    let neg = pos < len && input[pos] == b'-';
    if neg {
        pos += 1;
    }

    let int_digit_start = pos;
    if pos >= len {
        return Err(ParseError::InvalidNumberLiteral(start));
    }
    match input[pos] {
        b'0' => pos += 1,
        b'1'..=b'9' => {
            pos += 1;
            simd_utils::skip_ascii_digits(input, &mut pos);
            while pos < len && input[pos].is_ascii_digit() {
                pos += 1;
            }
        }
        _ => return Err(ParseError::InvalidNumberLiteral(start)),
    }
    let int_digit_count = pos - int_digit_start;
    if int_digit_count > MAX_INTEGER_DIGITS {
        return Err(ParseError::NumberOutOfRange(start));
    }

    let mut is_float = false;

    if pos < len && input[pos] == b'.' {
        is_float = true;
        pos += 1;
        if pos >= len || !input[pos].is_ascii_digit() {
            return Err(ParseError::InvalidNumberLiteral(start));
        }
        simd_utils::skip_ascii_digits(input, &mut pos);
        while pos < len && input[pos].is_ascii_digit() {
            pos += 1;
        }
    }

    if pos < len && (input[pos] == b'e' || input[pos] == b'E') {
        is_float = true;
        pos += 1;
        if pos < len && (input[pos] == b'+' || input[pos] == b'-') {
            pos += 1;
        }
        if pos >= len || !input[pos].is_ascii_digit() {
            return Err(ParseError::InvalidNumberLiteral(start));
        }
        simd_utils::skip_ascii_digits(input, &mut pos);
        while pos < len && input[pos].is_ascii_digit() {
            pos += 1;
        }
    }

    let num_bytes = &input[start..pos];

    if is_float {
        let f: f64 = lexical_core::parse(num_bytes)
            .map_err(|_| ParseError::InvalidNumberLiteral(start))?;
        if !f.is_finite() {
            return Err(ParseError::NumberOutOfRange(start));
        }
        return Ok((NumberValue::Double(f), pos));
    }

    // Fast inline accumulation for <= 18 digits: no overflow possible for
    // i64 (max 18-digit unsigned value is 999_999_999_999_999_999, below
    // i64::MAX). 19+ digit literals fall through to lexical_core/BigInt.
    if int_digit_count <= 18 {
        let mut val: i64 = 0;
        for &b in &input[int_digit_start..pos] {
            val = val * 10 + (b - b'0') as i64;
        }
        if neg {
            val = -val;
        }
        return Ok((NumberValue::Signed(val), pos));
    }

    if let Ok(i) = lexical_core::parse::<i64>(num_bytes) {
        return Ok((NumberValue::Signed(i), pos));
    }
    if let Ok(u) = lexical_core::parse::<u64>(num_bytes) {
        return Ok((NumberValue::Unsigned(u), pos));
    }

    // Wider than u64: fall back to arbitrary precision, then downcast to
    // the closest representable double since the tape has no bigint word.
    let num_str =
        std::str::from_utf8(num_bytes).map_err(|_| ParseError::InvalidNumberLiteral(start))?;
    let big: BigInt = num_str
        .parse()
        .map_err(|_| ParseError::InvalidNumberLiteral(start))?;
    let as_f64: f64 = lexical_core::parse(num_bytes).map_err(|_| ParseError::NumberOutOfRange(start))?;
    if as_f64.is_finite() {
        Ok((NumberValue::Double(as_f64), pos))
    } else {
        let _ = big; // confirmed the literal at least parses as an integer
        Err(ParseError::NumberOutOfRange(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_small_unsigned_as_signed() {
        let (v, end) = parse_number(b"123,", 0).unwrap();
        assert_eq!(v, NumberValue::Signed(123));
        assert_eq!(end, 3);
    }

    #[test]
    fn parses_negative() {
        let (v, _) = parse_number(b"-42", 0).unwrap();
        assert_eq!(v, NumberValue::Signed(-42));
    }

    #[test]
    fn parses_float_with_exponent() {
        let (v, _) = parse_number(b"1.5e10", 0).unwrap();
        match v {
            NumberValue::Double(f) => assert!((f - 1.5e10).abs() < 1e-6),
            _ => panic!("expected double"),
        }
    }

    #[test]
    fn rejects_leading_zero_followed_by_digit() {
        assert!(parse_number(b"01", 0).is_err());
    }

    #[test]
    fn rejects_bare_minus() {
        assert!(parse_number(b"-", 0).is_err());
    }

    #[test]
    fn wide_integer_falls_back_to_u64() {
        let (v, _) = parse_number(b"18446744073709551615", 0).unwrap();
        assert_eq!(v, NumberValue::Unsigned(u64::MAX));
    }

    #[test]
    fn boundary_values_round_trip() {
        let (v, _) = parse_number(b"9223372036854775807", 0).unwrap();
        assert_eq!(v, NumberValue::Signed(i64::MAX));
    }

    #[test]
    fn rejects_trailing_dot_with_no_digit() {
        assert!(parse_number(b"1.", 0).is_err());
    }

    #[test]
    fn rejects_empty_exponent() {
        assert!(parse_number(b"1e", 0).is_err());
    }

    #[test]
    fn two_pow_53_is_exact() {
        let (v, _) = parse_number(b"9007199254740992", 0).unwrap();
        assert_eq!(v, NumberValue::Signed(9_007_199_254_740_992));
    }

    #[test]
    fn i64_min_round_trips() {
        let (v, _) = parse_number(b"-9223372036854775808", 0).unwrap();
        assert_eq!(v, NumberValue::Signed(i64::MIN));
    }

    #[test]
    fn parses_near_max_double_exponent() {
        let (v, _) = parse_number(b"1e308", 0).unwrap();
        match v {
            NumberValue::Double(f) => assert!((f - 1e308).abs() / 1e308 < 1e-9),
            _ => panic!("expected double"),
        }
    }

    #[test]
    fn parses_near_min_double_exponent() {
        let (v, _) = parse_number(b"1e-308", 0).unwrap();
        match v {
            NumberValue::Double(f) => assert!((f - 1e-308).abs() / 1e-308 < 1e-9),
            _ => panic!("expected double"),
        }
    }

    #[test]
    fn rejects_exponent_overflowing_double_range() {
        assert!(matches!(
            parse_number(b"1e400", 0),
            Err(ParseError::NumberOutOfRange(0))
        ));
    }

    #[test]
    fn parses_decimal_fractions_without_binary_drift() {
        let (v, _) = parse_number(b"0.1", 0).unwrap();
        assert_eq!(v, NumberValue::Double(0.1));
        let (v, _) = parse_number(b"0.2", 0).unwrap();
        assert_eq!(v, NumberValue::Double(0.2));
    }
}
