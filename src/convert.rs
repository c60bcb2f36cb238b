//! Conversions from raw random bytes to numbers and hexadecimal text.
//!
//! Typed extraction reinterprets bytes in native byte order. Hex encoding
//! uses lowercase digits.

use crate::error::{Error, Result};

/// Maps 8 raw bytes to a double in `[0.0, 1.0)`.
///
/// The bytes are read as a native-order `u64` and divided by 2^64, rounding
/// toward zero: only the top 53 bits (the `f64` mantissa width) contribute.
#[inline]
pub fn to_double_01(bytes: [u8; 8]) -> f64 {
    let value = u64::from_ne_bytes(bytes) >> (u64::BITS - f64::MANTISSA_DIGITS);
    value as f64 / (1u64 << f64::MANTISSA_DIGITS) as f64
}

/// Maps 4 raw bytes to a float in `[0.0, 1.0)`.
///
/// Same scheme as [`to_double_01`] with the top 24 bits of a native-order `u32`.
#[inline]
pub fn to_float_01(bytes: [u8; 4]) -> f32 {
    let value = u32::from_ne_bytes(bytes) >> (u32::BITS - f32::MANTISSA_DIGITS);
    value as f32 / (1u32 << f32::MANTISSA_DIGITS) as f32
}

#[inline]
pub fn to_int(bytes: [u8; 4]) -> i32 {
    i32::from_ne_bytes(bytes)
}

#[inline]
pub fn to_short(bytes: [u8; 2]) -> i16 {
    i16::from_ne_bytes(bytes)
}

/// Value of a lowercase hex digit. Any other character maps to 0.
#[inline]
pub fn hex_digit_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => 0,
    }
}

/// The two lowercase hex characters of `byte`, high nibble first.
#[inline]
pub fn byte_to_hex(byte: u8) -> [u8; 2] {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    [DIGITS[(byte >> 4) as usize], DIGITS[(byte & 0x0F) as usize]]
}

/// Encodes `data` as a lowercase hex string of exactly `2 * data.len()` characters.
pub fn encode_hex(data: &[u8]) -> String {
    let mut text = String::with_capacity(data.len() * 2);
    for &byte in data {
        let [hi, lo] = byte_to_hex(byte);
        text.push(hi as char);
        text.push(lo as char);
    }
    text
}

/// Writes the hex encoding of `data` into `out` followed by a NUL byte.
///
/// Returns the number of hex characters written (`2 * data.len()`); the
/// terminator sits at that index. `out` must hold `2 * data.len() + 1` bytes.
pub fn encode_hex_into(data: &[u8], out: &mut [u8]) -> Result<usize> {
    let len = data.len() * 2;
    if out.len() < len + 1 {
        return Err(Error::BufferTooSmall {
            expected: len + 1,
            actual: out.len(),
        });
    }
    for (pair, &byte) in out.chunks_exact_mut(2).zip(data) {
        pair.copy_from_slice(&byte_to_hex(byte));
    }
    out[len] = 0;
    Ok(len)
}

/// Decodes pairs of hex characters into bytes.
///
/// Characters that are not lowercase hex digits decode as 0 and a trailing
/// odd character is ignored; no error is reported. Use
/// [`decode_hex_strict`] to reject malformed text.
pub fn decode_hex(text: &str) -> Vec<u8> {
    text.as_bytes()
        .chunks_exact(2)
        .map(|pair| (hex_digit_value(pair[0]) << 4) | hex_digit_value(pair[1]))
        .collect()
}

/// Decodes hex text, failing on odd length or any non-hex character.
///
/// Accepts upper and lower case digits.
pub fn decode_hex_strict(text: &str) -> Result<Vec<u8>> {
    if text.len() % 2 != 0 {
        return Err(Error::InvalidParameter(format!(
            "hex text has odd length {}",
            text.len()
        )));
    }
    text.as_bytes()
        .chunks_exact(2)
        .enumerate()
        .map(|(i, pair)| {
            let digit = |c: u8| {
                (c as char).to_digit(16).map(|d| d as u8).ok_or_else(|| {
                    Error::InvalidParameter(format!(
                        "invalid hex character {:?} near offset {}",
                        c as char,
                        i * 2
                    ))
                })
            };
            Ok((digit(pair[0])? << 4) | digit(pair[1])?)
        })
        .collect()
}
