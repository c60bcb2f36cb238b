//! Typed and range-scaled reads on top of a raw byte source.
//!
//! Integer ranges are mapped without modulo bias by rejection sampling:
//! for a range of `R` values drawn from `B`-bit raw values, draws at or above
//! `2^B - (2^B mod R)` are discarded and redrawn, so every output value is
//! backed by the same number of raw values.
//!
//! Raw draws are compared as unsigned values. A draw that would be negative
//! when read as a signed integer is therefore rejected too when it lies at or
//! above the limit; older Quantis libraries only rejected positive draws,
//! which left a slight bias towards the low end of the range.
//!
//! Scaled floating point reads clamp rounding at the top of the unit interval
//! so that `max` itself is never returned for a non-empty range.

use crate::consts::MAX_READ_SIZE;
use crate::convert;
use crate::error::{Error, Result};
use log::trace;

/// A source of raw random bytes with typed and scaled reads layered on top.
///
/// Implemented by [`Device`](crate::Device) (reusing one open handle) and
/// [`Quantis`](crate::Quantis) (opening the device for every draw).
pub trait RandomSource {
    /// Reads up to `buf.len()` random bytes and returns how many were read.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Reads a native `i32` from 4 raw bytes.
    fn read_int(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        fill_exact(self, &mut buf)?;
        Ok(convert::to_int(buf))
    }

    /// Reads a native `i16` from 2 raw bytes.
    fn read_short(&mut self) -> Result<i16> {
        let mut buf = [0u8; 2];
        fill_exact(self, &mut buf)?;
        Ok(convert::to_short(buf))
    }

    /// Reads a double in `[0.0, 1.0)` from 8 raw bytes.
    fn read_double_01(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        fill_exact(self, &mut buf)?;
        Ok(convert::to_double_01(buf))
    }

    /// Reads a float in `[0.0, 1.0)` from 4 raw bytes.
    fn read_float_01(&mut self) -> Result<f32> {
        let mut buf = [0u8; 4];
        fill_exact(self, &mut buf)?;
        Ok(convert::to_float_01(buf))
    }

    /// Reads a double in `[min, max)`.
    fn read_scaled_double(&mut self, min: f64, max: f64) -> Result<f64> {
        if min > max {
            return Err(invalid_range(min, max));
        }
        let value = self.read_double_01()?;
        Ok(below_max_f64(value * (max - min) + min, min, max))
    }

    /// Reads a float in `[min, max)`.
    fn read_scaled_float(&mut self, min: f32, max: f32) -> Result<f32> {
        if min > max {
            return Err(invalid_range(min, max));
        }
        let value = self.read_float_01()?;
        Ok(below_max_f32(value * (max - min) + min, min, max))
    }

    /// Reads an `i32` uniformly distributed over `[min, max]` (both inclusive).
    fn read_scaled_int(&mut self, min: i32, max: i32) -> Result<i32> {
        let range = IntRange::new(min, max)?;
        loop {
            let raw = self.read_int()? as u32;
            if let Some(value) = range.map(raw) {
                return Ok(value);
            }
            trace!("Rejected raw draw 0x{:08X} (limit 0x{:X})", raw, range.limit);
        }
    }

    /// Reads an `i16` uniformly distributed over `[min, max]` (both inclusive).
    fn read_scaled_short(&mut self, min: i16, max: i16) -> Result<i16> {
        if min > max {
            return Err(invalid_range(min, max));
        }
        let range = u32::try_from(i32::from(max) - i32::from(min) + 1)
            .map_err(|_| invalid_range(min, max))?;
        let limit = rejection_limit(u16::BITS, u64::from(range));
        loop {
            let raw = self.read_short()? as u16;
            if u64::from(raw) < limit {
                return Ok((i32::from(min) + (u32::from(raw) % range) as i32) as i16);
            }
            trace!("Rejected raw draw 0x{:04X} (limit 0x{:X})", raw, limit);
        }
    }

    /// Reads `count` integers uniformly distributed over `[min, max]`.
    ///
    /// All raw values are fetched in one request of `count * 4` bytes;
    /// rejected draws are replaced by single [`read_scaled_int`] draws.
    ///
    /// [`read_scaled_int`]: RandomSource::read_scaled_int
    fn read_scaled_int_vec(&mut self, count: usize, min: i32, max: i32) -> Result<Vec<i32>> {
        let range = IntRange::new(min, max)?;
        let size = checked_read_size(count, 4)?;
        let mut raw = vec![0u8; size];
        fill_exact(self, &mut raw)?;

        let mut values = Vec::with_capacity(count);
        for chunk in raw.chunks_exact(4) {
            let draw = convert::to_int([chunk[0], chunk[1], chunk[2], chunk[3]]) as u32;
            let value = match range.map(draw) {
                Some(value) => value,
                None => self.read_scaled_int(min, max)?,
            };
            values.push(value);
        }
        Ok(values)
    }

    /// Reads `count` hex strings, each encoding `length` random bytes.
    ///
    /// `count` itself is bounded by [`MAX_READ_SIZE`](crate::MAX_READ_SIZE),
    /// even when `length` is 0.
    fn read_hex_strings(&mut self, count: usize, length: usize) -> Result<Vec<String>> {
        if count > MAX_READ_SIZE {
            return Err(Error::InvalidReadSize {
                size: count,
                max: MAX_READ_SIZE,
            });
        }
        let size = checked_read_size(count, length)?;
        let mut raw = vec![0u8; size];
        fill_exact(self, &mut raw)?;
        if length == 0 {
            return Ok(vec![String::new(); count]);
        }
        Ok(raw.chunks_exact(length).map(convert::encode_hex).collect())
    }
}

/// Reads exactly `buf.len()` bytes; a short read is an I/O error.
pub(crate) fn fill_exact<S: RandomSource + ?Sized>(source: &mut S, buf: &mut [u8]) -> Result<()> {
    let read = source.read_bytes(buf)?;
    if read != buf.len() {
        return Err(Error::Io(format!(
            "short read: expected {} bytes, got {}",
            buf.len(),
            read
        )));
    }
    Ok(())
}

/// Validates a raw read size. Returns `false` for an empty request.
pub(crate) fn check_read_size(size: usize) -> Result<bool> {
    if size > MAX_READ_SIZE {
        return Err(Error::InvalidReadSize {
            size,
            max: MAX_READ_SIZE,
        });
    }
    Ok(size != 0)
}

fn checked_read_size(count: usize, item: usize) -> Result<usize> {
    let size = count.checked_mul(item).ok_or(Error::InvalidReadSize {
        size: usize::MAX,
        max: MAX_READ_SIZE,
    })?;
    check_read_size(size)?;
    Ok(size)
}

/// Largest multiple of `range` not exceeding `2^bits`.
///
/// Raw `bits`-wide values at or above this limit are rejected.
pub fn rejection_limit(bits: u32, range: u64) -> u64 {
    let span = 1u64 << bits;
    span - span % range
}

/// An inclusive `i32` range with its precomputed rejection limit.
#[derive(Debug, Clone, Copy)]
struct IntRange {
    min: i32,
    range: u64,
    limit: u64,
}

impl IntRange {
    fn new(min: i32, max: i32) -> Result<Self> {
        if min > max {
            return Err(invalid_range(min, max));
        }
        let range = (i64::from(max) - i64::from(min) + 1) as u64;
        Ok(IntRange {
            min,
            range,
            limit: rejection_limit(u32::BITS, range),
        })
    }

    /// Maps an accepted raw draw into the range; `None` if it must be redrawn.
    fn map(&self, raw: u32) -> Option<i32> {
        let raw = u64::from(raw);
        if raw >= self.limit {
            return None;
        }
        Some((i64::from(self.min) + (raw % self.range) as i64) as i32)
    }
}

/// Pulls a rounded-up result back under `max` when `min < max`.
fn below_max_f64(value: f64, min: f64, max: f64) -> f64 {
    if min < max && value >= max {
        let bits = max.to_bits();
        return if max > 0.0 {
            f64::from_bits(bits - 1)
        } else if max == 0.0 {
            -f64::from_bits(1)
        } else {
            f64::from_bits(bits + 1)
        };
    }
    value
}

fn below_max_f32(value: f32, min: f32, max: f32) -> f32 {
    if min < max && value >= max {
        let bits = max.to_bits();
        return if max > 0.0 {
            f32::from_bits(bits - 1)
        } else if max == 0.0 {
            -f32::from_bits(1)
        } else {
            f32::from_bits(bits + 1)
        };
    }
    value
}

fn invalid_range<T: std::fmt::Display>(min: T, max: T) -> Error {
    Error::InvalidParameter(format!("min ({}) is greater than max ({})", min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays a fixed byte script, then reports short reads.
    struct Script(VecDeque<u8>);

    impl Script {
        fn of_ints(values: &[u32]) -> Self {
            Script(values.iter().flat_map(|v| v.to_ne_bytes()).collect())
        }
    }

    impl RandomSource for Script {
        fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
            let n = buf.len().min(self.0.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.0.pop_front().unwrap_or_default();
            }
            Ok(n)
        }
    }

    #[test]
    fn test_rejection_limit() {
        assert_eq!(rejection_limit(32, 3), (1u64 << 32) - 1);
        assert_eq!(rejection_limit(32, 1 << 32), 1 << 32);
        assert_eq!(rejection_limit(16, 10), 65530);
        assert_eq!(rejection_limit(16, 1), 1 << 16);
    }

    #[test]
    fn test_scaled_int_rejects_over_limit_draws() {
        // 0xFFFFFFFF is the only draw at or above the limit for range 3
        let mut src = Script::of_ints(&[u32::MAX, u32::MAX, 7]);
        assert_eq!(src.read_scaled_int(0, 2).unwrap(), 1);
        assert!(src.0.is_empty());
    }

    #[test]
    fn test_scaled_int_treats_draw_as_unsigned() {
        // -2 as unsigned is 0xFFFFFFFE: 4294967294 % 3 == 2
        let mut src = Script::of_ints(&[(-2i32) as u32]);
        assert_eq!(src.read_scaled_int(10, 12).unwrap(), 12);
    }

    #[test]
    fn test_scaled_int_full_range() {
        let mut src = Script::of_ints(&[0, u32::MAX]);
        assert_eq!(src.read_scaled_int(i32::MIN, i32::MAX).unwrap(), i32::MIN);
        assert_eq!(src.read_scaled_int(i32::MIN, i32::MAX).unwrap(), i32::MAX);
    }

    #[test]
    fn test_scaled_int_single_value_range() {
        let mut src = Script::of_ints(&[123_456]);
        assert_eq!(src.read_scaled_int(-4, -4).unwrap(), -4);
    }

    #[test]
    fn test_scaled_short_rejects() {
        // range 10: limit 65530
        let bytes: Vec<u8> = [65535u16, 65530, 42]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        let mut src = Script(bytes.into());
        assert_eq!(src.read_scaled_short(-5, 4).unwrap(), -5 + 2);
    }

    #[test]
    fn test_inverted_ranges_fail_before_reading() {
        let mut src = Script::of_ints(&[1, 2, 3]);
        assert!(matches!(src.read_scaled_int(5, 4), Err(Error::InvalidParameter(_))));
        assert!(matches!(src.read_scaled_short(5, 4), Err(Error::InvalidParameter(_))));
        assert!(matches!(src.read_scaled_double(1.0, 0.5), Err(Error::InvalidParameter(_))));
        assert!(matches!(src.read_scaled_float(1.0, 0.5), Err(Error::InvalidParameter(_))));
        assert!(matches!(src.read_scaled_int_vec(4, 2, 1), Err(Error::InvalidParameter(_))));
        assert_eq!(src.0.len(), 12);
    }

    #[test]
    fn test_short_read_is_io_error() {
        let mut src = Script(VecDeque::from(vec![1, 2, 3]));
        assert!(matches!(src.read_int(), Err(Error::Io(_))));
        let mut empty = Script(VecDeque::new());
        assert!(matches!(empty.read_double_01(), Err(Error::Io(_))));
    }

    #[test]
    fn test_scaled_double_with_equal_bounds() {
        let mut src = Script(VecDeque::from(vec![0xFF; 8]));
        assert_eq!(src.read_scaled_double(2.5, 2.5).unwrap(), 2.5);
    }

    #[test]
    fn test_scaled_reads_stay_below_max() {
        let mut src = Script(VecDeque::from(vec![0xFF; 8 + 4 + 8 + 8]));
        let d = src.read_scaled_double(1.0, 2.0).unwrap();
        assert!(d < 2.0 && d >= 1.0, "{}", d);
        let f = src.read_scaled_float(1.0, 2.0).unwrap();
        assert!(f < 2.0 && f >= 1.0, "{}", f);
        let d = src.read_scaled_double(-3.0, 0.0).unwrap();
        assert!(d < 0.0 && d >= -3.0, "{}", d);
        let d = src.read_scaled_double(-3.0, -1.0).unwrap();
        assert!(d < -1.0 && d >= -3.0, "{}", d);
    }

    #[test]
    fn test_below_max_keeps_in_range_values() {
        assert_eq!(below_max_f64(1.5, 1.0, 2.0), 1.5);
        assert_eq!(below_max_f64(2.0, 2.0, 2.0), 2.0);
        assert_eq!(below_max_f32(2.0, 1.0, 2.0), 2.0f32 - f32::EPSILON);
    }

    #[test]
    fn test_scaled_int_vec_replaces_rejected_draws() {
        let mut src = Script::of_ints(&[4, u32::MAX, 9, 5]);
        let values = src.read_scaled_int_vec(3, 0, 2).unwrap();
        // 4 % 3, redraw after 0xFFFFFFFF consumes the trailing 5, then 9 % 3
        assert_eq!(values, vec![1, 2, 0]);
    }

    #[test]
    fn test_read_size_limits() {
        assert!(!check_read_size(0).unwrap());
        assert!(check_read_size(MAX_READ_SIZE).unwrap());
        assert!(matches!(
            check_read_size(MAX_READ_SIZE + 1),
            Err(Error::InvalidReadSize { .. })
        ));
        let mut src = Script::of_ints(&[]);
        assert!(matches!(
            src.read_scaled_int_vec(MAX_READ_SIZE, 0, 1),
            Err(Error::InvalidReadSize { .. })
        ));
    }

    #[test]
    fn test_hex_strings() {
        let mut src = Script(VecDeque::from(vec![0x00, 0x0f, 0xa0, 0xff]));
        assert_eq!(src.read_hex_strings(2, 2).unwrap(), vec!["000f", "a0ff"]);
        assert_eq!(src.read_hex_strings(3, 0).unwrap(), vec!["", "", ""]);
    }

    #[test]
    fn test_hex_string_count_is_bounded() {
        let mut src = Script(VecDeque::new());
        assert!(matches!(
            src.read_hex_strings(usize::MAX, 0),
            Err(Error::InvalidReadSize { .. })
        ));
        assert!(matches!(
            src.read_hex_strings(MAX_READ_SIZE + 1, 0),
            Err(Error::InvalidReadSize { .. })
        ));
        assert_eq!(src.read_hex_strings(1024, 0).unwrap().len(), 1024);
    }
}
