//! Variable-length size decoding for pack files.
//!
//! A variable size is a series of bytes. In each byte the most significant
//! bit signals that another byte follows; the low seven bits are payload.
//! The first byte's payload is the least significant chunk, the Nth byte's
//! payload is shifted left by 7·N. The on-disk format places no bound on
//! the chunk count, but only pack entry sizes use this encoding and none
//! exceed 64 bits in practice, so the decoder accumulates into a `u64` and
//! rejects anything wider instead of reaching for a big integer.
//!
//! The pack *entry header* interleaves its first four size bits with type
//! bits and is parsed separately in the `pack` module; only its extension
//! bytes use this encoding.

use std::fmt;

/// Errors from variable-size decoding.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum VarintError {
    /// Input ended while the continuation bit was still set.
    Truncated,
    /// The encoded value does not fit in 64 bits.
    Overflow,
}

impl fmt::Display for VarintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "variable size truncated"),
            Self::Overflow => write!(f, "variable size exceeds 64 bits"),
        }
    }
}

impl std::error::Error for VarintError {}

/// Decodes a variable-length size from the start of `data`.
///
/// Returns the value and the number of bytes consumed.
///
/// # Errors
/// - `VarintError::Truncated` if `data` ends mid-encoding.
/// - `VarintError::Overflow` if the value needs more than 64 bits. A chunk
///   of all-zero high bytes still overflows; width is judged by position,
///   not value, so corrupt input fails fast.
pub fn decode(data: &[u8]) -> Result<(u64, usize), VarintError> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;

    for (i, &byte) in data.iter().enumerate() {
        if shift > 63 {
            return Err(VarintError::Overflow);
        }
        let chunk = (byte & 0x7f) as u64;
        if shift > 0 && (chunk >> (64 - shift)) != 0 {
            return Err(VarintError::Overflow);
        }
        value |= chunk << shift;

        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }

    Err(VarintError::Truncated)
}
