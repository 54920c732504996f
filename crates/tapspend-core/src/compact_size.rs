//! Bitcoin `CompactSize` variable-length integers.
//!
//! ```text
//! value < 0xfd          -> 1 byte
//! value <= 0xffff       -> 0xfd || u16 LE
//! value <= 0xffff_ffff  -> 0xfe || u32 LE
//! otherwise             -> 0xff || u64 LE
//! ```

use crate::error::{Result, SpendError};

/// Largest length a consensus decoder accepts for a single vector or item.
pub const MAX_SIZE: u64 = 0x0200_0000;

/// Number of bytes `write` will emit for `value`.
pub fn encoded_len(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Append the encoding of `value` to `buf`.
pub fn write(buf: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => buf.push(value as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Decode a value from the front of `bytes`, returning it with the number of
/// bytes consumed.
///
/// Non-canonical encodings (a wider form than necessary) are rejected, as
/// Bitcoin Core does.
pub fn read(bytes: &[u8]) -> Result<(u64, usize)> {
    let prefix = *bytes
        .first()
        .ok_or_else(|| SpendError::Serialization("unexpected end of data".into()))?;

    let (value, len, min) = match prefix {
        0xfd => (u64::from(u16::from_le_bytes(take::<2>(bytes)?)), 3, 0xfd),
        0xfe => (u64::from(u32::from_le_bytes(take::<4>(bytes)?)), 5, 0x1_0000),
        0xff => (u64::from_le_bytes(take::<8>(bytes)?), 9, 0x1_0000_0000),
        small => return Ok((u64::from(small), 1)),
    };

    if value < min {
        return Err(SpendError::Serialization(format!(
            "non-canonical compact size 0x{:x}",
            value
        )));
    }
    Ok((value, len))
}

fn take<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes
        .get(1..1 + N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| SpendError::Serialization("truncated compact size".into()))
}
