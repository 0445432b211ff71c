//! Variable-length unsigned integer encoding for string-table indices
//! (spec §4.5, §4.6, §8 S6). Whole-byte buckets keyed by thresholds
//! `{2^7, 2^14, 2^21, 2^28}`; values at or past `2^28` overflow.

use crate::error::CoreError;

pub fn byte_len(value: u64) -> Result<usize, CoreError> {
    match value {
        v if v < (1 << 7) => Ok(1),
        v if v < (1 << 14) => Ok(2),
        v if v < (1 << 21) => Ok(3),
        v if v < (1 << 28) => Ok(4),
        v => Err(CoreError::VarUintOverflow { index: v }),
    }
}

pub fn encode(value: u64) -> Result<Vec<u8>, CoreError> {
    let len = byte_len(value)?;
    let mut bytes = Vec::with_capacity(len);
    match len {
        1 => bytes.push(value as u8),
        2 => {
            bytes.push(0b1000_0000 | ((value >> 8) as u8));
            bytes.push((value & 0xFF) as u8);
        }
        3 => {
            bytes.push(0b1100_0000 | ((value >> 16) as u8));
            bytes.push(((value >> 8) & 0xFF) as u8);
            bytes.push((value & 0xFF) as u8);
        }
        4 => {
            bytes.push(0b1110_0000 | ((value >> 24) as u8));
            bytes.push(((value >> 16) & 0xFF) as u8);
            bytes.push(((value >> 8) & 0xFF) as u8);
            bytes.push((value & 0xFF) as u8);
        }
        _ => unreachable!("byte_len only returns 1..=4"),
    }
    Ok(bytes)
}

pub fn decode(bytes: &[u8]) -> Option<(u64, usize)> {
    let b0 = *bytes.first()?;
    if b0 & 0x80 == 0 {
        return Some((b0 as u64, 1));
    }
    if b0 & 0xC0 == 0x80 {
        let b1 = *bytes.get(1)?;
        let value = (((b0 & 0x3F) as u64) << 8) | b1 as u64;
        return Some((value, 2));
    }
    if b0 & 0xE0 == 0xC0 {
        let b1 = *bytes.get(1)?;
        let b2 = *bytes.get(2)?;
        let value = (((b0 & 0x1F) as u64) << 16) | ((b1 as u64) << 8) | b2 as u64;
        return Some((value, 3));
    }
    if b0 & 0xF0 == 0xE0 {
        let b1 = *bytes.get(1)?;
        let b2 = *bytes.get(2)?;
        let b3 = *bytes.get(3)?;
        let value = (((b0 & 0x0F) as u64) << 24) | ((b1 as u64) << 16) | ((b2 as u64) << 8) | b3 as u64;
        return Some((value, 4));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn s6_scenario() {
        assert_eq!(byte_len(0).unwrap(), 1);
        assert_eq!(byte_len(127).unwrap(), 1);
        assert_eq!(byte_len(128).unwrap(), 2);
        assert_eq!(byte_len(1 << 14).unwrap(), 3);
        assert!(byte_len(1 << 28).is_err());
    }

    #[test]
    fn round_trips_at_every_bucket_boundary() {
        for &v in &[0u64, 1, 127, 128, 16383, 16384, (1 << 21) - 1, 1 << 21, (1 << 28) - 1] {
            let bytes = encode(v).unwrap();
            let (decoded, len) = decode(&bytes).unwrap();
            assert_eq!(decoded, v);
            assert_eq!(len, bytes.len());
        }
    }

    #[test]
    fn overflow_is_rejected() {
        assert!(encode(1 << 28).is_err());
    }
}
