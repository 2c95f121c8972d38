//! Record framing: a self-delimiting frame of
//! `magic | varint(timestamp_ms) | varint(payload_len) | payload | crc32`.

use crate::error::{Error, Result};
use crate::varint;

/// First byte of a valid record. Chosen so that an all-zero byte (the
/// natural fill value of a freshly-extended file) can never be mistaken for
/// a record start.
pub const RECORD_MAGIC: u8 = 0xA5;

pub const CHECKSUM_LEN: usize = 4;

/// Encodes one record, returning the full frame bytes.
pub fn encode(timestamp_ms: u64, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + varint::MAX_ENCODED_LEN * 2 + payload.len() + CHECKSUM_LEN);
    frame.push(RECORD_MAGIC);
    varint::encode(timestamp_ms, &mut frame);
    varint::encode(payload.len() as u64, &mut frame);
    frame.extend_from_slice(payload);
    let checksum = crc32fast::hash(&frame);
    frame.extend_from_slice(&checksum.to_le_bytes());
    frame
}

/// The result of successfully parsing one frame out of a bounded byte
/// region.
pub struct Decoded<'a> {
    pub timestamp_ms: u64,
    pub payload: &'a [u8],
    /// Total length of the frame, including magic and checksum.
    pub frame_len: usize,
}

/// Parses one record out of `region`, which must already be bounded to
/// `[offset, durable_size)` of the owning segment.
///
/// `region[0] == 0` means the reader has hit the zero-filled tail of a
/// crash-truncated segment; callers treat that as end-of-segment, not an
/// error, by checking for it before calling this function.
pub fn decode(region: &[u8]) -> Result<Decoded<'_>> {
    if region.is_empty() || region[0] != RECORD_MAGIC {
        return Err(Error::BrokenData("invalid record magic"));
    }
    let (timestamp_ms, ts_len) = varint::decode(&region[1..])?;
    let len_start = 1 + ts_len;
    let (payload_len, len_len) = varint::decode(&region[len_start..])?;
    let payload_len = payload_len as usize;
    let payload_start = len_start + len_len;
    let payload_end = payload_start
        .checked_add(payload_len)
        .ok_or(Error::BrokenData("payload length overflow"))?;
    let checksum_end = payload_end
        .checked_add(CHECKSUM_LEN)
        .ok_or(Error::BrokenData("payload length overflow"))?;
    if checksum_end > region.len() {
        return Err(Error::BrokenData("payload length out of bounds"));
    }

    let frame_bytes = &region[..payload_end];
    let expected = u32::from_le_bytes(
        region[payload_end..checksum_end]
            .try_into()
            .expect("slice length"),
    );
    let actual = crc32fast::hash(frame_bytes);
    if actual != expected {
        return Err(Error::BrokenData("record checksum mismatch"));
    }

    Ok(Decoded {
        timestamp_ms,
        payload: &region[payload_start..payload_end],
        frame_len: checksum_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_record() {
        let frame = encode(1_700_000_000_123, b"hello world");
        let decoded = decode(&frame).expect("decode");
        assert_eq!(decoded.timestamp_ms, 1_700_000_000_123);
        assert_eq!(decoded.payload, b"hello world");
        assert_eq!(decoded.frame_len, frame.len());
    }

    #[test]
    fn empty_payload_is_allowed() {
        let frame = encode(5, b"");
        let decoded = decode(&frame).expect("decode");
        assert_eq!(decoded.payload, b"");
    }

    #[test]
    fn corrupt_checksum_is_broken_data() {
        let mut frame = encode(5, b"hello");
        *frame.last_mut().unwrap() ^= 0xff;
        assert!(matches!(decode(&frame), Err(Error::BrokenData(_))));
    }

    #[test]
    fn zero_fill_is_not_a_valid_record() {
        let zeros = [0u8; 16];
        assert!(matches!(decode(&zeros), Err(Error::BrokenData(_))));
    }
}
