//! Reads records one at a time from an offset into a segment file,
//! detecting the durable end, zero-filled tails, and corruption.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::error::{Error, Result};
use crate::header::SegmentHeader;
use crate::record::{self, RECORD_MAGIC};
use crate::varint;

/// Largest prefix of a frame (magic + two varints) we peek at before we
/// know the payload length. 1 magic byte + 10-byte varint timestamp +
/// 10-byte varint length is the worst case.
const MAX_FRAME_PREFIX: usize = 1 + varint::MAX_ENCODED_LEN * 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `offset` was at or past `durable_size`: the durable tail has been
    /// reached.
    NotFound,
    /// `offset` pointed at a zero-filled byte within the durable region —
    /// the legally sealed but unfilled tail of a crash-truncated segment.
    Canceled,
    /// A record was parsed. `message` is `None` when `timestamp_ms` fell
    /// below the caller's `min_timestamp_ms` and the payload was skipped
    /// rather than copied out.
    Success {
        timestamp_ms: i64,
        message: Option<Vec<u8>>,
    },
}

/// Reads the next record starting at `*offset`, advancing `*offset` past it
/// on every outcome except `NotFound`.
///
/// `durable_size` bounds the readable region of `file`; bytes at or beyond
/// it may be partially written or garbage and must never be parsed.
pub fn read_next(
    file: &mut File,
    offset: &mut u64,
    durable_size: u64,
    min_timestamp_ms: i64,
) -> Result<ReadOutcome> {
    if *offset >= durable_size {
        return Ok(ReadOutcome::NotFound);
    }

    let available = durable_size - *offset;
    let peek_len = available.min(MAX_FRAME_PREFIX as u64) as usize;
    let mut prefix = vec![0u8; peek_len];
    file.seek(SeekFrom::Start(*offset))?;
    file.read_exact(&mut prefix)?;

    if prefix[0] == 0 {
        return Ok(ReadOutcome::Canceled);
    }
    if prefix[0] != RECORD_MAGIC {
        return Err(Error::BrokenData("invalid record magic"));
    }

    let (timestamp_ms, ts_len) = varint::decode(&prefix[1..])?;
    let len_start = 1 + ts_len;
    let (payload_len, len_len) = varint::decode(&prefix[len_start..])?;
    let header_len = len_start + len_len;
    let frame_len = header_len
        .checked_add(payload_len as usize)
        .and_then(|n| n.checked_add(record::CHECKSUM_LEN))
        .ok_or(Error::BrokenData("payload length overflow"))?;
    if frame_len as u64 > available {
        return Err(Error::BrokenData("record extends past durable size"));
    }

    let mut frame = vec![0u8; frame_len];
    file.seek(SeekFrom::Start(*offset))?;
    file.read_exact(&mut frame)?;
    let decoded = record::decode(&frame)?;

    *offset += decoded.frame_len as u64;
    let message = if (decoded.timestamp_ms as i64) < min_timestamp_ms {
        None
    } else {
        Some(decoded.payload.to_vec())
    };

    Ok(ReadOutcome::Success {
        timestamp_ms: timestamp_ms as i64,
        message,
    })
}

/// Public static utility counterpart of [`read_next`] that determines its
/// own durable bound by reading `file`'s header, rather than taking
/// `durable_size` from a caller that is already tracking it (a live
/// `Reader` uses `read_next` directly for that reason). Meant for
/// inspecting a segment file directly, detached from any `Queue`/`Reader`.
pub fn read_next_message(
    file: &mut File,
    offset: &mut u64,
    min_timestamp_ms: i64,
) -> Result<ReadOutcome> {
    let durable_size = SegmentHeader::read_from(file)?.durable_size;
    read_next(file, offset, durable_size, min_timestamp_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HEADER_SIZE;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_frames(path: &std::path::Path, records: &[(u64, &[u8])]) -> u64 {
        let mut file = File::create(path).expect("create");
        file.write_all(&[0u8; HEADER_SIZE]).expect("pad header");
        let mut size = HEADER_SIZE as u64;
        for (ts, payload) in records {
            let frame = record::encode(*ts, payload);
            file.write_all(&frame).expect("write frame");
            size += frame.len() as u64;
        }
        size
    }

    fn write_segment_with_real_header(path: &std::path::Path, records: &[(u64, &[u8])]) {
        let mut file = File::create(path).expect("create");
        let mut size = HEADER_SIZE as u64;
        for (ts, payload) in records {
            size += record::encode(*ts, payload).len() as u64;
        }
        let mut header = crate::header::SegmentHeader::new(0);
        header.durable_size = size;
        header.newest_timestamp = records.last().map(|(ts, _)| *ts as i64).unwrap_or(-1);
        file.write_all(&header.to_bytes()).expect("write header");
        for (ts, payload) in records {
            file.write_all(&record::encode(*ts, payload)).expect("write frame");
        }
    }

    #[test]
    fn reads_records_in_order() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("seg");
        let durable_size = write_frames(&path, &[(100, b"a"), (200, b"b")]);

        let mut file = File::open(&path).expect("open");
        let mut offset = HEADER_SIZE as u64;

        match read_next(&mut file, &mut offset, durable_size, 0).expect("read a") {
            ReadOutcome::Success { timestamp_ms, message } => {
                assert_eq!(timestamp_ms, 100);
                assert_eq!(message.unwrap(), b"a");
            }
            _ => panic!("expected success"),
        }
        match read_next(&mut file, &mut offset, durable_size, 0).expect("read b") {
            ReadOutcome::Success { timestamp_ms, message } => {
                assert_eq!(timestamp_ms, 200);
                assert_eq!(message.unwrap(), b"b");
            }
            _ => panic!("expected success"),
        }
        assert!(matches!(
            read_next(&mut file, &mut offset, durable_size, 0).expect("at tail"),
            ReadOutcome::NotFound
        ));
    }

    #[test]
    fn skips_payload_below_min_timestamp_but_advances() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("seg");
        let durable_size = write_frames(&path, &[(100, b"old"), (500, b"new")]);

        let mut file = File::open(&path).expect("open");
        let mut offset = HEADER_SIZE as u64;
        match read_next(&mut file, &mut offset, durable_size, 300).expect("skip old") {
            ReadOutcome::Success { timestamp_ms, message } => {
                assert_eq!(timestamp_ms, 100);
                assert!(message.is_none());
            }
            _ => panic!("expected success"),
        }
        match read_next(&mut file, &mut offset, durable_size, 300).expect("read new") {
            ReadOutcome::Success { timestamp_ms, message } => {
                assert_eq!(timestamp_ms, 500);
                assert_eq!(message.unwrap(), b"new");
            }
            _ => panic!("expected success"),
        }
    }

    #[test]
    fn read_next_message_determines_its_own_durable_bound_from_the_header() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("seg");
        write_segment_with_real_header(&path, &[(100, b"a"), (200, b"b")]);

        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .expect("open");
        let mut offset = HEADER_SIZE as u64;

        match read_next_message(&mut file, &mut offset, 0).expect("read a") {
            ReadOutcome::Success { timestamp_ms, message } => {
                assert_eq!(timestamp_ms, 100);
                assert_eq!(message.unwrap(), b"a");
            }
            _ => panic!("expected success"),
        }
        match read_next_message(&mut file, &mut offset, 0).expect("read b") {
            ReadOutcome::Success { timestamp_ms, message } => {
                assert_eq!(timestamp_ms, 200);
                assert_eq!(message.unwrap(), b"b");
            }
            _ => panic!("expected success"),
        }
        assert!(matches!(
            read_next_message(&mut file, &mut offset, 0).expect("at tail"),
            ReadOutcome::NotFound
        ));
    }

    #[test]
    fn zero_fill_within_durable_region_is_canceled() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("seg");
        let mut file = File::create(&path).expect("create");
        file.write_all(&[0u8; HEADER_SIZE + 16]).expect("zero fill");

        let mut file = File::open(&path).expect("open");
        let mut offset = HEADER_SIZE as u64;
        assert!(matches!(
            read_next(&mut file, &mut offset, (HEADER_SIZE + 16) as u64, 0).expect("read"),
            ReadOutcome::Canceled
        ));
    }

    #[test]
    fn checksum_mismatch_is_broken_data() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("seg");
        let durable_size = write_frames(&path, &[(100, b"hello")]);

        let mut file = std::fs::OpenOptions::new().write(true).open(&path).expect("open rw");
        file.seek(SeekFrom::Start(durable_size - 1)).expect("seek to checksum");
        file.write_all(&[0xffu8]).expect("corrupt checksum byte");

        let mut file = File::open(&path).expect("open");
        let mut offset = HEADER_SIZE as u64;
        assert!(matches!(
            read_next(&mut file, &mut offset, durable_size, 0),
            Err(Error::BrokenData(_))
        ));
    }
}
