//! Appends records to one segment file and tracks the bytes a writer has
//! made durable. `Queue` (in `writer.rs`) owns exactly one `SegmentWriter`
//! at a time — the active tail — and swaps it out on rollover.

use std::fs::{self, File, OpenOptions as FsOpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;
use crate::header::{SegmentHeader, HEADER_SIZE};
use crate::segment_store;

pub struct SegmentWriter {
    file: File,
    file_id: u64,
    durable_size: u64,
    newest_timestamp: i64,
}

impl SegmentWriter {
    /// Creates a brand-new, empty segment with a fresh header.
    pub fn create(prefix: &Path, file_id: u64) -> Result<Self> {
        let path = segment_store::segment_path(prefix, file_id);
        let mut file = FsOpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .truncate(true)
            .open(&path)?;
        let header = SegmentHeader::new(file_id);
        file.write_all(&header.to_bytes())?;
        Ok(Self {
            file,
            file_id,
            durable_size: header.durable_size,
            newest_timestamp: header.newest_timestamp,
        })
    }

    /// Opens an existing segment for appending, recovering a torn tail by
    /// truncating physical bytes beyond the header's recorded
    /// `durable_size`.
    pub fn open_existing(path: &Path) -> Result<Self> {
        let mut file = FsOpenOptions::new().write(true).read(true).open(path)?;
        let header = SegmentHeader::read_from(&mut file)?;

        let physical_size = file.metadata()?.len();
        if physical_size > header.durable_size {
            log::warn!(
                "recovering torn tail of segment {}: truncating {physical_size} bytes to durable_size {}",
                header.file_id,
                header.durable_size
            );
            file.set_len(header.durable_size)?;
        }

        Ok(Self {
            file,
            file_id: header.file_id,
            durable_size: header.durable_size,
            newest_timestamp: header.newest_timestamp,
        })
    }

    pub fn file_id(&self) -> u64 {
        self.file_id
    }

    pub fn durable_size(&self) -> u64 {
        self.durable_size
    }

    pub fn newest_timestamp(&self) -> i64 {
        self.newest_timestamp
    }

    /// Whether appending a frame of `additional` bytes would overflow
    /// `max_file_size`. A roll never happens against an empty segment —
    /// a single oversized record still gets written to its own segment,
    /// and a segment that exactly fills `max_file_size` only rolls on the
    /// *next* write, not the current one.
    pub fn would_exceed(&self, additional: u64, max_file_size: u64) -> bool {
        self.durable_size > HEADER_SIZE as u64 && self.durable_size + additional > max_file_size
    }

    /// Appends one already-encoded frame at the current durable size.
    ///
    /// When `sync_hard` is set, data and header are flushed to stable
    /// storage before returning — the caller (`Queue::write`) may then
    /// notify waiters immediately. Otherwise the header update is deferred
    /// to the next `Synchronize`; the caller still notifies waiters once
    /// this call returns, since `write_all` has already handed the bytes to
    /// the OS and a reader must never observe a durable size advance past
    /// bytes the OS does not yet hold.
    pub fn append(&mut self, frame: &[u8], timestamp_ms: i64, sync_hard: bool) -> Result<()> {
        self.file.seek(SeekFrom::Start(self.durable_size))?;
        self.file.write_all(frame)?;
        self.durable_size += frame.len() as u64;
        self.newest_timestamp = timestamp_ms;
        if sync_hard {
            self.file.sync_data()?;
            self.write_header()?;
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Writes `durable_size`/`newest_timestamp` to the on-disk header,
    /// optionally forcing it to stable storage.
    pub fn synchronize(&mut self, hard: bool) -> Result<()> {
        self.write_header()?;
        if hard {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Freezes this segment's header at seal time (rollover or close). A
    /// sealed segment's header is never rewritten again.
    pub fn seal(&mut self, sync_hard: bool) -> Result<()> {
        self.synchronize(sync_hard)
    }

    fn write_header(&mut self) -> Result<()> {
        let header = SegmentHeader {
            flags: crate::header::FLAG_CHECKSUMMED,
            file_id: self.file_id,
            durable_size: self.durable_size,
            newest_timestamp: self.newest_timestamp,
        };
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header.to_bytes())?;
        Ok(())
    }
}

/// Removes every segment file matching `prefix`, tolerating an empty or
/// missing set (used by `Open(..., TRUNCATE)`).
pub fn truncate_all(prefix: &Path) -> Result<()> {
    match segment_store::find_files(prefix) {
        Ok(files) => {
            for path in files {
                fs::remove_file(path)?;
            }
            Ok(())
        }
        Err(crate::error::Error::NotFound) => Ok(()),
        Err(err) => Err(err),
    }
}
