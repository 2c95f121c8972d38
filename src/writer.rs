//! Top-level Queue Writer: owns the active segment, enforces timestamp
//! monotonicity and rollover, and publishes commits to the coordination
//! primitive that readers wait on.

use std::path::PathBuf;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::coordination::Coordination;
use crate::error::{Error, Result};
use crate::reader::Reader;
use crate::record;
use crate::segment_store;
use crate::segment_writer::{self, SegmentWriter};

/// Bitmask passed to [`Queue::open`], matching tkrzw's `MessageQueue::OpenOption`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions(u8);

impl OpenOptions {
    pub const DEFAULT: OpenOptions = OpenOptions(0);
    pub const TRUNCATE: OpenOptions = OpenOptions(1 << 0);
    pub const SYNC_HARD: OpenOptions = OpenOptions(1 << 1);
    pub const READ_ONLY: OpenOptions = OpenOptions(1 << 2);

    fn contains(self, flag: OpenOptions) -> bool {
        self.0 & flag.0 == flag.0
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::ops::BitOr for OpenOptions {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// The queue's single writer handle. At most one `Queue` should hold write
/// access to a given `prefix` at a time; nothing in this type enforces
/// that across processes.
pub struct Queue {
    prefix: PathBuf,
    max_file_size: u64,
    sync_hard: bool,
    read_only: bool,
    last_timestamp: i64,
    segment: Option<SegmentWriter>,
    coordination: Arc<Coordination>,
    clock: Arc<dyn Clock>,
}

impl Queue {
    /// Opens (and, as needed, creates) the segment set for `prefix`.
    ///
    /// `prefix`'s parent directory must already exist; this never creates
    /// directories.
    pub fn open(prefix: impl Into<PathBuf>, max_file_size: u64, options: OpenOptions) -> Result<Self> {
        if max_file_size == 0 {
            return Err(Error::InvalidArgument("max_file_size must be positive"));
        }
        let prefix = prefix.into();
        let read_only = options.contains(OpenOptions::READ_ONLY);
        let truncate = options.contains(OpenOptions::TRUNCATE);
        if truncate && read_only {
            return Err(Error::PreconditionError("cannot truncate a read-only open"));
        }

        let (segment, active_segment_id, durable_size, last_timestamp) = if truncate {
            segment_writer::truncate_all(&prefix)?;
            log::debug!("truncated existing segments under {prefix:?}, creating segment 0");
            let segment = SegmentWriter::create(&prefix, 0)?;
            let durable_size = segment.durable_size();
            (Some(segment), 0, durable_size, -1)
        } else {
            let files = segment_store::find_files(&prefix)?;
            match files.last() {
                Some(tail_path) if read_only => {
                    let meta = segment_store::read_file_metadata(tail_path)?;
                    (None, meta.file_id, meta.durable_size, meta.newest_timestamp)
                }
                Some(tail_path) => {
                    let segment = SegmentWriter::open_existing(tail_path)?;
                    let id = segment.file_id();
                    let durable_size = segment.durable_size();
                    let ts = segment.newest_timestamp();
                    (Some(segment), id, durable_size, ts)
                }
                None if read_only => return Err(Error::NotFound),
                None => {
                    log::debug!("no existing segments under {prefix:?}, creating segment 0");
                    let segment = SegmentWriter::create(&prefix, 0)?;
                    let durable_size = segment.durable_size();
                    (Some(segment), 0, durable_size, -1)
                }
            }
        };

        Ok(Self {
            prefix,
            max_file_size,
            sync_hard: options.contains(OpenOptions::SYNC_HARD),
            read_only,
            last_timestamp,
            segment,
            coordination: Arc::new(Coordination::new(active_segment_id, durable_size, last_timestamp)),
            clock: Arc::new(SystemClock),
        })
    }

    #[cfg(test)]
    pub(crate) fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
    }

    /// Appends one record, substituting the wall clock for a negative
    /// `timestamp_ms` and clamping up to the last written timestamp so
    /// timestamps are never observed out of order.
    pub fn write(&mut self, timestamp_ms: i64, payload: &[u8]) -> Result<()> {
        if self.read_only {
            return Err(Error::PreconditionError("queue opened read-only"));
        }
        let supplied = if timestamp_ms < 0 { self.clock.now_millis() } else { timestamp_ms };
        let effective_ts = supplied.max(self.last_timestamp);
        let frame = record::encode(effective_ts as u64, payload);

        let segment = self
            .segment
            .as_mut()
            .expect("write-mode queue always holds a segment writer");
        if segment.would_exceed(frame.len() as u64, self.max_file_size) {
            let sealed_id = segment.file_id();
            segment.seal(self.sync_hard)?;
            let next_id = sealed_id + 1;
            log::debug!("segment {sealed_id} reached max_file_size, rolling over to {next_id}");
            *segment = SegmentWriter::create(&self.prefix, next_id)?;
        }
        segment.append(&frame, effective_ts, self.sync_hard)?;
        self.last_timestamp = effective_ts;
        self.coordination
            .publish(segment.file_id(), segment.durable_size(), self.last_timestamp);
        Ok(())
    }

    /// Flushes the header's `durable_size`/`newest_timestamp` and notifies
    /// waiters; `hard` additionally forces the write to stable storage.
    pub fn synchronize(&mut self, hard: bool) -> Result<()> {
        if self.read_only {
            return Err(Error::PreconditionError("queue opened read-only"));
        }
        let segment = self
            .segment
            .as_mut()
            .expect("write-mode queue always holds a segment writer");
        segment.synchronize(hard)?;
        self.coordination
            .publish(segment.file_id(), segment.durable_size(), self.last_timestamp);
        Ok(())
    }

    /// Synchronizes (hard) and wakes every waiting reader with
    /// `CANCELED`. No-op on a read-only queue.
    pub fn close(mut self) -> Result<()> {
        if let Some(segment) = self.segment.as_mut() {
            segment.synchronize(true)?;
        }
        self.coordination.close();
        Ok(())
    }

    pub fn get_timestamp(&self) -> i64 {
        self.last_timestamp
    }

    /// Creates a tailing reader positioned at the first segment whose
    /// newest known timestamp is `>= min_timestamp_ms`, or at the tail if
    /// none qualifies.
    pub fn make_reader(&self, min_timestamp_ms: i64) -> Result<Reader> {
        Reader::new(
            self.prefix.clone(),
            Arc::clone(&self.coordination),
            self.read_only,
            min_timestamp_ms,
        )
    }
}
