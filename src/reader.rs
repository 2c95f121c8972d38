//! Top-level Queue Reader: a tailing cursor that walks segments in ID
//! order and blocks on the coordination primitive at the durable tail.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::coordination::{Coordination, Snapshot, WaitResult};
use crate::error::{Error, Result};
use crate::header::{SegmentHeader, HEADER_SIZE};
use crate::segment_reader::{self, ReadOutcome};
use crate::segment_store;

struct OpenSegment {
    id: u64,
    file: File,
    /// `Some(size)` once this segment is known sealed (its header is frozen
    /// and was read once); `None` while it may still be the growing active
    /// tail, in which case its durable size comes from the coordination
    /// snapshot instead.
    sealed_size: Option<u64>,
}

pub struct Reader {
    prefix: PathBuf,
    coordination: Arc<Coordination>,
    read_only: bool,
    min_timestamp_ms: i64,
    current_segment_id: u64,
    offset: u64,
    latest_read_timestamp: i64,
    open_segment: Option<OpenSegment>,
}

impl Reader {
    pub(crate) fn new(
        prefix: PathBuf,
        coordination: Arc<Coordination>,
        read_only: bool,
        min_timestamp_ms: i64,
    ) -> Result<Self> {
        let files = segment_store::find_files(&prefix)?;
        let metas = files
            .iter()
            .map(|p| segment_store::read_file_metadata(p))
            .collect::<Result<Vec<_>>>()?;
        // `metas` is ascending by ID, and `newest_timestamp` is non-decreasing
        // along that order, so a partition point is a valid binary search.
        let idx = metas.partition_point(|m| m.newest_timestamp < min_timestamp_ms);
        let start_id = metas
            .get(idx)
            .or_else(|| metas.last())
            .map(|m| m.file_id)
            .unwrap_or(0);

        Ok(Self {
            prefix,
            coordination,
            read_only,
            min_timestamp_ms,
            current_segment_id: start_id,
            offset: HEADER_SIZE as u64,
            latest_read_timestamp: -1,
            open_segment: None,
        })
    }

    pub fn get_timestamp(&self) -> i64 {
        self.latest_read_timestamp
    }

    /// Reads the next message at or after `min_timestamp_ms`, blocking up to
    /// `timeout` at the durable tail. `timeout = None` waits forever;
    /// `Some(Duration::ZERO)` never blocks. The timeout is a single absolute
    /// deadline for the whole call, not reset by intermediate wakeups (a
    /// `Synchronize` publish, or records skipped below `min_timestamp_ms`).
    pub fn read(&mut self, timeout: Option<Duration>) -> Result<(i64, Vec<u8>)> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let snapshot = self.coordination.snapshot();
            let durable_size = self.ensure_open(&snapshot)?;

            let outcome = {
                let open = self.open_segment.as_mut().expect("ensure_open just set this");
                segment_reader::read_next(&mut open.file, &mut self.offset, durable_size, self.min_timestamp_ms)?
            };

            match outcome {
                ReadOutcome::Success { timestamp_ms, message } => {
                    self.latest_read_timestamp = timestamp_ms;
                    if let Some(message) = message {
                        return Ok((timestamp_ms, message));
                    }
                }
                ReadOutcome::Canceled => return Err(Error::Canceled),
                ReadOutcome::NotFound => {
                    if self.current_segment_id < snapshot.active_segment_id {
                        self.advance_segment();
                        continue;
                    }
                    if self.read_only {
                        return Err(Error::NotFound);
                    }
                    if snapshot.closed {
                        return Err(Error::Canceled);
                    }
                    let remaining = match deadline {
                        Some(deadline) => {
                            let now = Instant::now();
                            if now >= deadline {
                                return Err(Error::Infeasible);
                            }
                            Some(deadline.saturating_duration_since(now))
                        }
                        None => None,
                    };
                    match self.coordination.wait_for_change(&snapshot, remaining) {
                        WaitResult::TimedOut => return Err(Error::Infeasible),
                        WaitResult::Changed(_) => {}
                    }
                }
            }
        }
    }

    fn advance_segment(&mut self) {
        self.current_segment_id += 1;
        self.offset = HEADER_SIZE as u64;
        self.open_segment = None;
    }

    /// Makes sure `open_segment` refers to `current_segment_id`, returning
    /// the durable size readable from it right now.
    fn ensure_open(&mut self, snapshot: &Snapshot) -> Result<u64> {
        let is_active = self.current_segment_id == snapshot.active_segment_id;

        if let Some(open) = self.open_segment.as_mut() {
            if open.id == self.current_segment_id {
                if let Some(size) = open.sealed_size {
                    return Ok(size);
                }
                if !is_active {
                    let size = read_header_durable_size(&mut open.file)?;
                    open.sealed_size = Some(size);
                    return Ok(size);
                }
                return Ok(snapshot.durable_size);
            }
        }

        let path = segment_store::segment_path(&self.prefix, self.current_segment_id);
        let mut file = File::open(&path)?;
        let sealed_size = if is_active {
            None
        } else {
            Some(read_header_durable_size(&mut file)?)
        };
        let size = sealed_size.unwrap_or(snapshot.durable_size);
        self.open_segment = Some(OpenSegment {
            id: self.current_segment_id,
            file,
            sealed_size,
        });
        Ok(size)
    }
}

fn read_header_durable_size(file: &mut File) -> Result<u64> {
    Ok(SegmentHeader::read_from(file)?.durable_size)
}
