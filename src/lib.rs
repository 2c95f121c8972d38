//! A durable, append-only message queue backed by a sequence of segment
//! files on a local filesystem.
//!
//! A single writer ([`Queue`]) appends timestamped byte-string messages to
//! the active tail segment; any number of [`Reader`]s tail the stream from
//! a minimum timestamp, blocking until new data arrives or the writer
//! closes. Segments roll over at `max_file_size` and are pruned only by the
//! explicit [`remove_old_files`] administrative operation — nothing removes
//! a segment implicitly.
//!
//! Multi-writer concurrency, random access by message ID, deletion of
//! individual messages, and encryption are out of scope; see each module
//! for the on-disk format and coordination protocol.

mod clock;
mod coordination;
mod error;
mod header;
mod reader;
mod record;
mod segment_reader;
mod segment_store;
mod segment_writer;
mod varint;
mod writer;

pub use clock::{Clock, SystemClock};
pub use error::{Error, Result};
pub use reader::Reader;
pub use segment_reader::{read_next_message, ReadOutcome};
pub use segment_store::{
    file_id, find_files, read_file_metadata, remove_old_files, segment_path, FileMetadata,
};
pub use writer::{OpenOptions, Queue};
