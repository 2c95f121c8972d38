//! Segment file discovery, naming, and pruning.
//!
//! Segment files are named `<prefix>.NNNNNNNNNN`, a fixed ten-digit
//! zero-padded decimal ID appended to a path prefix. The directory part of
//! `prefix` is never created here — the caller is expected to have set it
//! up.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::header::{SegmentHeader, HEADER_SIZE};

pub const ID_WIDTH: usize = 10;

/// Metadata read from a segment file's header without opening it for
/// writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMetadata {
    pub file_id: u64,
    pub newest_timestamp: i64,
    pub durable_size: u64,
}

/// Builds the path for segment `id` under `prefix`.
pub fn segment_path(prefix: &Path, id: u64) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(format!(".{:0width$}", id, width = ID_WIDTH));
    PathBuf::from(name)
}

/// Splits `prefix` into the directory to scan and the bare filename prefix
/// to match against.
fn split_prefix(prefix: &Path) -> (PathBuf, OsString) {
    let dir = prefix
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let name = prefix
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    (dir, name)
}

/// Parses a segment ID out of `candidate_name` if it matches
/// `<prefix_name>.NNNNNNNNNN` exactly (fixed width, all-digit suffix).
fn parse_segment_id(prefix_name: &str, candidate_name: &str) -> Option<u64> {
    let suffix = candidate_name.strip_prefix(prefix_name)?.strip_prefix('.')?;
    if suffix.len() != ID_WIDTH || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse::<u64>().ok()
}

/// Gets the file ID encoded in a segment path's fixed-width suffix.
pub fn file_id(path: &Path) -> Result<u64> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or(Error::InvalidArgument("segment path has no file name"))?;
    let dot = name
        .rfind('.')
        .ok_or(Error::InvalidArgument("segment path missing id suffix"))?;
    let suffix = &name[dot + 1..];
    if suffix.len() != ID_WIDTH || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidArgument("segment id suffix malformed"));
    }
    suffix
        .parse::<u64>()
        .map_err(|_| Error::InvalidArgument("segment id suffix malformed"))
}

/// Finds all segment files for `prefix`, sorted ascending by numeric ID.
///
/// A missing directory is `NOT_FOUND`; a directory with no matching files
/// returns an empty, successful list.
pub fn find_files(prefix: &Path) -> Result<Vec<PathBuf>> {
    let (dir, prefix_name) = split_prefix(prefix);
    let prefix_name = prefix_name
        .to_str()
        .ok_or(Error::InvalidArgument("prefix is not valid UTF-8"))?;

    if !dir.is_dir() {
        return Err(Error::NotFound);
    }

    let mut found: Vec<(u64, PathBuf)> = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(id) = parse_segment_id(prefix_name, name) {
            found.push((id, path));
        }
    }
    found.sort_unstable_by_key(|(id, _)| *id);
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

/// Reads `{file_id, newest_timestamp, durable_size}` from a segment's
/// header without acquiring any write access.
pub fn read_file_metadata(path: &Path) -> Result<FileMetadata> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; HEADER_SIZE];
    file.read_exact(&mut buf)?;
    let header = SegmentHeader::from_bytes(&buf)?;
    Ok(FileMetadata {
        file_id: header.file_id,
        newest_timestamp: header.newest_timestamp,
        durable_size: header.durable_size,
    })
}

/// Removes sealed segments whose newest durable record is older than
/// `threshold_ms`. The active tail (highest ID) is never removed,
/// regardless of its timestamp.
///
/// Succeeds even if the prefix's directory does not exist or nothing
/// qualifies for removal.
pub fn remove_old_files(prefix: &Path, threshold_ms: i64) -> Result<Vec<u64>> {
    let files = match find_files(prefix) {
        Ok(files) => files,
        Err(Error::NotFound) => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let Some((tail_path, sealed)) = files.split_last() else {
        return Ok(Vec::new());
    };
    let tail_id = file_id(tail_path)?;

    let mut removed = Vec::new();
    for path in sealed {
        let id = file_id(path)?;
        if id == tail_id {
            continue;
        }
        let meta = read_file_metadata(path)?;
        if meta.newest_timestamp < threshold_ms {
            fs::remove_file(path)?;
            log::debug!("removed sealed segment {path:?} (newest_timestamp={})", meta.newest_timestamp);
            removed.push(id);
        }
    }
    removed.sort_unstable();
    Ok(removed)
}
