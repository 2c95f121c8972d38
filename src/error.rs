use std::fmt;

/// Error kinds surfaced by the queue.
///
/// `SUCCESS` has no variant: it is simply `Ok(_)`.
#[derive(Debug)]
pub enum Error {
    /// A read-only reader found nothing more to read, or a directory the
    /// caller asked about does not exist.
    NotFound,
    /// A `Read` timed out before a message became available.
    Infeasible,
    /// The writer closed while a reader was waiting, or the reader ran into
    /// the zero-filled tail of a crash-truncated segment.
    Canceled,
    /// An operation is invalid for the queue's current open mode (e.g. a
    /// write against a read-only queue).
    PreconditionError(&'static str),
    /// A checksum mismatch, bad magic byte, or malformed varint.
    BrokenData(&'static str),
    /// An invalid argument was supplied (e.g. a negative `max_file_size`).
    InvalidArgument(&'static str),
    /// The underlying filesystem failed.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound => write!(f, "not found"),
            Error::Infeasible => write!(f, "timed out waiting for a message"),
            Error::Canceled => write!(f, "canceled"),
            Error::PreconditionError(msg) => write!(f, "precondition failed: {msg}"),
            Error::BrokenData(msg) => write!(f, "broken data: {msg}"),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Error::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
