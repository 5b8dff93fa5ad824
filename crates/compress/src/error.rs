//! Compression Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Streaming adapters ([`CpxReader`](crate::CpxReader),
//! [`CpxWriter`](crate::CpxWriter)) have to speak [`std::io::Error`] through
//! the `Read`/`Write` traits, so they carry an [`ErrorKind`] as the inner error
//! of the I/O error instead. Use [`ErrorKind::from_io`] to get it back out.

use derive_more::{Display, Error};
use std::io::{Error as IoError, ErrorKind as IoErrorKind};

/// A compression error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for compression operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Failed to initialize an encoder/decoder for requested compression format.
    Encoder,
    /// Data is corrupt or malformed. Don't retry with the same input. Used for reading/decoding.
    #[display("invalid or corrupted data")]
    InvalidData,
    /// The input ended before the compressed stream was complete. Whatever
    /// could be decoded has already been delivered.
    #[display("compressed stream ended unexpectedly")]
    Truncated,
    /// The stream was already closed.
    #[display("stream is closed")]
    Closed,
    /// The requested format is not supported.
    #[display("unsupported format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// The requested format is supported but not enabled.
    #[display("disabled format: {_0}")]
    DisabledFormat(#[error(not(source))] String),
    /// An I/O operation failed. Used for writing/encoding.
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }

    /// Find the [`ErrorKind`] a streaming adapter tucked inside an I/O error.
    pub fn from_io(err: &IoError) -> Option<&ErrorKind> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<ErrorKind>())
    }

    /// Wrap this kind in an [`IoError`] so it can cross a `Read`/`Write` boundary.
    pub(crate) fn into_io(self) -> IoError {
        let kind = match self {
            ErrorKind::InvalidData => IoErrorKind::InvalidData,
            ErrorKind::Truncated => IoErrorKind::UnexpectedEof,
            ErrorKind::Closed => IoErrorKind::BrokenPipe,
            _ => IoErrorKind::Other,
        };
        IoError::new(kind, self)
    }
}

/// Raise I/O errors, keeping any [`ErrorKind`] a streaming adapter put inside.
pub(crate) trait IoResultExt<T> {
    fn or_raise_io<F: FnOnce() -> ErrorKind>(self, fallback: F) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, IoError> {
    #[track_caller]
    fn or_raise_io<F: FnOnce() -> ErrorKind>(self, fallback: F) -> Result<T> {
        use exn::ResultExt;
        match self {
            Ok(value) => Ok(value),
            Err(err) => {
                let kind = ErrorKind::from_io(&err).cloned().unwrap_or_else(fallback);
                Err(err).or_raise(|| kind)
            },
        }
    }
}
