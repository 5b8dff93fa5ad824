//! CLI Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A CLI error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a command failure.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Configuration could not be loaded.
    #[display("could not load configuration")]
    Config,
    /// A command-line value was rejected.
    #[display("invalid argument")]
    Usage,
    /// An input file could not be opened.
    #[display("could not open input: {}", _0.display())]
    Input(#[error(not(source))] PathBuf),
    /// An output file could not be created.
    #[display("could not create output: {}", _0.display())]
    Output(#[error(not(source))] PathBuf),
    /// Encoding, decoding or format detection failed.
    #[display("compression failed")]
    Compression,
    /// Writing results failed.
    #[display("I/O error")]
    Io,
}
