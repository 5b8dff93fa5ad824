//! CPX framed streams, plus compression with automatic format detection.
//!
//! The heart of this crate is the CPX container ([`CpxWriter`], [`CpxReader`]):
//! a four byte signature followed by a Deflate stream, read back transparently
//! whether or not the input was ever packed. Around it, a unified
//! [`Compression`] enum treats CPX as one format among several, providing:
//!
//! - **Format detection** from file extensions ([`Compression::from_path`]),
//!   magic bytes ([`Compression::from_magic_bytes`]) or a live stream
//!   ([`Compression::detect`])
//! - **In-memory** compression/decompression ([`Compression::compress`],
//!   [`Compression::decompress`])
//! - **Streaming** via wrapped readers/writers ([`Compression::wrap_reader`],
//!   [`Compression::wrap_writer`])
//! - **Peek-then-replay** via [`PeekableReader`]
//!
//! CPX, Bzip2 and Gzip are always available. XZ and Zstd are behind feature
//! flags.
//!
//! All compression uses the highest available level for each format,
//! prioritizing storage space over speed.

#[cfg(feature = "cli")]
pub mod cli;
mod construct;
pub mod cpx;
pub mod error;
mod ops;
mod peekable;
mod util;

pub use crate::cpx::{CpxReader, CpxWriter, Mode};
pub use crate::peekable::PeekableReader;

/// A supported compression format.
///
/// Variants gated behind feature flags (`xz`, `zstd`) are only available when
/// the corresponding feature is enabled. Defaults to [`None`](Self::None)
/// (uncompressed).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed
    #[default]
    None,
    /// CPX framed Deflate (.cpx)
    Cpx,
    /// Bzip2 compression (.bz2)
    Bzip2,
    /// Gzip compression (.gz)
    Gzip,
    /// XZ/LZMA compression (.xz)
    #[cfg(feature = "xz")]
    Xz,
    /// Zstd compression (.zst)
    #[cfg(feature = "zstd")]
    Zstd,
}

impl Compression {
    /// Every format compiled into this build.
    pub const ALL: &[Compression] = &[
        Compression::None,
        Compression::Cpx,
        Compression::Bzip2,
        Compression::Gzip,
        #[cfg(feature = "xz")]
        Compression::Xz,
        #[cfg(feature = "zstd")]
        Compression::Zstd,
    ];
}
