//! CPX framed Deflate streams.
//!
//! A CPX stream is a four byte signature (`CPX\0`) followed by a zlib-wrapped
//! Deflate stream compressed at the best level. There is nothing else: no
//! length prefix, no extra checksum beyond zlib's own Adler-32 trailer.
//!
//! The reader sniffs the signature and falls back to handing out the input
//! verbatim when it is missing, so a hand-edited plain document and its packed
//! equivalent can be fed to the same consumer.
//!
//! ```
//! use cpx_compress::{CpxReader, CpxWriter, Mode};
//! use std::io::{Read, Write};
//!
//! let mut writer = CpxWriter::new(Vec::new()).unwrap();
//! writer.write_all(b"<svg/>").unwrap();
//! let packed = writer.finish().unwrap();
//! assert!(packed.starts_with(b"CPX\0"));
//!
//! let mut reader = CpxReader::new(packed.as_slice()).unwrap();
//! assert_eq!(reader.mode(), Mode::Framed);
//! let mut unpacked = Vec::new();
//! reader.read_to_end(&mut unpacked).unwrap();
//! assert_eq!(unpacked, b"<svg/>");
//!
//! let reader = CpxReader::new(&b"<svg/>"[..]).unwrap();
//! assert_eq!(reader.mode(), Mode::Plain);
//! ```

mod reader;
mod writer;

pub use self::reader::CpxReader;
pub use self::writer::CpxWriter;

/// Signature at the start of every CPX stream.
pub const MAGIC: [u8; 4] = [b'C', b'P', b'X', 0x00];

/// Size of the scratch buffers each reader and writer owns.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// How a [`CpxReader`] serves its input, decided once at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Signature found; the remainder is inflated.
    Framed,
    /// No signature; everything, including the sniffed bytes, passes through.
    Plain,
}

impl Mode {
    /// Decide the mode from the first bytes of a stream.
    ///
    /// Anything shorter than [`MAGIC`] can't be framed.
    #[must_use]
    pub fn sniff(prefix: &[u8]) -> Self {
        if prefix.starts_with(&MAGIC) { Mode::Framed } else { Mode::Plain }
    }
}
