//! Peek at the start of a stream, then replay it.
//!
//! Thin convenience wrapper around standard library I/O primitives
//! ([`Read::take`], [`Cursor`], [`Chain`]) for the peek-decide-stream pattern,
//! and the signature sniffing built on top of it.

use crate::Compression;
use crate::construct::SIGNATURE_LEN;
use crate::error::{ErrorKind, IoResultExt, Result};
use std::io::{Chain, Cursor, Read, Write};

/// A resumable [`Read`]er for peek-decide-stream workflows.
///
/// Read enough data to inspect (a signature, an XML prolog), then either
/// stream the full content onward via [`into_reader`](Self::into_reader),
/// [`into_bytes`](Self::into_bytes), [`copy_into`](Self::copy_into), or drop
/// to discard. No byte read while peeking is lost.
pub struct PeekableReader<R> {
    decoder: R,
    buffer: Vec<u8>,
}

impl<R: Read> PeekableReader<R> {
    /// Wrap any reader for peeking.
    pub fn new(decoder: R) -> Self {
        Self { decoder, buffer: Vec::new() }
    }

    /// Read up to `limit` bytes of content.
    ///
    /// Returns a slice of all buffered data. Successive calls do not accumulate:
    /// - `peek(4*1024)` puts 4KiB in the buffer, returns 4KiB
    /// - `peek(8*1024)` puts an additional 4KiB in the buffer, returns 8KiB
    /// - `peek(2*1024)` immediately returns 2KiB (because buffer already has 8KiB)
    ///
    /// Returns fewer than `limit` bytes only if the stream ended.
    pub fn peek(&mut self, limit: usize) -> Result<&[u8]> {
        if self.buffer.len() >= limit {
            return Ok(&self.buffer[..limit]);
        }
        let needed = (limit - self.buffer.len()) as u64;
        (&mut self.decoder).take(needed).read_to_end(&mut self.buffer).or_raise_io(|| ErrorKind::Io)?;
        Ok(&self.buffer[..self.buffer.len().min(limit)])
    }

    /// Access data read into internal buffer so far.
    pub fn head(&self) -> &[u8] {
        &self.buffer
    }

    /// Convert into a [`Read`]er that replays the buffered head, then
    /// streams the rest of the input.
    pub fn into_reader(self) -> Chain<Cursor<Vec<u8>>, R> {
        Cursor::new(self.buffer).chain(self.decoder)
    }

    /// Read all remaining data and return the complete buffer.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        self.decoder.read_to_end(&mut self.buffer).or_raise_io(|| ErrorKind::InvalidData)?;
        Ok(self.buffer)
    }

    /// Stream all data (buffered plus unbuffered) into the specified
    /// writer. Works well with [`Compression::wrap_writer`].
    pub fn copy_into<W: Write>(self, writer: &mut W) -> Result<u64> {
        std::io::copy(&mut self.into_reader(), writer).or_raise_io(|| ErrorKind::Io)
    }
}

impl Compression {
    /// Sniff the format of a stream from its signature without losing any of it.
    ///
    /// The returned reader yields the stream from its very first byte.
    /// Unrecognised signatures, and streams too short to carry one, are
    /// reported as [`None`](Self::None).
    ///
    /// # Example
    ///
    /// ```
    /// use cpx_compress::Compression;
    /// use std::io::Read;
    ///
    /// let packed = Compression::Cpx.compress(b"<svg/>").unwrap();
    /// let (format, mut reader) = Compression::detect(packed.as_slice()).unwrap();
    /// assert_eq!(format, Compression::Cpx);
    ///
    /// let mut replayed = Vec::new();
    /// reader.read_to_end(&mut replayed).unwrap();
    /// assert_eq!(replayed, packed);
    /// ```
    pub fn detect<R: Read>(reader: R) -> Result<(Compression, Chain<Cursor<Vec<u8>>, R>)> {
        let mut peekable = PeekableReader::new(reader);
        let format = Compression::from_magic_bytes(peekable.peek(SIGNATURE_LEN)?);
        tracing::debug!(%format, "detected stream format");
        Ok((format, peekable.into_reader()))
    }

    /// Detect the format of a stream and wrap it with the matching decoder.
    ///
    /// Input with no recognised signature passes through untouched.
    pub fn decompress_auto<'a, R: Read + 'a>(reader: R) -> Result<(Compression, Box<dyn Read + 'a>)> {
        let (format, reader) = Compression::detect(reader)?;
        Ok((format, format.wrap_reader(reader)?))
    }

    /// Create a peekable decompressor from any reader.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use cpx_compress::Compression;
    /// use std::fs::File;
    /// use std::io::BufReader;
    /// use std::path::PathBuf;
    ///
    /// let source_path = PathBuf::from("path/to/icon.svg.cpx");
    /// let source_reader = BufReader::new(File::open(&source_path).unwrap());
    ///
    /// let mut peekable = Compression::from_path(&source_path)
    ///     .peekable_reader(source_reader)
    ///     .unwrap();
    /// let is_xml = peekable.peek(5).unwrap() == b"<?xml";
    /// ```
    pub fn peekable_reader<'a, R: Read + 'a>(&self, reader: R) -> Result<PeekableReader<Box<dyn Read + 'a>>> {
        Ok(PeekableReader::new(self.wrap_reader(reader)?))
    }

    /// Create a peekable decompressor from compressed bytes. Convenience
    /// wrapper over [`peekable_reader`](Self::peekable_reader) for in-memory
    /// data.
    pub fn peekable_data<'a>(&self, input: &'a [u8]) -> Result<PeekableReader<Box<dyn Read + 'a>>> {
        self.peekable_reader(Cursor::new(input))
    }
}
