//! Compression Operations

use crate::error::{ErrorKind, IoResultExt, Result};
use crate::{Compression, CpxReader, CpxWriter};
use bzip2::{Compression as BzCompression, read::BzDecoder, write::BzEncoder};
use exn::ResultExt;
use flate2::{Compression as GzCompression, read::GzDecoder, write::GzEncoder};
use std::io::{self, Read, Write};
use tracing::instrument;
#[cfg(feature = "xz")]
use xz2::{read::XzDecoder, write::XzEncoder};
#[cfg(feature = "zstd")]
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

// Use the highest compression level available for the formats; this crate
// prioritizes storage space over speed. CPX hardcodes its own (best) level.
const BZIP2_LEVEL: BzCompression = BzCompression::best();
const GZIP_LEVEL: GzCompression = GzCompression::best();
#[cfg(feature = "xz")]
const XZ_LEVEL: u32 = 9;
#[cfg(feature = "zstd")]
const ZSTD_LEVEL: i32 = 22;

impl Compression {
    /// Compress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use cpx_compress::Compression;
    ///
    /// let data = b"Hello, world!";
    /// let compressed = Compression::Cpx.compress(data).unwrap();
    /// assert!(compressed.starts_with(b"CPX\0"));
    /// ```
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.compress_into(input, &mut output)?;
        Ok(output)
    }

    /// Decompress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cpx_compress::Compression;
    ///
    /// let original = b"Hello, world!";
    /// let compressed = Compression::Cpx.compress(original).unwrap();
    /// assert_ne!(compressed, original);
    /// let decompressed = Compression::Cpx.decompress(&compressed).unwrap();
    /// assert_eq!(decompressed, original);
    /// ```
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.decompress_into(input, &mut output)?;
        Ok(output)
    }

    /// Compress `input`, appending to `output`. Returns the length of `output`.
    #[instrument(skip(input, output), fields(
        format = %self,
        input_size = input.len(),
        output_size
    ))]
    pub fn compress_into(&self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        self.compress_stream(input, &mut *output)?;
        let size = output.len();
        tracing::Span::current().record("output_size", size);
        Ok(size)
    }

    /// Decompress `input`, appending to `output`. Returns the number of bytes
    /// appended.
    ///
    /// Decompressing as [`Cpx`](Self::Cpx) accepts unpacked input too and
    /// copies it verbatim.
    #[instrument(skip(input, output), fields(
        format = %self,
        input_size = input.len(),
        output_size
    ))]
    pub fn decompress_into(&self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        let mut decoder = self.wrap_reader(input)?;
        // Both ends are in memory, so any failure is down to the input.
        let size = decoder.read_to_end(output).or_raise_io(|| ErrorKind::InvalidData)?;
        tracing::Span::current().record("output_size", size);
        Ok(size)
    }

    /// Wrap a reader with the appropriate decompression layer.
    ///
    /// Returns a boxed reader that automatically decompresses data.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::{Cursor, Read};
    /// use cpx_compress::Compression;
    ///
    /// let original = b"Hello, world!";
    /// let compressed = Compression::Gzip.compress(original).unwrap();
    /// let cursor = Cursor::new(compressed);
    /// let mut reader = Compression::Gzip.wrap_reader(cursor).unwrap();
    /// let mut decompressed = Vec::new();
    /// reader.read_to_end(&mut decompressed).unwrap();
    /// assert_eq!(decompressed, original);
    /// ```
    pub fn wrap_reader<'a, R: Read + 'a>(&self, reader: R) -> Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Compression::None => Box::new(reader),
            Compression::Cpx => Box::new(CpxReader::new(reader)?),
            Compression::Bzip2 => Box::new(BzDecoder::new(reader)),
            Compression::Gzip => Box::new(GzDecoder::new(reader)),
            #[cfg(feature = "xz")]
            Compression::Xz => Box::new(XzDecoder::new(reader)),
            #[cfg(feature = "zstd")]
            Compression::Zstd => Box::new(ZstdDecoder::new(reader).or_raise(|| ErrorKind::Encoder)?),
        })
    }

    /// Wrap a writer with the appropriate compression layer.
    ///
    /// Returns a boxed writer that automatically compresses data. The stream
    /// is finalized when the writer is dropped, and any error raised while
    /// doing so is lost; use [`compress_stream`](Self::compress_stream) when
    /// a truncated output must not go unnoticed.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::Write;
    /// use cpx_compress::Compression;
    ///
    /// let mut output = Vec::new();
    /// let mut writer = Compression::Cpx.wrap_writer(&mut output).unwrap();
    /// writer.write_all(b"Hello, world!").unwrap();
    /// drop(writer);
    /// assert_eq!(Compression::Cpx.decompress(&output).unwrap(), b"Hello, world!");
    /// ```
    pub fn wrap_writer<'a, W: Write + 'a>(&self, writer: W) -> Result<Box<dyn Write + 'a>> {
        Ok(match self {
            Compression::None => Box::new(writer),
            Compression::Cpx => Box::new(CpxWriter::new(writer)?),
            Compression::Bzip2 => Box::new(BzEncoder::new(writer, BZIP2_LEVEL)),
            Compression::Gzip => Box::new(GzEncoder::new(writer, GZIP_LEVEL)),
            #[cfg(feature = "xz")]
            Compression::Xz => Box::new(XzEncoder::new(writer, XZ_LEVEL)),
            #[cfg(feature = "zstd")]
            Compression::Zstd => {
                Box::new(ZstdEncoder::new(writer, ZSTD_LEVEL).or_raise(|| ErrorKind::Encoder)?.auto_finish())
            },
        })
    }

    /// Compress from a reader to a writer, returning bytes read.
    ///
    /// Every encoder is finished explicitly, so a sink failing while the tail
    /// of the stream is written is reported rather than dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::Cursor;
    /// use cpx_compress::Compression;
    ///
    /// let input = Cursor::new(b"Hello, world!");
    /// let mut output = Vec::new();
    /// let bytes = Compression::Cpx.compress_stream(input, &mut output).unwrap();
    /// assert_eq!(bytes, 13);
    /// ```
    #[instrument(skip(reader, writer), fields(format = %self))]
    pub fn compress_stream<R: Read, W: Write>(&self, mut reader: R, mut writer: W) -> Result<u64> {
        let (bytes, mut sink) = match self {
            Compression::None => (copy(&mut reader, &mut writer)?, writer),
            Compression::Cpx => {
                let mut encoder = CpxWriter::new(writer)?;
                (copy(&mut reader, &mut encoder)?, encoder.finish()?)
            },
            Compression::Bzip2 => {
                let mut encoder = BzEncoder::new(writer, BZIP2_LEVEL);
                (copy(&mut reader, &mut encoder)?, encoder.finish().or_raise(|| ErrorKind::Io)?)
            },
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(writer, GZIP_LEVEL);
                (copy(&mut reader, &mut encoder)?, encoder.finish().or_raise(|| ErrorKind::Io)?)
            },
            #[cfg(feature = "xz")]
            Compression::Xz => {
                let mut encoder = XzEncoder::new(writer, XZ_LEVEL);
                (copy(&mut reader, &mut encoder)?, encoder.finish().or_raise(|| ErrorKind::Io)?)
            },
            #[cfg(feature = "zstd")]
            Compression::Zstd => {
                let mut encoder = ZstdEncoder::new(writer, ZSTD_LEVEL).or_raise(|| ErrorKind::Encoder)?;
                (copy(&mut reader, &mut encoder)?, encoder.finish().or_raise(|| ErrorKind::Io)?)
            },
        };
        sink.flush().or_raise(|| ErrorKind::Io)?;
        Ok(bytes)
    }

    /// Decompress from a reader to a writer, returning bytes written.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::Cursor;
    /// use cpx_compress::Compression;
    ///
    /// let original = b"Hello, world!";
    /// let compressed = Compression::Cpx.compress(original).unwrap();
    ///
    /// let input = Cursor::new(compressed);
    /// let mut output = Vec::new();
    /// let bytes = Compression::Cpx.decompress_stream(input, &mut output).unwrap();
    /// assert_eq!(output, original);
    /// assert_eq!(bytes, original.len() as u64);
    /// ```
    pub fn decompress_stream<'a, R: Read + 'a, W: Write>(&self, reader: R, mut writer: W) -> Result<u64> {
        let mut reader = self.wrap_reader(reader)?;
        copy(&mut reader, &mut writer)
    }
}

/// `io::copy`, keeping whatever kind a CPX adapter reported.
fn copy<R: Read + ?Sized, W: Write + ?Sized>(reader: &mut R, writer: &mut W) -> Result<u64> {
    io::copy(reader, writer).or_raise_io(|| ErrorKind::Io)
}

#[cfg(test)]
mod tests {
    use crate::Compression;
    use crate::error::ErrorKind;
    use rstest::rstest;
    use std::io::{self, Cursor, Read, Write};

    /// Sink with room for `room` bytes that fails every write after that.
    struct Cramped {
        written: Vec<u8>,
        room: usize,
    }

    impl Write for Cramped {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.room - self.written.len());
            if n == 0 {
                return Err(io::Error::other("disk full"));
            }
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[rstest]
    #[case(Compression::None)]
    #[case(Compression::Cpx)]
    #[case(Compression::Bzip2)]
    #[case(Compression::Gzip)]
    #[cfg_attr(feature = "xz", case(Compression::Xz))]
    #[cfg_attr(feature = "zstd", case(Compression::Zstd))]
    fn test_compress_decompress(#[case] format: Compression) {
        let original = b"Hello, world! This is a test of some compression.";
        let compressed = format.compress(original).unwrap();
        assert!(format.check_magic_bytes(&compressed));
        let decompressed = format.decompress(&compressed).unwrap();
        assert_eq!(decompressed, original);
    }

    #[rstest]
    #[case(Compression::Bzip2)]
    #[case(Compression::Gzip)]
    #[cfg_attr(feature = "xz", case(Compression::Xz))]
    #[cfg_attr(feature = "zstd", case(Compression::Zstd))]
    fn test_invalid_compressed_data(#[case] format: Compression) {
        let invalid_data = b"This is not compressed data";
        assert!(format.decompress(invalid_data).is_err());
    }

    #[test]
    fn test_cpx_decompress_plain_data() {
        let plain = b"<svg/>";
        assert_eq!(Compression::Cpx.decompress(plain).unwrap(), plain);
    }

    #[test]
    fn test_cpx_decompress_corrupt() {
        let err = Compression::Cpx.decompress(b"CPX\0not deflate at all").unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidData);
    }

    #[test]
    fn test_cpx_decompress_truncated() {
        let original: Vec<u8> = (0..20_000u32).flat_map(|i| (i * 7919).to_be_bytes()).collect();
        let compressed = Compression::Cpx.compress(&original).unwrap();
        let err = Compression::Cpx.decompress(&compressed[..compressed.len() - 10]).unwrap_err();
        assert_eq!(*err, ErrorKind::Truncated);
    }

    #[rstest]
    #[case(Compression::None)]
    #[case(Compression::Cpx)]
    #[case(Compression::Gzip)]
    fn test_wrap_reader(#[case] format: Compression) {
        let original = b"Hello, world!";
        let compressed = format.compress(original).unwrap();
        let mut reader = format.wrap_reader(Cursor::new(compressed)).expect("decoder to initialize");
        let mut decompressed = Vec::new();
        reader.read_to_end(&mut decompressed).unwrap();
        assert_eq!(decompressed, original);
    }

    #[rstest]
    #[case(Compression::None)]
    #[case(Compression::Cpx)]
    #[case(Compression::Gzip)]
    fn test_wrap_writer(#[case] format: Compression) {
        let original = b"Hello, world!";
        let mut output = Vec::new();
        let mut writer = format.wrap_writer(&mut output).expect("encoder to initialize");
        writer.write_all(original).unwrap();
        drop(writer);
        assert_eq!(format.decompress(&output).unwrap(), original);
    }

    #[rstest]
    #[case(Compression::None)]
    #[case(Compression::Cpx)]
    #[case(Compression::Gzip)]
    #[case(Compression::Bzip2)]
    #[cfg_attr(feature = "xz", case(Compression::Xz))]
    #[cfg_attr(feature = "zstd", case(Compression::Zstd))]
    fn test_stream_roundtrip(#[case] format: Compression) {
        let original = b"Hello, world! This is a test of streaming compression.";

        let input = Cursor::new(original.as_slice());
        let mut compressed = Vec::new();
        let bytes_in = format.compress_stream(input, &mut compressed).unwrap();
        assert_eq!(bytes_in, original.len() as u64);

        let input = Cursor::new(compressed);
        let mut decompressed = Vec::new();
        let bytes_out = format.decompress_stream(input, &mut decompressed).unwrap();
        assert_eq!(bytes_out, original.len() as u64);
        assert_eq!(decompressed, original);
    }

    #[rstest]
    #[case(Compression::Cpx)]
    #[case(Compression::Gzip)]
    fn test_stream_empty_input(#[case] format: Compression) {
        let input = Cursor::new(b"");
        let mut compressed = Vec::new();
        let bytes = format.compress_stream(input, &mut compressed).unwrap();
        assert_eq!(bytes, 0);

        let input = Cursor::new(compressed);
        let mut decompressed = Vec::new();
        let bytes = format.decompress_stream(input, &mut decompressed).unwrap();
        assert_eq!(bytes, 0);
        assert!(decompressed.is_empty());
    }

    #[rstest]
    #[case(Compression::None)]
    #[case(Compression::Cpx)]
    #[case(Compression::Gzip)]
    #[case(Compression::Bzip2)]
    fn test_compress_stream_reports_short_sink(#[case] format: Compression) {
        // Room for the CPX signature and nothing else.
        let mut sink = Cramped { written: Vec::new(), room: 4 };
        let err = format.compress_stream(&b"Hello, world!"[..], &mut sink).unwrap_err();
        assert_eq!(*err, ErrorKind::Io);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_decompress_stream_sink_failure_is_io() {
        let compressed = Compression::Cpx.compress(b"Hello, world!").unwrap();
        let mut sink = Cramped { written: Vec::new(), room: 0 };
        let err = Compression::Cpx.decompress_stream(compressed.as_slice(), &mut sink).unwrap_err();
        assert_eq!(*err, ErrorKind::Io);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_decompress_stream_keeps_cpx_kind() {
        let err = Compression::Cpx.decompress_stream(&b"CPX\0not deflate at all"[..], Vec::new()).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidData);
        assert!(!err.is_retryable());
    }
}
