use super::{CHUNK_SIZE, MAGIC, Mode};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use flate2::{Decompress, FlushDecompress, Status};
use std::io::{self, Read};

/// Reads CPX streams, and anything else verbatim.
///
/// The first four bytes of the source are inspected on construction. If they
/// are the CPX signature the rest of the source is inflated, otherwise those
/// bytes are replayed and the source is passed through untouched. The
/// [`Mode`] never changes afterwards.
///
/// Once a read returns `Ok(0)` every later read does too. Corrupt or truncated
/// compressed data fails exactly one read with an I/O error carrying
/// [`ErrorKind::InvalidData`] or [`ErrorKind::Truncated`]; the reader is
/// exhausted after that.
pub struct CpxReader<R: Read> {
    source: Option<R>,
    codec: Codec,
    exhausted: bool,
    failed: bool,
}

enum Codec {
    Plain(Plain),
    Framed(Framed),
}

/// Sniffed bytes that still have to be handed out.
struct Plain {
    pending: [u8; MAGIC.len()],
    start: usize,
    end: usize,
}

struct Framed {
    inflater: Decompress,
    input: Box<[u8]>,
    start: usize,
    end: usize,
    /// Whether the source produced anything after the signature.
    fed: bool,
    source_done: bool,
    stream_done: bool,
}

impl<R: Read> CpxReader<R> {
    /// Wrap `source`, reading up to four bytes from it to detect the mode.
    ///
    /// A source shorter than the signature is not an error; it is plain data.
    pub fn new(mut source: R) -> Result<Self> {
        let mut pending = [0; MAGIC.len()];
        let sniffed = fill(&mut source, &mut pending).or_raise(|| ErrorKind::Io)?;
        let mode = Mode::sniff(&pending[..sniffed]);
        tracing::debug!(?mode, sniffed, "detected CPX stream mode");
        let codec = match mode {
            Mode::Framed => Codec::Framed(Framed {
                inflater: Decompress::new(true),
                input: vec![0; CHUNK_SIZE].into_boxed_slice(),
                start: 0,
                end: 0,
                fed: false,
                source_done: false,
                stream_done: false,
            }),
            Mode::Plain => Codec::Plain(Plain { pending, start: 0, end: sniffed }),
        };
        Ok(Self { source: Some(source), codec, exhausted: false, failed: false })
    }

    /// The mode detected on construction.
    pub fn mode(&self) -> Mode {
        match self.codec {
            Codec::Plain(_) => Mode::Plain,
            Codec::Framed(_) => Mode::Framed,
        }
    }

    /// Returns `true` once the reader has nothing more to give.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Returns `true` if the reader reached the end of its data without
    /// hitting corrupt or truncated input.
    pub fn is_complete(&self) -> bool {
        self.exhausted && !self.failed
    }

    /// Discard up to `n` bytes of output, returning how many were skipped.
    ///
    /// Keeps reading until `n` bytes are gone or the stream ends, so a short
    /// count always means end of stream.
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        io::copy(&mut self.by_ref().take(n), &mut io::sink())
    }

    /// Stop reading and drop the source. Closing twice does nothing.
    pub fn close(&mut self) {
        self.exhausted = true;
        self.source = None;
    }

    /// Give back the source, unless the reader was closed.
    ///
    /// The source may already have been read past what this reader handed
    /// out: sniffed bytes not yet replayed and compressed input buffered for
    /// the inflater are discarded.
    pub fn into_inner(self) -> Option<R> {
        self.source
    }
}

impl<R: Read> Read for CpxReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.exhausted || buf.is_empty() {
            return Ok(0);
        }
        let Some(source) = self.source.as_mut() else {
            return Ok(0);
        };
        let result = match &mut self.codec {
            Codec::Plain(plain) => plain.read(source, buf),
            Codec::Framed(framed) => framed.read(source, buf),
        };
        match result {
            Ok(0) => {
                self.exhausted = true;
                Ok(0)
            },
            Ok(n) => Ok(n),
            Err(err) => {
                // Decoder failures are final; plain I/O errors are the source's
                // business and may well go away on the next call.
                if ErrorKind::from_io(&err).is_some() {
                    self.exhausted = true;
                    self.failed = true;
                }
                Err(err)
            },
        }
    }
}

impl Plain {
    fn read<R: Read>(&mut self, source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
        let replayed = (self.end - self.start).min(buf.len());
        buf[..replayed].copy_from_slice(&self.pending[self.start..self.start + replayed]);
        self.start += replayed;
        if replayed == buf.len() {
            return Ok(replayed);
        }
        match source.read(&mut buf[replayed..]) {
            Ok(n) => Ok(replayed + n),
            // Don't lose the replayed bytes; the error comes back next time.
            Err(_) if replayed > 0 => Ok(replayed),
            Err(err) => Err(err),
        }
    }
}

impl Framed {
    fn read<R: Read>(&mut self, source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.stream_done {
                return Ok(0);
            }
            if self.start == self.end && !self.source_done {
                match source.read(&mut self.input)? {
                    0 => self.source_done = true,
                    n => {
                        self.start = 0;
                        self.end = n;
                        self.fed = true;
                    },
                }
            }
            if self.source_done && !self.fed {
                // Signature with nothing after it: an empty payload.
                return Ok(0);
            }

            let (consumed, produced, status) = self.inflate(buf)?;
            self.start += consumed;
            if status == Status::StreamEnd {
                self.stream_done = true;
            }
            if produced > 0 || self.stream_done {
                return Ok(produced);
            }
            if self.source_done {
                tracing::warn!(input_size = self.inflater.total_in(), "CPX stream ended before it was complete");
                return Err(ErrorKind::Truncated.into_io());
            }
            if consumed == 0 && self.start < self.end {
                tracing::warn!(input_size = self.inflater.total_in(), "inflater stalled on CPX stream");
                return Err(ErrorKind::InvalidData.into_io());
            }
        }
    }

    /// Returns `(consumed, produced, status)`.
    fn inflate(&mut self, buf: &mut [u8]) -> io::Result<(usize, usize, Status)> {
        let before_in = self.inflater.total_in();
        let before_out = self.inflater.total_out();
        let status = self
            .inflater
            .decompress(&self.input[self.start..self.end], buf, FlushDecompress::None)
            .map_err(|error| {
                tracing::warn!(%error, input_size = before_in, "malformed CPX stream");
                ErrorKind::InvalidData.into_io()
            })?;
        let consumed = (self.inflater.total_in() - before_in) as usize;
        let produced = (self.inflater.total_out() - before_out) as usize;
        Ok((consumed, produced, status))
    }
}

/// Read until `buf` is full or the source runs dry.
fn fill<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CpxWriter;
    use rstest::rstest;
    use std::io::Write;

    /// Hands out at most one byte per read.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match (self.0.split_first(), buf.first_mut()) {
                (Some((byte, rest)), Some(slot)) => {
                    *slot = *byte;
                    self.0 = rest;
                    Ok(1)
                },
                _ => Ok(0),
            }
        }
    }

    /// Serves its data once, then fails every read.
    struct Failing<'a>(&'a [u8]);

    impl Read for Failing<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
            }
            let n = self.0.len().min(buf.len());
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0 = &self.0[n..];
            Ok(n)
        }
    }

    fn pack(payload: &[u8]) -> Vec<u8> {
        let mut writer = CpxWriter::new(Vec::new()).unwrap();
        writer.write_all(payload).unwrap();
        writer.finish().unwrap()
    }

    fn unpack<R: Read>(source: R) -> (Mode, Vec<u8>) {
        let mut reader = CpxReader::new(source).unwrap();
        let mut output = Vec::new();
        reader.read_to_end(&mut output).unwrap();
        assert!(reader.is_complete());
        (reader.mode(), output)
    }

    fn repetitive(len: usize) -> Vec<u8> {
        b"<node id=\"1\" lat=\"51.5\" lon=\"-0.12\"/>\n".iter().copied().cycle().take(len).collect()
    }

    fn noisy(len: usize) -> Vec<u8> {
        let mut state = 0x2545_f491_u32;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect()
    }

    #[rstest]
    #[case(Vec::new())]
    #[case(b"a".to_vec())]
    #[case(b"Hello, world!".to_vec())]
    #[case(b"CPX\0already framed?".to_vec())]
    #[case(repetitive(100_000))]
    #[case(noisy(3 * CHUNK_SIZE + 17))]
    fn test_roundtrip(#[case] payload: Vec<u8>) {
        let packed = pack(&payload);
        let (mode, output) = unpack(packed.as_slice());
        assert_eq!(mode, Mode::Framed);
        assert_eq!(output, payload);

        let (mode, output) = unpack(Trickle(&packed));
        assert_eq!(mode, Mode::Framed);
        assert_eq!(output, payload);
    }

    #[test]
    fn test_roundtrip_large_repetitive() {
        let payload = repetitive(1024 * 1024);
        let packed = pack(&payload);
        assert!(packed.len() < payload.len() / 20);
        let (_, output) = unpack(packed.as_slice());
        assert_eq!(output, payload);
    }

    #[rstest]
    #[case(b"")]
    #[case(b"X")]
    #[case(b"XY\x01")]
    #[case(b"CPX")]
    #[case(b"CPX\x01")]
    #[case(b"<svg/>")]
    #[case(b"<?xml version=\"1.0\"?><osm version=\"0.6\"/>")]
    fn test_plain_passthrough(#[case] input: &[u8]) {
        let (mode, output) = unpack(input);
        assert_eq!(mode, Mode::Plain);
        assert_eq!(output, input);

        let (mode, output) = unpack(Trickle(input));
        assert_eq!(mode, Mode::Plain);
        assert_eq!(output, input);
    }

    #[test]
    fn test_plain_one_byte_at_a_time() {
        let input = b"<svg/>";
        let mut reader = CpxReader::new(&input[..]).unwrap();
        let mut output = Vec::new();
        let mut byte = [0; 1];
        while reader.read(&mut byte).unwrap() == 1 {
            output.push(byte[0]);
            assert_eq!(reader.mode(), Mode::Plain);
        }
        assert_eq!(output, input);
    }

    #[test]
    fn test_plain_replays_sniffed_bytes_before_source_error() {
        let mut reader = CpxReader::new(Failing(b"XYZW")).unwrap();
        let mut buf = [0; 16];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"XYZW");
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert!(!reader.is_exhausted());
    }

    #[test]
    fn test_signature_only_is_empty_payload() {
        let (mode, output) = unpack(&MAGIC[..]);
        assert_eq!(mode, Mode::Framed);
        assert!(output.is_empty());
    }

    #[test]
    fn test_end_of_stream_is_sticky() {
        for source in [pack(b"Hello, world!"), b"<svg/>".to_vec()] {
            let mut reader = CpxReader::new(source.as_slice()).unwrap();
            let mut output = Vec::new();
            reader.read_to_end(&mut output).unwrap();
            let mut buf = [0; 32];
            for _ in 0..3 {
                assert_eq!(reader.read(&mut buf).unwrap(), 0);
            }
            assert!(reader.is_exhausted());
        }
    }

    #[test]
    fn test_trailing_bytes_after_stream_are_ignored() {
        let mut packed = pack(b"Hello, world!");
        packed.extend_from_slice(b"trailing junk");
        let (_, output) = unpack(packed.as_slice());
        assert_eq!(output, b"Hello, world!");
    }

    #[test]
    fn test_corrupt_stream() {
        let mut input = MAGIC.to_vec();
        input.extend_from_slice(b"this is definitely not deflate data");
        let mut reader = CpxReader::new(input.as_slice()).unwrap();
        assert_eq!(reader.mode(), Mode::Framed);

        let mut output = Vec::new();
        let err = reader.read_to_end(&mut output).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(ErrorKind::from_io(&err), Some(&ErrorKind::InvalidData));

        // Reported once, then the reader stays at end of stream.
        assert_eq!(reader.read(&mut [0; 8]).unwrap(), 0);
        assert!(reader.is_exhausted());
        assert!(!reader.is_complete());
    }

    #[test]
    fn test_truncated_stream_keeps_partial_output() {
        let payload = noisy(4 * CHUNK_SIZE);
        let packed = pack(&payload);
        let cut = &packed[..packed.len() / 2];

        let mut reader = CpxReader::new(cut).unwrap();
        let mut output = Vec::new();
        let err = reader.read_to_end(&mut output).unwrap_err();
        assert_eq!(ErrorKind::from_io(&err), Some(&ErrorKind::Truncated));
        assert!(!output.is_empty());
        assert_eq!(output, payload[..output.len()]);

        assert_eq!(reader.read(&mut [0; 8]).unwrap(), 0);
        assert!(!reader.is_complete());
    }

    #[test]
    fn test_skip_past_chunk_size() {
        let payload = repetitive(5 * CHUNK_SIZE);
        let packed = pack(&payload);
        let mut reader = CpxReader::new(packed.as_slice()).unwrap();

        let skip = 2 * CHUNK_SIZE as u64 + 3;
        assert_eq!(reader.skip(skip).unwrap(), skip);
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, payload[skip as usize..]);
    }

    #[test]
    fn test_skip_stops_at_end() {
        let mut reader = CpxReader::new(&b"<svg/>"[..]).unwrap();
        assert_eq!(reader.skip(2).unwrap(), 2);
        assert_eq!(reader.skip(100).unwrap(), 4);
        assert_eq!(reader.skip(100).unwrap(), 0);
    }

    #[test]
    fn test_close() {
        let packed = pack(b"Hello, world!");
        let mut reader = CpxReader::new(packed.as_slice()).unwrap();
        reader.close();
        reader.close();
        assert!(reader.is_exhausted());
        assert_eq!(reader.read(&mut [0; 8]).unwrap(), 0);
        assert!(reader.into_inner().is_none());
    }

    #[test]
    fn test_into_inner_is_read_ahead() {
        let reader = CpxReader::new(&b"<svg/>"[..]).unwrap();
        assert_eq!(reader.into_inner().unwrap(), b"/>");

        let mut packed = pack(b"Hello, world!");
        packed.extend_from_slice(b"trailer");
        let mut reader = CpxReader::new(packed.as_slice()).unwrap();
        let mut output = Vec::new();
        reader.read_to_end(&mut output).unwrap();
        assert_eq!(output, b"Hello, world!");
        assert!(reader.into_inner().unwrap().is_empty());
    }

    #[test]
    fn test_source_error_on_construction() {
        let err = CpxReader::new(Failing(b"")).err().unwrap();
        assert_eq!(*err, ErrorKind::Io);
    }
}
