use super::{CHUNK_SIZE, MAGIC};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use flate2::{Compress, Compression as Level, FlushCompress, Status};
use std::io::{self, Write};

// Packed payloads are usually small markup documents, so spend the CPU on ratio.
const LEVEL: Level = Level::best();

/// Writes the CPX signature, then deflates everything written after it.
///
/// Call [`close`](Self::close) or [`finish`](Self::finish) to terminate the
/// Deflate stream. Dropping an unclosed writer finalizes it too, but any
/// error along the way is lost.
///
/// Nothing but the signature is emitted for an empty payload.
pub struct CpxWriter<W: Write> {
    sink: Option<W>,
    deflater: Compress,
    buffer: Box<[u8]>,
    started: bool,
    finished: bool,
}

impl<W: Write> CpxWriter<W> {
    /// Wrap `sink`, writing the signature to it immediately.
    pub fn new(mut sink: W) -> Result<Self> {
        sink.write_all(&MAGIC).or_raise(|| ErrorKind::Io)?;
        Ok(Self {
            sink: Some(sink),
            deflater: Compress::new(LEVEL, true),
            buffer: vec![0; CHUNK_SIZE].into_boxed_slice(),
            started: false,
            finished: false,
        })
    }

    /// Returns `true` once the writer has been closed.
    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }

    /// Uncompressed bytes accepted so far.
    pub fn total_in(&self) -> u64 {
        self.deflater.total_in()
    }

    /// Compressed bytes produced so far, not counting the signature.
    pub fn total_out(&self) -> u64 {
        self.deflater.total_out()
    }

    /// Terminate the Deflate stream, flush and close the sink.
    ///
    /// A failing flush is logged and ignored so the sink still gets closed.
    /// Closing an already closed writer does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.sink.is_none() {
            return Ok(());
        }
        let finalized = self.finalize();
        if let Some(mut sink) = self.sink.take() {
            if let Err(error) = sink.flush() {
                tracing::warn!(%error, "failed to flush sink while closing CPX stream");
            }
        }
        finalized.or_raise(|| ErrorKind::Io)
    }

    /// Terminate the Deflate stream and hand the flushed sink back.
    pub fn finish(mut self) -> Result<W> {
        self.finalize().or_raise(|| ErrorKind::Io)?;
        let Some(mut sink) = self.sink.take() else {
            exn::bail!(ErrorKind::Closed);
        };
        sink.flush().or_raise(|| ErrorKind::Io)?;
        Ok(sink)
    }

    /// Run one step of the compressor and forward whatever it produced.
    fn deflate(&mut self, input: &[u8], flush: FlushCompress) -> io::Result<(usize, Status)> {
        let sink = self.sink.as_mut().ok_or_else(|| ErrorKind::Closed.into_io())?;
        let before_in = self.deflater.total_in();
        let before_out = self.deflater.total_out();
        let status = self.deflater.compress(input, &mut self.buffer, flush).map_err(|error| {
            tracing::warn!(%error, "deflate failed");
            ErrorKind::Encoder.into_io()
        })?;
        let consumed = (self.deflater.total_in() - before_in) as usize;
        let produced = (self.deflater.total_out() - before_out) as usize;
        sink.write_all(&self.buffer[..produced])?;
        Ok((consumed, status))
    }

    fn finalize(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        if self.started {
            while self.deflate(&[], FlushCompress::Finish)?.1 != Status::StreamEnd {}
        }
        self.finished = true;
        tracing::debug!(
            input_size = self.deflater.total_in(),
            output_size = self.deflater.total_out(),
            "finished CPX stream"
        );
        Ok(())
    }
}

impl<W: Write> Write for CpxWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.sink.is_none() || self.finished {
            return Err(ErrorKind::Closed.into_io());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        self.started = true;
        let mut consumed = 0;
        while consumed < buf.len() {
            consumed += self.deflate(&buf[consumed..], FlushCompress::None)?.0;
        }
        Ok(consumed)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.as_mut().ok_or_else(|| ErrorKind::Closed.into_io())?.flush()
    }
}

impl<W: Write> Drop for CpxWriter<W> {
    fn drop(&mut self) {
        if self.sink.is_some() {
            let _ = self.finalize();
        }
    }
}
