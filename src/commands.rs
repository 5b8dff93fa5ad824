use crate::cli::Command;
use crate::error::{ErrorKind, Result};
use cpx_compress::Compression;
use cpx_compress::cli::{Flag, Preference};
use cpx_config::Config;
use exn::ResultExt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;

pub fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Compress { input, output, format } => {
            let format = resolve_format(format, output.as_deref(), config)?;
            let reader = open_input(input.as_deref(), config.buffer_size)?;
            let mut writer = open_output(output.as_deref(), config.buffer_size)?;
            compress(reader, &mut writer, format)?;
            writer.flush().or_raise(|| ErrorKind::Io)
        },
        Command::Decompress { input, output } => {
            let reader = open_input(input.as_deref(), config.buffer_size)?;
            let mut writer = open_output(output.as_deref(), config.buffer_size)?;
            decompress(reader, &mut writer)?;
            writer.flush().or_raise(|| ErrorKind::Io)
        },
        Command::Detect { paths } => detect(&paths, &mut io::stdout().lock()),
    }
}

/// Pick the output format from the flag, the destination's extension and the
/// configured default. A destination without a compression extension doesn't
/// get a say.
fn resolve_format(flag: Flag, output: Option<&Path>, config: &Config) -> Result<Compression> {
    let preference = Preference::try_from(flag).or_raise(|| ErrorKind::Usage)?;
    let implied = output.map(Compression::from_path).filter(|format| *format != Compression::None);
    Ok(preference.resolve(&config.compression, implied.as_ref()))
}

#[instrument(skip(reader, writer))]
fn compress<R: Read, W: Write>(reader: R, writer: &mut W, format: Compression) -> Result<u64> {
    let bytes = format.compress_stream(reader, writer).or_raise(|| ErrorKind::Compression)?;
    tracing::info!(bytes, "compressed");
    Ok(bytes)
}

#[instrument(skip(reader, writer))]
fn decompress<R: Read, W: Write>(reader: R, writer: &mut W) -> Result<u64> {
    let (format, mut reader) = Compression::decompress_auto(reader).or_raise(|| ErrorKind::Compression)?;
    let bytes = io::copy(&mut reader, writer).or_raise(|| ErrorKind::Compression)?;
    tracing::info!(%format, bytes, "decompressed");
    Ok(bytes)
}

fn detect<W: Write>(paths: &[PathBuf], out: &mut W) -> Result<()> {
    for path in paths {
        let file = File::open(path).or_raise(|| ErrorKind::Input(path.clone()))?;
        let (format, _) = Compression::detect(file).or_raise(|| ErrorKind::Compression)?;
        writeln!(out, "{}: {format}", path.display()).or_raise(|| ErrorKind::Io)?;
    }
    Ok(())
}

fn open_input(path: Option<&Path>, capacity: usize) -> Result<Box<dyn Read>> {
    Ok(match path {
        Some(path) => {
            let file = File::open(path).or_raise(|| ErrorKind::Input(path.to_path_buf()))?;
            Box::new(BufReader::with_capacity(capacity, file))
        },
        None => Box::new(BufReader::with_capacity(capacity, io::stdin().lock())),
    })
}

fn open_output(path: Option<&Path>, capacity: usize) -> Result<BufWriter<Box<dyn Write>>> {
    let inner: Box<dyn Write> = match path {
        Some(path) => Box::new(File::create(path).or_raise(|| ErrorKind::Output(path.to_path_buf()))?),
        None => Box::new(io::stdout().lock()),
    };
    Ok(BufWriter::with_capacity(capacity, inner))
}
