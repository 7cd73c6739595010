//! Incremental reader for growing, possibly-compressed delimited files.
//!
//! A [`Cursor`] remembers how many decoded bytes of a file have been consumed.
//! Each read probes how many decoded bytes are currently available, reads the
//! bytes between the cursor and that size, and parses the complete lines among
//! them into a [`Frame`].
//!
//! Plain files are probed by seeking to the end. Compressed files cannot seek
//! backwards in decoded space, so the cursor keeps the open file handle and
//! re-decodes from its start, discarding the consumed prefix. A decoder that
//! stops early (file still being written, or cut off) degrades the probe to
//! [`SizeProbe::BestEffort`] instead of failing the read.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use snafu::prelude::*;
use tracing::{debug, trace, warn};

use super::compression::CompressionFormat;
use super::frame::{Frame, Schema};
use crate::emit;
use crate::error::{
    DecoderSnafu, MissingHeaderSnafu, OpenSnafu, ParseSnafu, ReadSnafu, ReaderError,
};
use crate::metrics::events::SizeProbeDegraded;

const CHUNK_SIZE: usize = 64 * 1024;

/// Configuration for the delimited reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Field delimiter (single ASCII byte).
    pub delimiter: u8,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// How many decoded bytes a file had available when it was probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeProbe {
    /// The end of the decoded stream was reached.
    Exact(u64),
    /// The decoder stopped early; this is as far as it got.
    BestEffort(u64),
}

impl SizeProbe {
    pub fn size(&self) -> u64 {
        match self {
            SizeProbe::Exact(size) | SizeProbe::BestEffort(size) => *size,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, SizeProbe::Exact(_))
    }
}

/// Read position in one file: the open handle plus the decoded bytes consumed.
///
/// Positions only move forward. A failed read leaves the cursor untouched.
#[derive(Debug)]
pub struct Cursor {
    path: PathBuf,
    format: CompressionFormat,
    file: File,
    /// Decoded bytes consumed (always at a line boundary).
    position: u64,
    /// Header parsed from this file's stream, if it has been consumed.
    header: Option<Schema>,
    /// Compressed length seen at the last probe of a decoded stream.
    source_len: Option<u64>,
    last_probe: Option<SizeProbe>,
}

impl Cursor {
    /// Open `path` at decoded offset 0.
    pub fn open(path: &Path) -> Result<Self, ReaderError> {
        let file = File::open(path).context(OpenSnafu { path })?;
        Ok(Self {
            path: path.to_path_buf(),
            format: CompressionFormat::from_path(path),
            file,
            position: 0,
            header: None,
            source_len: None,
            last_probe: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> CompressionFormat {
        self.format
    }

    /// Decoded bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether the header line has been consumed by a read through this cursor.
    pub fn header_consumed(&self) -> bool {
        self.header.is_some()
    }

    pub fn last_probe(&self) -> Option<SizeProbe> {
        self.last_probe
    }
}

/// Rows newly available since the cursor's previous position.
#[derive(Debug, Clone)]
pub struct Increment {
    /// Column names the rows are aligned to (`None` until a header is seen).
    pub schema: Option<Schema>,
    pub frame: Frame,
    pub probe: SizeProbe,
}

/// Why a pump over a decoded stream stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    Limit,
    Clean,
    Truncated,
}

#[derive(Debug, Clone, Copy)]
struct Pumped {
    bytes: u64,
    end: StreamEnd,
}

/// A reader for delimited text files (plain, gzip, bzip2 or zstd).
#[derive(Debug, Clone, Default)]
pub struct DelimitedReader {
    config: ReaderConfig,
}

impl DelimitedReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self { config }
    }

    pub fn delimiter(&self) -> u8 {
        self.config.delimiter
    }

    /// Read only the header line of `path`.
    ///
    /// A plain file whose first line is not yet newline-terminated has no
    /// header yet; it is reported as [`ReaderError::MissingHeader`] so the
    /// caller can retry once the writer finishes the line.
    pub fn read_schema(&self, path: &Path) -> Result<Schema, ReaderError> {
        let format = CompressionFormat::from_path(path);
        let file = File::open(path).context(OpenSnafu { path })?;
        let codec = format.codec();
        let decoder = codec.decoder(file).context(DecoderSnafu {
            path,
            codec: codec.name(),
        })?;

        let mut reader = BufReader::new(decoder);
        let mut line = Vec::new();
        let terminated = match reader.read_until(b'\n', &mut line) {
            Ok(_) => line.ends_with(b"\n") || !codec.supports_exact_seek(),
            Err(e) if is_truncation(&e) => line.ends_with(b"\n"),
            Err(e) => return Err(e).context(ReadSnafu { path }),
        };

        ensure!(
            terminated && !line.trim_ascii().is_empty(),
            MissingHeaderSnafu { path }
        );
        Schema::from_header(&line, self.config.delimiter).context(ParseSnafu { path })
    }

    /// Read the header of every path, skipping files whose header can't be read.
    pub fn read_column_names(&self, paths: &[PathBuf]) -> BTreeMap<PathBuf, Schema> {
        let mut schemas = BTreeMap::new();
        for path in paths {
            match self.read_schema(path) {
                Ok(schema) => {
                    schemas.insert(path.clone(), schema);
                }
                Err(e) => debug!(path = %path.display(), error = %e, "Skipping file without readable header"),
            }
        }
        schemas
    }

    /// Read the rows appended since `cursor`, opening the file fresh when no
    /// cursor is given.
    ///
    /// With `known_schema` the increment is parsed as data only. Without it,
    /// the first line read through a fresh cursor is taken as the header.
    pub fn read_increment(
        &self,
        path: &Path,
        cursor: Option<Cursor>,
        known_schema: Option<&Schema>,
        usecols: Option<&[String]>,
    ) -> Result<(Increment, Cursor), ReaderError> {
        let mut cursor = match cursor {
            Some(cursor) => cursor,
            None => Cursor::open(path)?,
        };
        let increment = self.advance(&mut cursor, known_schema, usecols)?;
        Ok((increment, cursor))
    }

    /// Read the rows appended since `cursor` and move it past them.
    ///
    /// Only newline-terminated lines are consumed; an unterminated tail is
    /// left for a later read, unless a decoded stream ended cleanly, in which
    /// case the tail is final.
    pub fn advance(
        &self,
        cursor: &mut Cursor,
        known_schema: Option<&Schema>,
        usecols: Option<&[String]>,
    ) -> Result<Increment, ReaderError> {
        let (bytes, probe, source_len) = self.read_available(cursor)?;

        let stream_finished = probe.is_exact() && !cursor.format.codec().supports_exact_seek();
        let complete = if stream_finished {
            bytes.len()
        } else {
            bytes
                .iter()
                .rposition(|b| *b == b'\n')
                .map_or(0, |last| last + 1)
        };
        let body = &bytes[..complete];
        let path = cursor.path.as_path();
        let delimiter = self.config.delimiter;

        let mut header = cursor.header.clone();
        let (schema, frame) = match known_schema.or(cursor.header.as_ref()) {
            Some(schema) => {
                if header.is_none() && complete > 0 {
                    header = Some(schema.clone());
                }
                let frame =
                    Frame::parse(body, schema, usecols, delimiter).context(ParseSnafu { path })?;
                (Some(schema.clone()), frame)
            }
            // no complete line yet, so no header either
            None if complete == 0 => (
                None,
                Frame::empty(usecols.map(<[String]>::to_vec).unwrap_or_default()),
            ),
            None => {
                let (parsed, frame) = Frame::parse_with_header(body, usecols, delimiter)
                    .context(ParseSnafu { path })?;
                header = Some(parsed.clone());
                (Some(parsed), frame)
            }
        };

        trace!(
            path = %cursor.path.display(),
            from = cursor.position,
            consumed = complete,
            rows = frame.num_rows(),
            "Read increment"
        );

        // Commit only after everything above succeeded.
        cursor.position += complete as u64;
        cursor.header = header;
        cursor.source_len = source_len;
        cursor.last_probe = Some(probe);

        Ok(Increment {
            schema,
            frame,
            probe,
        })
    }

    /// Parse the whole file in one pass, falling back to the incremental
    /// path when the stream ends early (file still growing or cut off).
    pub fn load_full(&self, path: &Path) -> Result<Frame, ReaderError> {
        match self.read_whole(path) {
            Ok(frame) => Ok(frame),
            Err(ReaderError::Read { source, .. }) if is_truncation(&source) => {
                warn!(
                    path = %path.display(),
                    error = %source,
                    "Could not fully read file, recovering as many rows as possible"
                );
                let (increment, _) = self.read_increment(path, None, None, None)?;
                Ok(increment.frame)
            }
            Err(e) => Err(e),
        }
    }

    fn read_whole(&self, path: &Path) -> Result<Frame, ReaderError> {
        let format = CompressionFormat::from_path(path);
        let file = File::open(path).context(OpenSnafu { path })?;
        let codec = format.codec();
        let mut decoder = codec.decoder(file).context(DecoderSnafu {
            path,
            codec: codec.name(),
        })?;

        let mut bytes = Vec::new();
        decoder
            .read_to_end(&mut bytes)
            .context(ReadSnafu { path })?;

        ensure!(!bytes.is_empty(), MissingHeaderSnafu { path });
        let (_, frame) = Frame::parse_with_header(&bytes, None, self.config.delimiter)
            .context(ParseSnafu { path })?;
        Ok(frame)
    }

    /// Decoded bytes past the cursor's position, the size probe, and (for
    /// decoded streams) the compressed length they were read from.
    fn read_available(
        &self,
        cursor: &Cursor,
    ) -> Result<(Vec<u8>, SizeProbe, Option<u64>), ReaderError> {
        if cursor.format.codec().supports_exact_seek() {
            let (bytes, probe) = read_seekable(cursor)?;
            Ok((bytes, probe, None))
        } else {
            read_decoded(cursor)
        }
    }
}

/// Plain files: seek to the end for the size, then read from the position.
fn read_seekable(cursor: &Cursor) -> Result<(Vec<u8>, SizeProbe), ReaderError> {
    let path = &cursor.path;
    let mut file = &cursor.file;
    let initial_pos = cursor.position;

    let size = file.seek(SeekFrom::End(0)).context(ReadSnafu { path })?;
    if size < initial_pos {
        warn!(
            path = %path.display(),
            size,
            position = initial_pos,
            "File shrank below the read position, waiting for it to grow"
        );
        return Ok((Vec::new(), SizeProbe::Exact(size)));
    }

    file.seek(SeekFrom::Start(initial_pos))
        .context(ReadSnafu { path })?;
    let mut bytes = Vec::with_capacity((size - initial_pos) as usize);
    file.take(size - initial_pos)
        .read_to_end(&mut bytes)
        .context(ReadSnafu { path })?;
    Ok((bytes, SizeProbe::Exact(size)))
}

/// Compressed files: re-decode from the start of the retained handle,
/// discard the consumed prefix, and pump until the decoder stops.
fn read_decoded(cursor: &Cursor) -> Result<(Vec<u8>, SizeProbe, Option<u64>), ReaderError> {
    let path = &cursor.path;
    let source_len = cursor.file.metadata().context(ReadSnafu { path })?.len();

    if cursor.source_len == Some(source_len)
        && let Some(probe) = cursor.last_probe
    {
        trace!(path = %path.display(), "Compressed file unchanged since last probe");
        return Ok((Vec::new(), probe, Some(source_len)));
    }

    let mut handle = cursor.file.try_clone().context(ReadSnafu { path })?;
    handle
        .seek(SeekFrom::Start(0))
        .context(ReadSnafu { path })?;
    let codec = cursor.format.codec();
    let mut decoder = codec.decoder(handle).context(DecoderSnafu {
        path,
        codec: codec.name(),
    })?;

    let skipped = pump(&mut decoder, cursor.position, None).context(ReadSnafu { path })?;
    if skipped.bytes < cursor.position {
        let probe = degrade(skipped, skipped.bytes, codec.name(), path);
        return Ok((Vec::new(), probe, Some(source_len)));
    }

    let mut bytes = Vec::new();
    let rest = pump(&mut decoder, u64::MAX, Some(&mut bytes)).context(ReadSnafu { path })?;
    let probe = degrade(rest, cursor.position + rest.bytes, codec.name(), path);
    Ok((bytes, probe, Some(source_len)))
}

fn degrade(pumped: Pumped, size: u64, codec: &'static str, path: &Path) -> SizeProbe {
    match pumped.end {
        StreamEnd::Truncated => {
            debug!(
                path = %path.display(),
                codec,
                size,
                "Decoded stream ended early, using best-effort size"
            );
            emit!(SizeProbeDegraded { codec });
            SizeProbe::BestEffort(size)
        }
        StreamEnd::Clean | StreamEnd::Limit => SizeProbe::Exact(size),
    }
}

/// Read up to `limit` decoded bytes, optionally keeping them.
///
/// Truncation-style errors end the pump instead of failing it.
fn pump(reader: &mut dyn Read, limit: u64, mut out: Option<&mut Vec<u8>>) -> io::Result<Pumped> {
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    while total < limit {
        let want = (limit - total).min(CHUNK_SIZE as u64) as usize;
        match reader.read(&mut chunk[..want]) {
            Ok(0) => {
                return Ok(Pumped {
                    bytes: total,
                    end: StreamEnd::Clean,
                });
            }
            Ok(n) => {
                if let Some(out) = out.as_deref_mut() {
                    out.extend_from_slice(&chunk[..n]);
                }
                total += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_truncation(&e) => {
                trace!(error = %e, bytes = total, "Decoder stopped early");
                return Ok(Pumped {
                    bytes: total,
                    end: StreamEnd::Truncated,
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(Pumped {
        bytes: total,
        end: StreamEnd::Limit,
    })
}

/// Errors a decoder raises when its input stops mid-stream.
fn is_truncation(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput
    )
}
