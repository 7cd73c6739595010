//! Compression codec resolution for delimited files.
//!
//! Maps a file name to a decoding strategy by its compression extension and
//! provides the streaming decoder for each format. Unknown extensions are
//! read as plain text.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Compression format of a source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CompressionFormat {
    #[default]
    None,
    Gzip,
    Bzip2,
    Zstd,
}

/// How a format lays out its compressed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFamily {
    /// Uncompressed, exactly seekable.
    Plain,
    /// Block-compressed (bzip2).
    Block,
    /// Stream-compressed (gzip, zstd).
    Stream,
}

/// Compression extensions, most specific first.
const EXTENSIONS: &[(&str, CompressionFormat)] = &[
    (".gz", CompressionFormat::Gzip),
    (".gzip", CompressionFormat::Gzip),
    (".bz2", CompressionFormat::Bzip2),
    (".zst", CompressionFormat::Zstd),
];

impl CompressionFormat {
    /// Resolve the format from a file name. Never fails: unknown names are plain.
    pub fn from_path(path: &Path) -> Self {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return CompressionFormat::None;
        };
        let name = name.to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(ext, _)| name.ends_with(ext))
            .map(|(_, format)| *format)
            .unwrap_or_default()
    }

    pub fn family(&self) -> CodecFamily {
        match self {
            CompressionFormat::None => CodecFamily::Plain,
            CompressionFormat::Bzip2 => CodecFamily::Block,
            CompressionFormat::Gzip | CompressionFormat::Zstd => CodecFamily::Stream,
        }
    }

    /// The codec that decodes this format.
    pub fn codec(&self) -> &'static dyn CompressionCodec {
        match self {
            CompressionFormat::None => &NoopCodec,
            CompressionFormat::Gzip => &GzipCodec,
            CompressionFormat::Bzip2 => &Bzip2Codec,
            CompressionFormat::Zstd => &ZstdCodec,
        }
    }
}

/// A decoder factory for one compression format.
pub trait CompressionCodec: Send + Sync {
    /// Wrap an open file in a decoder that yields the decoded bytes from the
    /// file's current position.
    fn decoder(&self, file: File) -> std::io::Result<Box<dyn Read + Send>>;

    /// Whether decoded offsets map 1:1 onto file offsets, so a read can seek
    /// directly to a decoded position.
    fn supports_exact_seek(&self) -> bool {
        false
    }

    /// Human-readable name of this codec (for logging/metrics).
    fn name(&self) -> &'static str;
}

/// Gzip codec using flate2. Concatenated members decode as one stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCodec;

impl CompressionCodec for GzipCodec {
    fn decoder(&self, file: File) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(flate2::read::MultiGzDecoder::new(BufReader::new(
            file,
        ))))
    }

    fn name(&self) -> &'static str {
        "gzip"
    }
}

/// Bzip2 codec. Concatenated streams decode as one stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bzip2Codec;

impl CompressionCodec for Bzip2Codec {
    fn decoder(&self, file: File) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(bzip2::read::MultiBzDecoder::new(BufReader::new(
            file,
        ))))
    }

    fn name(&self) -> &'static str {
        "bzip2"
    }
}

/// Zstandard codec using zstd.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZstdCodec;

impl CompressionCodec for ZstdCodec {
    fn decoder(&self, file: File) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(zstd::stream::read::Decoder::new(file)?))
    }

    fn name(&self) -> &'static str {
        "zstd"
    }
}

/// No-op codec for plain files.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCodec;

impl CompressionCodec for NoopCodec {
    fn decoder(&self, file: File) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(BufReader::new(file)))
    }

    fn supports_exact_seek(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "none"
    }
}
