//! Source side: codec resolution, file discovery and incremental reading of
//! delimited files.

pub mod compression;
pub mod frame;
pub mod listing;
pub mod reader;

pub use compression::{CodecFamily, CompressionCodec, CompressionFormat};
pub use frame::{Frame, Schema};
pub use listing::{DELIMITED_SUFFIXES, find_latest_files, is_delimited_file, sort_and_limit_files};
pub use reader::{Cursor, DelimitedReader, Increment, ReaderConfig, SizeProbe};
