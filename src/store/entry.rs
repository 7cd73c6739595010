//! Per-file tracking state: schema, cursor, row counter and column buffers.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ReaderError;
use crate::source::{Cursor, DelimitedReader, Increment, Schema};

use super::buffer::ColumnBuffer;

/// Everything the store remembers about one tracked file.
///
/// The schema is fixed at creation. The row counter only grows. Dropping the
/// entry closes its cursor's file handle.
#[derive(Debug)]
pub struct TrackedFile {
    schema: Schema,
    cursor: Option<Cursor>,
    rows: u64,
    buffers: BTreeMap<String, ColumnBuffer>,
}

impl TrackedFile {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            cursor: None,
            rows: 0,
            buffers: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Rows consumed into buffers since the file started being tracked.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn buffer(&self, column: &str) -> Option<&ColumnBuffer> {
        self.buffers.get(column)
    }

    pub fn buffers(&self) -> &BTreeMap<String, ColumnBuffer> {
        &self.buffers
    }

    pub(crate) fn buffer_mut(&mut self, column: &str) -> Option<&mut ColumnBuffer> {
        self.buffers.get_mut(column)
    }

    pub(crate) fn insert_buffer(&mut self, column: String, buffer: ColumnBuffer) -> &ColumnBuffer {
        self.buffers.entry(column).or_insert(buffer)
    }

    pub(crate) fn advance_rows(&mut self, added: u64) {
        self.rows += added;
    }

    /// Read the rows appended since the last read of `path`.
    ///
    /// The first read opens a cursor and takes the header from the stream;
    /// later reads pass the stored schema. On failure the entry is unchanged:
    /// an existing cursor stays where it was and a fresh one is discarded.
    pub(crate) fn read_increment(
        &mut self,
        reader: &DelimitedReader,
        path: &Path,
        columns: &[String],
    ) -> Result<Increment, ReaderError> {
        let (mut cursor, fresh) = match self.cursor.take() {
            Some(cursor) => (cursor, false),
            None => (Cursor::open(path)?, true),
        };
        let known_schema = cursor.header_consumed().then_some(&self.schema);

        let result = reader.advance(&mut cursor, known_schema, Some(columns));
        if result.is_ok() || !fresh {
            self.cursor = Some(cursor);
        }
        result
    }
}
