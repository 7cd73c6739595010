//! Schema and columnar row frames parsed from delimited text.
//!
//! Records are split by the `csv` crate, so quoted fields may contain the
//! delimiter. Rows may be ragged.

use std::fmt;

use csv::{ByteRecord, Reader, ReaderBuilder};

/// Ordered column names captured from a file's header line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Parse the first record of `bytes` as a header. Names are trimmed.
    pub fn from_header(bytes: &[u8], delimiter: u8) -> Result<Self, csv::Error> {
        let mut reader = csv_reader(bytes, delimiter, true);
        Ok(Self::from_record(reader.byte_headers()?))
    }

    fn from_record(record: &ByteRecord) -> Self {
        let columns = record
            .iter()
            .map(|name| String::from_utf8_lossy(name).trim().to_string())
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Requested columns present in this schema, in request order, without duplicates.
    pub fn select(&self, requested: &[String]) -> Vec<String> {
        let mut selected: Vec<String> = Vec::with_capacity(requested.len());
        for column in requested {
            if self.contains(column) && !selected.contains(column) {
                selected.push(column.clone());
            }
        }
        selected
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.columns.join(", "))
    }
}

/// Columnar rows for a subset of a file's columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    num_rows: usize,
}

impl Frame {
    /// An empty frame with the given column names.
    pub fn empty(names: Vec<String>) -> Self {
        let columns = vec![Vec::new(); names.len()];
        Self {
            names,
            columns,
            num_rows: 0,
        }
    }

    /// Parse header-less rows aligned to `schema`, keeping only `usecols`
    /// (all columns when `None`).
    pub fn parse(
        bytes: &[u8],
        schema: &Schema,
        usecols: Option<&[String]>,
        delimiter: u8,
    ) -> Result<Self, csv::Error> {
        Self::from_records(csv_reader(bytes, delimiter, false), schema, usecols)
    }

    /// Parse rows whose first record is the header.
    pub fn parse_with_header(
        bytes: &[u8],
        usecols: Option<&[String]>,
        delimiter: u8,
    ) -> Result<(Schema, Self), csv::Error> {
        let mut reader = csv_reader(bytes, delimiter, true);
        let schema = Schema::from_record(reader.byte_headers()?);
        let frame = Self::from_records(reader, &schema, usecols)?;
        Ok((schema, frame))
    }

    /// Every field of a record is visited so positions stay aligned even when
    /// only some columns are kept.
    fn from_records(
        mut reader: Reader<&[u8]>,
        schema: &Schema,
        usecols: Option<&[String]>,
    ) -> Result<Self, csv::Error> {
        let names = match usecols {
            Some(cols) => schema.select(cols),
            None => schema.columns().to_vec(),
        };

        // slot[i] = output column for field i
        let mut slots: Vec<Option<usize>> = vec![None; schema.len()];
        for (out, name) in names.iter().enumerate() {
            if let Some(field) = schema.position(name) {
                slots[field] = Some(out);
            }
        }

        let mut frame = Frame::empty(names);
        let mut row = vec![f64::NAN; frame.names.len()];
        let mut record = ByteRecord::new();
        while reader.read_byte_record(&mut record)? {
            if is_blank(&record) {
                continue;
            }
            row.fill(f64::NAN);
            for (field, cell) in record.iter().enumerate() {
                if let Some(Some(out)) = slots.get(field) {
                    row[*out] = parse_cell(cell);
                }
            }
            for (column, value) in frame.columns.iter_mut().zip(&row) {
                column.push(*value);
            }
            frame.num_rows += 1;
        }
        Ok(frame)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Iterate over `(name, values)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }

    /// Keep only the last `n` rows.
    pub fn tail(mut self, n: usize) -> Self {
        if self.num_rows > n {
            let drop = self.num_rows - n;
            for column in &mut self.columns {
                column.drain(..drop);
            }
            self.num_rows = n;
        }
        self
    }
}

fn csv_reader(bytes: &[u8], delimiter: u8, has_headers: bool) -> Reader<&[u8]> {
    ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(bytes)
}

fn is_blank(record: &ByteRecord) -> bool {
    record.iter().all(|field| field.trim_ascii().is_empty())
}

fn parse_cell(cell: &[u8]) -> f64 {
    std::str::from_utf8(cell)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(f64::NAN)
}
