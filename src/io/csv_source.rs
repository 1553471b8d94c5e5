//! CSV tokenizer adapter
//!
//! Wraps `csv::Reader` in the three operations the file reader needs:
//! open a source, read the header row, and read one row at a time. Records
//! are read as byte records so a row with bad UTF-8 becomes a per-row failure
//! instead of ending the stream. Lines are the 1-based physical line a record
//! starts on, as reported by the csv position.

use crate::types::RowModelError;
use csv::{ByteRecord, ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;
use tracing::warn;

/// Tokenizer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Field delimiter byte
    pub delimiter: u8,
    /// Trim whitespace around every field
    pub trim: bool,
    /// Accept rows whose length differs from the header
    pub flexible: bool,
    /// Read buffer size in bytes
    pub buffer_capacity: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            trim: true,
            flexible: true,
            buffer_capacity: 8 * 1024,
        }
    }
}

impl ReaderConfig {
    /// Create a ReaderConfig, falling back to the default buffer for a zero capacity
    pub fn new(delimiter: u8, trim: bool, flexible: bool, buffer_capacity: usize) -> Self {
        let default = Self::default();

        let buffer_capacity = if buffer_capacity == 0 {
            warn!(
                buffer_capacity,
                default = default.buffer_capacity,
                "invalid buffer capacity, using default"
            );
            default.buffer_capacity
        } else {
            buffer_capacity
        };

        Self {
            delimiter,
            trim,
            flexible,
            buffer_capacity,
        }
    }
}

/// Outcome of reading the header row
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderRead {
    Header(Vec<String>),
    /// The header line could not be tokenized cleanly
    Warning { line: u64, message: String },
    /// The source holds no rows at all
    Empty,
}

/// Outcome of reading one row
#[derive(Debug, Clone, PartialEq)]
pub enum RowRead {
    Row { cells: Vec<String>, line: u64 },
    Failure { line: u64, message: String },
    EndOfFile,
}

/// An open CSV stream
#[derive(Debug)]
pub struct CsvSource {
    reader: csv::Reader<File>,
    record: ByteRecord,
    records_read: u64,
}

impl CsvSource {
    /// Open `path` for sequential reading
    ///
    /// # Returns
    ///
    /// * `Ok(CsvSource)` if the file opened
    /// * `Err(RowModelError::FileNotFound)` for a missing path, `IoError` otherwise
    pub fn open(path: &Path, config: &ReaderConfig) -> Result<Self, RowModelError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RowModelError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => RowModelError::from(e),
        })?;

        let reader = ReaderBuilder::new()
            .has_headers(false)
            .delimiter(config.delimiter)
            .trim(if config.trim { Trim::All } else { Trim::None })
            .flexible(config.flexible)
            .buffer_capacity(config.buffer_capacity)
            .from_reader(file);

        Ok(Self {
            reader,
            record: ByteRecord::new(),
            records_read: 0,
        })
    }

    /// Read the first row as the header
    pub fn read_header(&mut self) -> HeaderRead {
        match self.read_row() {
            RowRead::Row { cells, .. } => HeaderRead::Header(cells),
            RowRead::Failure { line, message } => HeaderRead::Warning { line, message },
            RowRead::EndOfFile => HeaderRead::Empty,
        }
    }

    /// Read the next row
    pub fn read_row(&mut self) -> RowRead {
        let fallback_line = self.records_read + 1;
        match self.reader.read_byte_record(&mut self.record) {
            Ok(false) => RowRead::EndOfFile,
            Ok(true) => {
                self.records_read += 1;
                let line = self
                    .record
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(fallback_line);
                match decode(&self.record) {
                    Ok(cells) => RowRead::Row { cells, line },
                    Err(detail) => RowRead::Failure {
                        line,
                        message: failure_message(&detail, line),
                    },
                }
            }
            Err(e) => {
                self.records_read += 1;
                let line = e.position().map(|p| p.line()).unwrap_or(fallback_line);
                RowRead::Failure {
                    line,
                    message: failure_message(&failure_detail(&e), line),
                }
            }
        }
    }
}

fn decode(record: &ByteRecord) -> Result<Vec<String>, String> {
    record
        .iter()
        .enumerate()
        .map(|(i, field)| {
            std::str::from_utf8(field)
                .map(str::to_string)
                .map_err(|_| format!("has invalid UTF-8 in field {}", i + 1))
        })
        .collect()
}

/// Failure text read after the `csv` field name, e.g. "has 3 fields, expected 2 in line 4"
fn failure_message(detail: &str, line: u64) -> String {
    format!("{} in line {}", detail, line)
}

fn failure_detail(error: &csv::Error) -> String {
    match error.kind() {
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => format!("has {} fields, expected {}", len, expected_len),
        csv::ErrorKind::Utf8 { err, .. } => {
            format!("has invalid UTF-8 in field {}", err.field() + 1)
        }
        csv::ErrorKind::Io(e) => format!("could not be read ({})", e),
        _ => format!("could not be parsed ({})", error),
    }
}
