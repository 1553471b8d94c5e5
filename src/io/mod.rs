//! I/O module
//!
//! Handles CSV reading and output.
//!
//! # Components
//!
//! - `csv_source` - Tokenizer adapter over `csv::Reader` and reader settings
//! - `file_reader` - Streaming row-model reader with skip/abort iteration
//! - `csv_format` - Export of typed values back to CSV rows

pub mod csv_format;
pub mod csv_source;
pub mod file_reader;

pub use csv_format::{export_headers, write_csv, CsvWriter, ExportRowModel, ExportSource};
pub use csv_source::{CsvSource, HeaderRead, ReaderConfig, RowRead};
pub use file_reader::{EachRow, FileReader};
