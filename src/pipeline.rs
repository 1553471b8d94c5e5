//! Import pipeline
//!
//! Streams a CSV file through a [`FileReader`] and writes the rows that
//! survive the skip/abort policy back out as CSV, in the row-model class's
//! column order (or the mapper's attribute order when a mapper is attached).
//!
//! # Design
//!
//! The pipeline focuses on orchestration, delegating:
//! - CSV tokenizing and row production to `FileReader` (`each_row`)
//! - Typing, defaults and validation to `RowModel` / `Mapper`
//! - CSV output to `csv_format` (`ExportRowModel`, `CsvWriter`)
//!
//! Memory use is constant per row: only the current row (and its children)
//! and one predecessor snapshot are alive at any time.

use crate::core::columns::ColumnOptions;
use crate::core::schema::{ModelRegistry, Schema};
use crate::io::csv_format::{export_headers, CsvWriter, ExportRowModel};
use crate::io::csv_source::{CsvSource, HeaderRead, ReaderConfig};
use crate::io::file_reader::FileReader;
use crate::mapper::{Mapper, MapperSchema};
use crate::types::{Context, RowModelError};
use std::cell::Cell;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a pipeline run did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    /// Top-level rows written to the output
    pub imported: usize,
    /// Rows passed over by the skip policy
    pub skipped: usize,
    /// Whether reading stopped on an abort
    pub aborted: bool,
}

/// Reads one file of a row-model class and exports its rows
#[derive(Debug, Clone)]
pub struct ImportPipeline {
    schema: Arc<Schema>,
    mapper: Option<Arc<MapperSchema>>,
    config: ReaderConfig,
    context: Context,
    write_headers: bool,
}

impl ImportPipeline {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            mapper: None,
            config: ReaderConfig::default(),
            context: Context::new(),
            write_headers: true,
        }
    }

    /// Export through a mapper's derived attributes instead of the row's columns
    pub fn mapper(mut self, mapper: Arc<MapperSchema>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn write_headers(mut self, write_headers: bool) -> Self {
        self.write_headers = write_headers;
        self
    }

    /// Untyped columns named after the header row of `path`
    pub fn infer_schema(path: &Path, config: &ReaderConfig) -> Result<Arc<Schema>, RowModelError> {
        let mut source = CsvSource::open(path, config)?;
        let headers = match source.read_header() {
            HeaderRead::Header(headers) => headers,
            HeaderRead::Warning { line, message } => {
                return Err(RowModelError::parse_error(Some(line), &message))
            }
            HeaderRead::Empty => Vec::new(),
        };

        let mut models = ModelRegistry::new();
        let class = models.define("InferredRowModel");
        for header in headers.iter().filter(|h| !h.is_empty()) {
            models.column(class, header, ColumnOptions::new())?;
        }
        models.schema(class)
    }

    /// Process `input` and write the surviving rows to `output`
    ///
    /// # Arguments
    ///
    /// * `input` - Path to the input CSV file
    /// * `output` - Mutable reference to a writer for the exported CSV
    ///
    /// # Returns
    ///
    /// * `Ok(ImportSummary)` when the file was read to the end or to an abort
    /// * `Err(RowModelError)` if the file could not be opened or output failed
    ///
    /// # Error Handling
    ///
    /// Invalid rows are logged with their line numbers and skipped; they do
    /// not fail the run.
    pub fn process(&self, input: &Path, output: &mut dyn Write) -> Result<ImportSummary, RowModelError> {
        let mut reader = FileReader::with_config(
            input,
            Arc::clone(&self.schema),
            self.context.clone(),
            self.config,
        );
        if let Some(error) = reader.open_error() {
            return Err(error.clone());
        }

        let skipped = Rc::new(Cell::new(0usize));
        let counter = Rc::clone(&skipped);
        reader.on_skip(move |reader| {
            counter.set(counter.get() + 1);
            if let Some(row) = reader.current() {
                warn!(
                    line = row.line_number(),
                    errors = ?row.errors().full_messages(),
                    "skipping invalid row"
                );
            }
        });
        let aborted = Rc::new(Cell::new(false));
        let flag = Rc::clone(&aborted);
        reader.on_abort(move |_| flag.set(true));

        let mut writer = CsvWriter::new(output);
        if self.write_headers {
            writer.write_row(self.output_headers(&reader))?;
        }

        let mut summary = ImportSummary::default();
        for row in reader.each_row() {
            for change in row.default_changes() {
                debug!(
                    line = row.line_number(),
                    column = %change.column,
                    default = %change.after,
                    "applied default"
                );
            }

            match &self.mapper {
                Some(schema) => {
                    let mapper = Mapper::new(Arc::clone(schema), Rc::clone(&row));
                    if mapper.skip() {
                        warn!(
                            line = row.line_number(),
                            errors = ?mapper.errors().full_messages(),
                            "skipping invalid mapped row"
                        );
                        skipped.set(skipped.get() + 1);
                        continue;
                    }
                    writer.write_row(mapper.attributes().values().map(|v| v.to_string()))?;
                }
                None => {
                    let export = ExportRowModel::new(&self.schema, row.as_ref())
                        .context(row.context().clone());
                    for cells in export.to_rows() {
                        writer.write_row(&cells)?;
                    }
                }
            }
            summary.imported += 1;
        }
        writer.flush()?;

        summary.skipped = skipped.get();
        summary.aborted = aborted.get();
        Ok(summary)
    }

    fn output_headers(&self, reader: &FileReader) -> Vec<String> {
        if let Some(mapper) = &self.mapper {
            return mapper.attribute_names();
        }
        let fixed = self.schema.fixed_column_count();
        let dynamic_headers = reader.headers().get(fixed..).unwrap_or(&[]);
        export_headers(&self.schema, dynamic_headers)
    }
}
