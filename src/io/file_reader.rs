//! Streaming file reader
//!
//! [`FileReader`] drives a [`CsvSource`] and produces one [`RowModel`] per
//! pull. It never raises past a single pull: an unopenable file or an
//! unreadable header flips the reader's `valid`/`safe` flags, and a row the
//! tokenizer cannot split becomes an invalid row model carrying the line.
//!
//! # States
//!
//! ```text
//! Fresh (index -1) --next--> Streaming (index 0..) --EOF--> Exhausted
//!   ^                                                           |
//!   +-------------------------- reset --------------------------+
//! ```
//!
//! # Children
//!
//! When the row-model class declares a `has_many` child class, every row is
//! followed by a lookahead loop: the next row is tried as a child and kept
//! when valid as one; the first row that is not a valid child is held back
//! and replayed as the next top-level row.

use crate::core::row_model::{RowModel, RowOptions};
use crate::core::schema::{ModelKind, Schema};
use crate::core::validation::Errors;
use crate::io::csv_source::{CsvSource, HeaderRead, ReaderConfig, RowRead};
use crate::types::{Context, RowModelError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, warn};

type ReaderHook = Box<dyn FnMut(&FileReader)>;

/// Field reader-level open and header problems are recorded under
const READER_FIELD: &str = "csv";

/// Sequential producer of row models from one CSV file
pub struct FileReader {
    path: PathBuf,
    schema: Arc<Schema>,
    config: ReaderConfig,
    context: Context,
    source: Option<CsvSource>,
    headers: Arc<Vec<String>>,
    index: i64,
    line_number: u64,
    current: Option<Rc<RowModel>>,
    pending: Option<RowRead>,
    end_of_file: bool,
    valid: bool,
    safe: bool,
    errors: Errors,
    warnings: Errors,
    open_error: Option<RowModelError>,
    abort_hooks: Vec<ReaderHook>,
    skip_hooks: Vec<ReaderHook>,
}

impl fmt::Debug for FileReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileReader")
            .field("path", &self.path)
            .field("class", &self.schema.name())
            .field("headers", &self.headers)
            .field("index", &self.index)
            .field("line_number", &self.line_number)
            .field("end_of_file", &self.end_of_file)
            .field("valid", &self.valid)
            .field("safe", &self.safe)
            .finish()
    }
}

impl FileReader {
    /// Open `path` for reading rows of `schema` with the default tokenizer settings
    pub fn new(path: impl AsRef<Path>, schema: Arc<Schema>, context: Context) -> Self {
        Self::with_config(path, schema, context, ReaderConfig::default())
    }

    /// Open `path` for reading rows of `schema`.
    ///
    /// Never fails: check [`is_valid`](Self::is_valid) and
    /// [`is_safe`](Self::is_safe) for open and header problems.
    pub fn with_config(
        path: impl AsRef<Path>,
        schema: Arc<Schema>,
        context: Context,
        config: ReaderConfig,
    ) -> Self {
        let mut reader = Self {
            path: path.as_ref().to_path_buf(),
            schema,
            config,
            context,
            source: None,
            headers: Arc::default(),
            index: -1,
            line_number: 0,
            current: None,
            pending: None,
            end_of_file: false,
            valid: true,
            safe: true,
            errors: Errors::new(),
            warnings: Errors::new(),
            open_error: None,
            abort_hooks: Vec::new(),
            skip_hooks: Vec::new(),
        };
        reader.open();
        reader
    }

    fn open(&mut self) {
        self.source = None;
        self.headers = Arc::default();
        self.index = -1;
        self.line_number = 0;
        self.current = None;
        self.pending = None;
        self.end_of_file = false;
        self.valid = true;
        self.safe = true;
        self.errors = Errors::new();
        self.warnings = Errors::new();
        self.open_error = None;

        let mut source = match CsvSource::open(&self.path, &self.config) {
            Ok(source) => source,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not open csv source");
                self.valid = false;
                self.errors.add(READER_FIELD, e.to_string());
                self.open_error = Some(e);
                return;
            }
        };

        if self.schema.kind() == ModelKind::Rows {
            match source.read_header() {
                HeaderRead::Header(headers) => {
                    self.headers = Arc::new(headers);
                }
                HeaderRead::Warning { line, message } => {
                    warn!(path = %self.path.display(), line, %message, "unsafe csv header");
                    self.safe = false;
                    self.warnings.add(READER_FIELD, message);
                }
                HeaderRead::Empty => {}
            }
        }
        self.source = Some(source);
    }

    /// Re-open the source and return to the fresh state
    pub fn reset(&mut self) {
        self.open();
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// The last produced row model; `None` before the first pull and after EOF
    pub fn current(&self) -> Option<&Rc<RowModel>> {
        self.current.as_ref()
    }

    pub fn end_of_file(&self) -> bool {
        self.end_of_file
    }

    /// False only when the source could not be opened
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// False when the header line produced a warning
    pub fn is_safe(&self) -> bool {
        self.safe
    }

    /// Reader-level errors (open failures)
    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    /// Why the source could not be opened, if it could not
    pub fn open_error(&self) -> Option<&RowModelError> {
        self.open_error.as_ref()
    }

    /// Reader-level warnings (header anomalies)
    pub fn warnings(&self) -> &Errors {
        &self.warnings
    }

    /// Run `hook` whenever [`each_row`](Self::each_row) stops on an abort
    pub fn on_abort<F: FnMut(&FileReader) + 'static>(&mut self, hook: F) {
        self.abort_hooks.push(Box::new(hook));
    }

    /// Run `hook` whenever [`each_row`](Self::each_row) passes over a row
    pub fn on_skip<F: FnMut(&FileReader) + 'static>(&mut self, hook: F) {
        self.skip_hooks.push(Box::new(hook));
    }

    /// True when the reader is invalid or the current row asks to stop
    pub fn abort(&self) -> bool {
        !self.valid || self.current.as_ref().is_some_and(|row| row.abort())
    }

    /// True when the current row asks to be passed over
    pub fn skip(&self) -> bool {
        self.current.as_ref().is_some_and(|row| row.skip())
    }

    /// Produce the next row model, or `None` once the file is exhausted.
    ///
    /// # Arguments
    ///
    /// * `extra` - Context merged over the reader's context for this row only
    pub fn next(&mut self, extra: &Context) -> Option<Rc<RowModel>> {
        if self.end_of_file {
            return None;
        }
        if self.schema.kind() == ModelKind::SingleModel {
            return self.next_single_model(extra);
        }

        let read = match self.pending.take() {
            Some(read) => read,
            None => self.pull(),
        };
        let row = match read {
            RowRead::EndOfFile => {
                self.end_of_file = true;
                self.current = None;
                return None;
            }
            RowRead::Failure { line, message } => {
                self.index += 1;
                self.line_number = line;
                warn!(line, %message, "unparseable csv row");
                RowModel::unparseable(Arc::clone(&self.schema), message, self.row_options(extra))
            }
            RowRead::Row { cells, line } => {
                self.index += 1;
                self.line_number = line;
                let row = RowModel::new(Arc::clone(&self.schema), cells, self.row_options(extra));
                self.attach_children(&row);
                row
            }
        };

        self.current = Some(Rc::clone(&row));
        Some(row)
    }

    fn pull(&mut self) -> RowRead {
        match self.source.as_mut() {
            Some(source) => source.read_row(),
            None => RowRead::EndOfFile,
        }
    }

    fn row_options(&self, extra: &Context) -> RowOptions {
        RowOptions::new()
            .context(self.context.merged(extra))
            .source_header(Arc::clone(&self.headers))
            .previous(self.current.clone())
            .index(self.index)
            .line_number(self.line_number)
    }

    fn attach_children(&mut self, row: &Rc<RowModel>) {
        if row.schema().child_schema().is_none() {
            return;
        }
        loop {
            match self.pull() {
                RowRead::Row { cells, line } => {
                    let options = RowOptions::new()
                        .source_header(Arc::clone(&self.headers))
                        .line_number(line);
                    match row.try_append_child(cells, options) {
                        Ok(_) => self.line_number = line,
                        Err(rejected) => {
                            self.pending = Some(RowRead::Row {
                                cells: rejected.source_row().to_vec(),
                                line,
                            });
                            return;
                        }
                    }
                }
                other => {
                    self.pending = Some(other);
                    return;
                }
            }
        }
    }

    /// The whole file as one row model of label/value rows
    fn next_single_model(&mut self, extra: &Context) -> Option<Rc<RowModel>> {
        if self.index >= 0 || self.source.is_none() {
            self.end_of_file = true;
            self.current = None;
            return None;
        }

        let mut values = vec![String::new(); self.schema.fixed_column_count()];
        loop {
            match self.pull() {
                RowRead::Row { cells, line } => {
                    self.line_number = line;
                    let mut cells = cells.into_iter();
                    let label = cells.next().unwrap_or_default();
                    if let Some(index) = self.schema.index_header_match(&label) {
                        if let Some(slot) = values.get_mut(index) {
                            *slot = cells.next().unwrap_or_default();
                        }
                    }
                }
                RowRead::Failure { line, message } => {
                    self.line_number = line;
                    warn!(line, %message, "unparseable csv row in single model file");
                }
                RowRead::EndOfFile => break,
            }
        }

        self.index = 0;
        let row = RowModel::new(Arc::clone(&self.schema), values, self.row_options(extra));
        self.current = Some(Rc::clone(&row));
        Some(row)
    }

    /// Lazy iteration with the abort and skip policy applied.
    ///
    /// Abort is checked before the first pull and after every pull; a skipped
    /// row is passed over without being yielded.
    pub fn each_row(&mut self) -> EachRow<'_> {
        EachRow {
            reader: self,
            started: false,
            done: false,
        }
    }

    fn run_hooks(&mut self, abort: bool) {
        let mut hooks = std::mem::take(if abort {
            &mut self.abort_hooks
        } else {
            &mut self.skip_hooks
        });
        for hook in hooks.iter_mut() {
            hook(self);
        }
        if abort {
            self.abort_hooks = hooks;
        } else {
            self.skip_hooks = hooks;
        }
    }
}

/// Iterator returned by [`FileReader::each_row`]
pub struct EachRow<'a> {
    reader: &'a mut FileReader,
    started: bool,
    done: bool,
}

impl EachRow<'_> {
    fn stop(&mut self) -> Option<Rc<RowModel>> {
        info!(
            line = self.reader.line_number,
            index = self.reader.index,
            "aborted reading"
        );
        self.reader.run_hooks(true);
        self.done = true;
        None
    }
}

impl Iterator for EachRow<'_> {
    type Item = Rc<RowModel>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            if self.reader.abort() {
                return self.stop();
            }
        }

        loop {
            let Some(row) = self.reader.next(&Context::new()) else {
                self.done = true;
                return None;
            };
            if self.reader.abort() {
                return self.stop();
            }
            if self.reader.skip() {
                debug!(line = row.line_number(), index = row.index(), "skipped row");
                self.reader.run_hooks(false);
                continue;
            }
            return Some(row);
        }
    }
}
