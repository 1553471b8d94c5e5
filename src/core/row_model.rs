//! Row models
//!
//! A [`RowModel`] is one CSV row read through a [`Schema`]. Attributes are
//! computed lazily from the raw cells and memoized; validation runs once on
//! first access and is cached for the life of the instance.
//!
//! Row models are handed out as `Rc<RowModel>`: children are owned by their
//! parent, the parent link is weak, and `previous` is always a detached
//! snapshot whose own `previous` is empty, so no chain of earlier rows is
//! kept alive.

use crate::core::columns::DefaultValue;
use crate::core::schema::{ColumnAccessor, Schema};
use crate::core::validation::Errors;
use crate::types::{Attributes, Context, RowModelError, Value};
use std::cell::{OnceCell, Ref, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tracing::debug;

/// Field that per-row tokenizer failures are recorded under
pub const PARSE_FAILURE_FIELD: &str = "csv";

/// Construction inputs of a row model besides its schema and cells
#[derive(Debug, Clone)]
pub struct RowOptions {
    pub context: Context,
    pub source_header: Arc<Vec<String>>,
    pub previous: Option<Rc<RowModel>>,
    pub index: i64,
    pub line_number: u64,
    parent: Option<Weak<RowModel>>,
}

impl Default for RowOptions {
    fn default() -> Self {
        RowOptions {
            context: Context::new(),
            source_header: Arc::default(),
            previous: None,
            index: -1,
            line_number: 0,
            parent: None,
        }
    }
}

impl RowOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn source_header(mut self, header: Arc<Vec<String>>) -> Self {
        self.source_header = header;
        self
    }

    pub fn previous(mut self, previous: Option<Rc<RowModel>>) -> Self {
        self.previous = previous;
        self
    }

    pub fn index(mut self, index: i64) -> Self {
        self.index = index;
        self
    }

    pub fn line_number(mut self, line_number: u64) -> Self {
        self.line_number = line_number;
        self
    }
}

/// A column whose blank cell was filled by its default
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultChange {
    pub column: String,
    pub before: Value,
    pub after: Value,
}

struct CellRead {
    original: Value,
    value: Value,
    defaulted: bool,
}

/// One row of a CSV file, typed through its class's schema
pub struct RowModel {
    schema: Arc<Schema>,
    source_row: Vec<String>,
    source_header: Arc<Vec<String>>,
    context: Context,
    index: i64,
    line_number: u64,
    previous: Option<Rc<RowModel>>,
    parent: Option<Weak<RowModel>>,
    children: RefCell<Vec<Rc<RowModel>>>,
    failure: Option<String>,
    memo: RefCell<HashMap<String, Value>>,
    errors: OnceCell<Errors>,
    warnings: OnceCell<Errors>,
}

impl fmt::Debug for RowModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowModel")
            .field("class", &self.schema.name())
            .field("source_row", &self.source_row)
            .field("index", &self.index)
            .field("line_number", &self.line_number)
            .field("children", &self.children.borrow().len())
            .finish()
    }
}

impl RowModel {
    /// Build a row model over `source_row`.
    ///
    /// # Arguments
    ///
    /// * `schema` - The frozen class definition
    /// * `source_row` - Raw cells, positionally mapped onto the columns
    /// * `options` - Context, header, predecessor and position in the file
    ///
    /// # Returns
    ///
    /// A shared row model; a given `previous` is stored as a detached snapshot
    pub fn new(schema: Arc<Schema>, source_row: Vec<String>, options: RowOptions) -> Rc<Self> {
        Rc::new(Self::build(schema, source_row, options, None))
    }

    /// A row the tokenizer could not split, invalid with `message` under [`PARSE_FAILURE_FIELD`]
    pub fn unparseable(schema: Arc<Schema>, message: String, options: RowOptions) -> Rc<Self> {
        Rc::new(Self::build(schema, Vec::new(), options, Some(message)))
    }

    fn build(
        schema: Arc<Schema>,
        source_row: Vec<String>,
        options: RowOptions,
        failure: Option<String>,
    ) -> Self {
        RowModel {
            schema,
            source_row,
            source_header: options.source_header,
            context: options.context,
            index: options.index,
            line_number: options.line_number,
            previous: options.previous.map(|p| p.detached()),
            parent: options.parent,
            children: RefCell::new(Vec::new()),
            failure,
            memo: RefCell::new(HashMap::new()),
            errors: OnceCell::new(),
            warnings: OnceCell::new(),
        }
    }

    /// Copy of this row without its own `previous` link
    fn detached(self: &Rc<Self>) -> Rc<Self> {
        if self.previous.is_none() {
            return Rc::clone(self);
        }
        Rc::new(RowModel {
            schema: Arc::clone(&self.schema),
            source_row: self.source_row.clone(),
            source_header: Arc::clone(&self.source_header),
            context: self.context.clone(),
            index: self.index,
            line_number: self.line_number,
            previous: None,
            parent: self.parent.clone(),
            children: RefCell::new(self.children.borrow().clone()),
            failure: self.failure.clone(),
            memo: RefCell::new(self.memo.borrow().clone()),
            errors: self.errors.clone(),
            warnings: self.warnings.clone(),
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn source_row(&self) -> &[String] {
        &self.source_row
    }

    pub fn source_header(&self) -> &[String] {
        &self.source_header
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    pub fn previous(&self) -> Option<&Rc<RowModel>> {
        self.previous.as_ref()
    }

    pub fn parent(&self) -> Option<Rc<RowModel>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    pub fn children(&self) -> Ref<'_, Vec<Rc<RowModel>>> {
        self.children.borrow()
    }

    /// Column name to raw cell, positionally, for the fixed columns
    pub fn mapped_row(&self) -> Vec<(&str, Option<&str>)> {
        self.schema
            .accessors()
            .iter()
            .take(self.schema.fixed_column_count())
            .map(|a| (a.name.as_str(), self.source_row.get(a.index).map(String::as_str)))
            .collect()
    }

    /// Typed value of a declared column
    pub fn attribute(&self, name: &str) -> Result<Value, RowModelError> {
        let accessor = self
            .schema
            .accessor(name)
            .ok_or_else(|| RowModelError::unknown_attribute(name))?;
        Ok(self.value_of(accessor))
    }

    /// Every column's value, in column order
    pub fn attributes(&self) -> Attributes {
        self.schema
            .accessors()
            .iter()
            .map(|a| (a.name.clone(), self.value_of(a)))
            .collect()
    }

    /// Every column's parsed value before defaults are applied
    pub fn original_attributes(&self) -> Attributes {
        self.schema
            .accessors()
            .iter()
            .map(|a| {
                let value = if a.dynamic {
                    self.value_of(a)
                } else {
                    self.read_cell(a).original
                };
                (a.name.clone(), value)
            })
            .collect()
    }

    pub fn original_attribute(&self, name: &str) -> Result<Value, RowModelError> {
        self.original_attributes()
            .get(name)
            .cloned()
            .ok_or_else(|| RowModelError::unknown_attribute(name))
    }

    /// `(before, after)` for each column whose blank cell took a non-blank default
    pub fn default_changes(&self) -> Vec<DefaultChange> {
        self.schema
            .accessors()
            .iter()
            .filter(|a| !a.dynamic)
            .filter_map(|a| {
                let read = self.read_cell(a);
                read.defaulted.then(|| DefaultChange {
                    column: a.name.clone(),
                    before: read.original,
                    after: read.value,
                })
            })
            .collect()
    }

    fn value_of(&self, accessor: &ColumnAccessor) -> Value {
        if let Some(value) = self.memo.borrow().get(&accessor.name) {
            return value.clone();
        }
        // computed defaults may read other attributes, so no borrow is held here
        let value = if accessor.dynamic {
            self.dynamic_attribute(accessor)
        } else {
            self.read_cell(accessor).value
        };
        self.memo
            .borrow_mut()
            .insert(accessor.name.clone(), value.clone());
        value
    }

    /// The cell after the class's `format_cell` hook
    pub(crate) fn formatted_cell(&self, accessor: &ColumnAccessor) -> Option<String> {
        let raw = self.source_row.get(accessor.index).map(String::as_str);
        self.schema
            .hooks()
            .format_cell(raw, &accessor.name, accessor.index, &self.context)
    }

    fn read_cell(&self, accessor: &ColumnAccessor) -> CellRead {
        let formatted = self
            .formatted_cell(accessor)
            .filter(|cell| !cell.trim().is_empty());
        match formatted {
            Some(cell) => {
                let value = accessor.parse.apply(&cell, self).unwrap_or(Value::Null);
                CellRead {
                    original: value.clone(),
                    value,
                    defaulted: false,
                }
            }
            None => {
                let value = accessor
                    .default
                    .as_ref()
                    .map(|default| self.resolve_default(accessor, default))
                    .unwrap_or(Value::Null);
                CellRead {
                    original: Value::Null,
                    defaulted: !value.is_blank(),
                    value,
                }
            }
        }
    }

    fn resolve_default(&self, accessor: &ColumnAccessor, default: &DefaultValue) -> Value {
        match default.resolve(self) {
            // textual defaults read like a cell of the column
            Value::Text(text) if !text.trim().is_empty() => {
                accessor.parse.apply(&text, self).unwrap_or(Value::Null)
            }
            other => other,
        }
    }

    /// Validation errors, computed once
    pub fn errors(&self) -> &Errors {
        self.errors.get_or_init(|| self.validate())
    }

    /// Warning-channel results, computed once
    pub fn warnings(&self) -> &Errors {
        self.warnings.get_or_init(|| {
            let mut warnings = Errors::new();
            for rule in self.schema.warning_rules() {
                rule.apply(&self.rule_value(rule.field()), &mut warnings);
            }
            warnings
        })
    }

    pub fn is_valid(&self) -> bool {
        self.errors().is_empty()
    }

    pub fn is_safe(&self) -> bool {
        self.warnings().is_empty()
    }

    /// Whether a reader passes over this row (the class's `skip` hook)
    pub fn skip(&self) -> bool {
        self.schema.hooks().skip(self)
    }

    /// Whether a reader stops at this row (the class's `abort` hook)
    pub fn abort(&self) -> bool {
        self.schema.hooks().abort(self)
    }

    fn validate(&self) -> Errors {
        let mut errors = Errors::new();
        if let Some(message) = &self.failure {
            errors.add(PARSE_FAILURE_FIELD, message.clone());
            return errors;
        }
        if self.source_row.is_empty() {
            errors.add("source_row", "can't be blank");
        }

        for accessor in self.schema.accessors() {
            if !accessor.validate_type || accessor.dynamic {
                continue;
            }
            if let Some(cell) = self.formatted_cell(accessor) {
                if !cell.trim().is_empty() && !accessor.column_type.accepts(&cell) {
                    errors.add(
                        &accessor.name,
                        format!("is not a valid {}", accessor.column_type.name()),
                    );
                }
            }
        }

        for rule in self.schema.rules() {
            rule.apply(&self.rule_value(rule.field()), &mut errors);
        }
        errors
    }

    fn rule_value(&self, field: &str) -> Value {
        match field {
            "source_row" => Value::from(self.source_row.clone()),
            _ => self.attribute(field).unwrap_or(Value::Null),
        }
    }

    /// Attach a child row if it is valid.
    ///
    /// The child is read through the class's `has_many` child schema (or this
    /// row's own schema when none is declared) and inherits this row's context
    /// and header unless `options` supplies its own.
    ///
    /// # Returns
    ///
    /// The appended child, or `None` when the candidate was invalid and discarded
    pub fn append_child(self: &Rc<Self>, source_row: Vec<String>, options: RowOptions) -> Option<Rc<RowModel>> {
        self.try_append_child(source_row, options).ok()
    }

    /// Like [`append_child`](Self::append_child), handing back the rejected candidate
    pub(crate) fn try_append_child(
        self: &Rc<Self>,
        source_row: Vec<String>,
        mut options: RowOptions,
    ) -> Result<Rc<RowModel>, Rc<RowModel>> {
        let schema = self
            .schema
            .child_schema()
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.schema));
        options.context = self.context.merged(&options.context);
        if options.source_header.is_empty() {
            options.source_header = Arc::clone(&self.source_header);
        }
        options.parent = Some(Rc::downgrade(self));

        let child = RowModel::new(schema, source_row, options);
        if child.is_valid() {
            self.children.borrow_mut().push(Rc::clone(&child));
            debug!(
                parent_line = self.line_number,
                line = child.line_number,
                relation = self.schema.relation().unwrap_or("children"),
                "attached child row"
            );
            Ok(child)
        } else {
            Err(child)
        }
    }

    /// `f` applied to this row, then recursively to every child (depth-first)
    pub fn deep_map<T, F>(&self, f: F) -> Vec<T>
    where
        F: Fn(&RowModel) -> T,
    {
        let mut out = Vec::new();
        self.deep_map_into(&f, &mut out);
        out
    }

    fn deep_map_into<T, F>(&self, f: &F, out: &mut Vec<T>)
    where
        F: Fn(&RowModel) -> T,
    {
        out.push(f(self));
        for child in self.children.borrow().iter() {
            child.deep_map_into(f, out);
        }
    }
}
