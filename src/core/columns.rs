//! Column definitions
//!
//! A row-model class declares an ordered list of columns. Order is
//! significant: it is the positional mapping from CSV cells to names.
//! Declarations are stored per class as [`ColumnDeclaration`]s and folded
//! into a [`ColumnTable`] when a class is resolved, so subclasses can add
//! columns, redeclare them, or merge extra options into inherited ones.

use crate::core::row_model::RowModel;
use crate::types::{RowModelError, Value};
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Option keys a column declaration may carry
pub const RECOGNIZED_OPTIONS: [&str; 7] = [
    "type",
    "default",
    "parse",
    "header",
    "dynamic",
    "validate_type",
    "header_matchers",
];

/// Replaces the type-based parser for one column
pub type ParseFn = Arc<dyn Fn(&str, &RowModel) -> Value + Send + Sync>;

/// Computes a default in the context of the row model being read
pub type ComputeFn = Arc<dyn Fn(&RowModel) -> Value + Send + Sync>;

/// The closed set of column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnType {
    #[default]
    Untyped,
    Text,
    Integer,
    Float,
    Date,
    Boolean,
}

const FALSY: [&str; 6] = ["false", "f", "no", "n", "0", ""];
const BOOLEAN_FORMATS: [&str; 10] = ["true", "false", "t", "f", "yes", "no", "y", "n", "1", "0"];

impl ColumnType {
    /// Display name used in validation messages
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Untyped => "Untyped",
            ColumnType::Text => "String",
            ColumnType::Integer => "Integer",
            ColumnType::Float => "Float",
            ColumnType::Date => "Date",
            ColumnType::Boolean => "Boolean",
        }
    }

    /// Parse a (non-blank) cell into a typed value
    pub fn parse(&self, cell: &str) -> Result<Value, String> {
        match self {
            ColumnType::Untyped | ColumnType::Text => Ok(Value::Text(cell.to_string())),
            ColumnType::Integer => cell
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| e.to_string()),
            ColumnType::Float => cell
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| e.to_string()),
            ColumnType::Date => parse_date(cell.trim()).map(Value::Date),
            ColumnType::Boolean => {
                let cell = cell.trim().to_lowercase();
                Ok(Value::Boolean(!FALSY.contains(&cell.as_str())))
            }
        }
    }

    /// Whether `cell` is a well-formed value of this type
    pub fn accepts(&self, cell: &str) -> bool {
        match self {
            ColumnType::Boolean => BOOLEAN_FORMATS.contains(&cell.trim().to_lowercase().as_str()),
            other => other.parse(cell).is_ok(),
        }
    }
}

fn parse_date(cell: &str) -> Result<NaiveDate, String> {
    if let Ok(date) = NaiveDate::parse_from_str(cell, "%Y-%m-%d") {
        return Ok(date);
    }
    // %Y happily reads "15" as year 15, so pick the year width up front
    if let Some((year, _)) = cell.split_once('/') {
        let format = if year.len() == 4 { "%Y/%m/%d" } else { "%y/%m/%d" };
        if let Ok(date) = NaiveDate::parse_from_str(cell, format) {
            return Ok(date);
        }
    }
    NaiveDate::parse_from_str(cell, "%d %b %Y").map_err(|_| format!("invalid date '{}'", cell))
}

impl FromStr for ColumnType {
    type Err = RowModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "untyped" | "nil" => Ok(ColumnType::Untyped),
            "text" | "string" => Ok(ColumnType::Text),
            "integer" => Ok(ColumnType::Integer),
            "float" => Ok(ColumnType::Float),
            "date" => Ok(ColumnType::Date),
            "boolean" => Ok(ColumnType::Boolean),
            _ => Err(RowModelError::unsupported_type(s)),
        }
    }
}

/// Static or computed default for blank cells
#[derive(Clone)]
pub enum DefaultValue {
    Static(Value),
    Computed(ComputeFn),
}

impl DefaultValue {
    pub fn resolve(&self, row: &RowModel) -> Value {
        match self {
            DefaultValue::Static(value) => value.clone(),
            DefaultValue::Computed(compute) => compute(row),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
            DefaultValue::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Options of one column; `None` means "not set" so options can be merged
#[derive(Clone, Default)]
pub struct ColumnOptions {
    pub column_type: Option<ColumnType>,
    pub default: Option<DefaultValue>,
    pub parse: Option<ParseFn>,
    pub header: Option<String>,
    pub dynamic: Option<bool>,
    pub validate_type: Option<bool>,
    pub header_matchers: Option<Vec<String>>,
}

impl fmt::Debug for ColumnOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnOptions")
            .field("column_type", &self.column_type)
            .field("default", &self.default)
            .field("parse", &self.parse.as_ref().map(|_| ".."))
            .field("header", &self.header)
            .field("dynamic", &self.dynamic)
            .field("validate_type", &self.validate_type)
            .field("header_matchers", &self.header_matchers)
            .finish()
    }
}

impl ColumnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = Some(column_type);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    pub fn default_with<F>(mut self, compute: F) -> Self
    where
        F: Fn(&RowModel) -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Computed(Arc::new(compute)));
        self
    }

    pub fn parse<F>(mut self, parse: F) -> Self
    where
        F: Fn(&str, &RowModel) -> Value + Send + Sync + 'static,
    {
        self.parse = Some(Arc::new(parse));
        self
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.dynamic = Some(true);
        self
    }

    pub fn validate_type(mut self, validate: bool) -> Self {
        self.validate_type = Some(validate);
        self
    }

    pub fn header_matchers<S: Into<String>>(mut self, matchers: impl IntoIterator<Item = S>) -> Self {
        self.header_matchers = Some(matchers.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic.unwrap_or(false)
    }

    pub fn type_or_default(&self) -> ColumnType {
        self.column_type.unwrap_or_default()
    }

    /// Shallow merge: every option set on `other` replaces ours
    pub fn merge(&mut self, other: &ColumnOptions) {
        if other.column_type.is_some() {
            self.column_type = other.column_type;
        }
        if other.default.is_some() {
            self.default = other.default.clone();
        }
        if other.parse.is_some() {
            self.parse = other.parse.clone();
        }
        if other.header.is_some() {
            self.header = other.header.clone();
        }
        if other.dynamic.is_some() {
            self.dynamic = other.dynamic;
        }
        if other.validate_type.is_some() {
            self.validate_type = other.validate_type;
        }
        if other.header_matchers.is_some() {
            self.header_matchers = other.header_matchers.clone();
        }
    }

    /// Build options from textual `key => value` pairs (CLI, config files).
    ///
    /// Keys outside [`RECOGNIZED_OPTIONS`] are rejected all at once.
    pub fn from_pairs<K, V, I>(owner: &str, pairs: I) -> Result<Self, RowModelError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let pairs: Vec<(K, V)> = pairs.into_iter().collect();
        let invalid: Vec<&str> = pairs
            .iter()
            .map(|(k, _)| k.as_ref())
            .filter(|k| !RECOGNIZED_OPTIONS.contains(k))
            .collect();
        if !invalid.is_empty() {
            return Err(RowModelError::invalid_option(
                &format!("column '{}'", owner),
                &invalid,
            ));
        }

        let mut options = ColumnOptions::new();
        for (key, value) in &pairs {
            let value = value.as_ref();
            options = match key.as_ref() {
                "type" => options.column_type(value.parse()?),
                "default" => options.default_value(value),
                "parse" => options.named_parse(owner, value)?,
                "header" => options.header(value),
                "dynamic" => ColumnOptions {
                    dynamic: Some(parse_flag(owner, "dynamic", value)?),
                    ..options
                },
                "validate_type" => options.validate_type(parse_flag(owner, "validate_type", value)?),
                // matched header variants are `|`-separated, like a regex alternation
                _ => options.header_matchers(value.split('|').map(str::trim)),
            };
        }
        Ok(options)
    }

    fn named_parse(self, owner: &str, name: &str) -> Result<Self, RowModelError> {
        let options = match name {
            "trim" => self.parse(|cell, _| Value::from(cell.trim())),
            "upcase" => self.parse(|cell, _| Value::from(cell.to_uppercase())),
            "downcase" => self.parse(|cell, _| Value::from(cell.to_lowercase())),
            other => {
                return Err(RowModelError::invalid_option(
                    &format!("column '{}'", owner),
                    &[format!("parse={}", other)],
                ))
            }
        };
        Ok(options)
    }
}

fn parse_flag(owner: &str, key: &str, value: &str) -> Result<bool, RowModelError> {
    match value.trim().to_lowercase().as_str() {
        "" | "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(RowModelError::invalid_option(
            &format!("column '{}'", owner),
            &[format!("{}={}", key, value)],
        )),
    }
}

/// One local column statement of a class
#[derive(Debug, Clone)]
pub enum ColumnDeclaration {
    /// Declare (or wholly redeclare) a column
    Column { name: String, options: ColumnOptions },
    /// Shallow-merge options into an inherited or earlier column
    MergeOptions { name: String, options: ColumnOptions },
}

/// Resolved, ordered `name => options` table of a class
#[derive(Debug, Clone, Default)]
pub struct ColumnTable {
    entries: Vec<(String, ColumnOptions)>,
}

impl ColumnTable {
    /// Fold a class's local declarations onto the inherited table
    pub fn apply(mut self, declarations: &[ColumnDeclaration]) -> Self {
        for declaration in declarations {
            match declaration {
                ColumnDeclaration::Column { name, options } => {
                    match self.entries.iter_mut().find(|(n, _)| n == name) {
                        Some(entry) => entry.1 = options.clone(),
                        None => self.entries.push((name.clone(), options.clone())),
                    }
                }
                ColumnDeclaration::MergeOptions { name, options } => {
                    if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
                        entry.1.merge(options);
                    }
                }
            }
        }
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnOptions> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Name of the dynamic column, if any
    pub fn dynamic_column(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, o)| o.is_dynamic())
            .map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnOptions)> {
        self.entries.iter().map(|(n, o)| (n.as_str(), o))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
