//! Per-class override points
//!
//! Every row-model class carries one [`RowModelHooks`] object. Subclasses
//! inherit their parent's hooks unless they install their own. All methods
//! have identity/neutral defaults, so implementors only override what they
//! need.

use crate::core::row_model::RowModel;
use crate::types::{Context, Value};

/// Overridable formatting and iteration policy for a row-model class
pub trait RowModelHooks: Send + Sync {
    /// Applied to each raw cell before parsing. `None` is a missing cell.
    fn format_cell(
        &self,
        cell: Option<&str>,
        _column_name: &str,
        _column_index: usize,
        _context: &Context,
    ) -> Option<String> {
        cell.map(str::to_string)
    }

    /// Header label for a column without an explicit `header` option
    fn format_header(&self, column_name: &str) -> String {
        column_name.to_string()
    }

    /// Formats the whole group of a dynamic column
    fn format_dynamic_column_cells(
        &self,
        cells: Vec<Value>,
        _column_name: &str,
        _column_index: usize,
        _context: &Context,
    ) -> Value {
        Value::List(cells)
    }

    /// Formats one dynamic cell together with its header label
    fn format_dynamic_column_cell(
        &self,
        value: Option<String>,
        _source_header: &str,
        _column_name: &str,
    ) -> Value {
        value.map(Value::Text).unwrap_or(Value::Null)
    }

    /// True when a reader should pass over this row
    fn skip(&self, row: &RowModel) -> bool {
        !row.is_valid()
    }

    /// True when a reader should stop at this row
    fn abort(&self, _row: &RowModel) -> bool {
        false
    }
}

/// Hooks with every default in place
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl RowModelHooks for DefaultHooks {}
