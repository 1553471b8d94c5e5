//! Dynamic columns
//!
//! A class may declare one trailing dynamic column. It absorbs every cell past
//! the fixed columns, labeled by the header cells past the same offset:
//!
//! ```text
//! header:  first_name, last_name, Ruby, Python, Rust
//! row:     Mario,      Doe,       Yes,  No,     Yes
//!          └──── fixed ────────┘  └──── skills (dynamic) ───┘
//! ```
//!
//! Each trailing cell goes through `format_cell`, then the per-cell
//! `format_dynamic_column_cell` hook with its header label; the resulting
//! group goes through `format_dynamic_column_cells`.

use crate::core::row_model::RowModel;
use crate::core::schema::ColumnAccessor;
use crate::types::Value;

impl RowModel {
    /// Header labels past the fixed columns
    pub fn dynamic_column_source_headers(&self) -> &[String] {
        if self.schema().dynamic_column().is_none() {
            return &[];
        }
        self.source_header()
            .get(self.schema().fixed_column_count()..)
            .unwrap_or(&[])
    }

    /// Raw cells past the fixed columns
    pub fn dynamic_column_source_cells(&self) -> &[String] {
        if self.schema().dynamic_column().is_none() {
            return &[];
        }
        self.source_row()
            .get(self.schema().fixed_column_count()..)
            .unwrap_or(&[])
    }

    pub(crate) fn dynamic_attribute(&self, accessor: &ColumnAccessor) -> Value {
        let hooks = self.schema().hooks();
        let headers = self.dynamic_column_source_headers();

        let cells = self
            .dynamic_column_source_cells()
            .iter()
            .enumerate()
            .map(|(offset, cell)| {
                let formatted =
                    hooks.format_cell(Some(cell.as_str()), &accessor.name, accessor.index, self.context());
                let label = headers.get(offset).map(String::as_str).unwrap_or("");
                hooks.format_dynamic_column_cell(formatted, label, &accessor.name)
            })
            .collect();

        hooks.format_dynamic_column_cells(cells, &accessor.name, accessor.index, self.context())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::columns::ColumnOptions;
    use crate::core::hooks::RowModelHooks;
    use crate::core::row_model::{RowModel, RowOptions};
    use crate::core::schema::ModelRegistry;
    use crate::types::{Context, Value};
    use std::sync::Arc;

    struct Skills;

    impl RowModelHooks for Skills {
        fn format_dynamic_column_cell(
            &self,
            value: Option<String>,
            source_header: &str,
            _column_name: &str,
        ) -> Value {
            match value.as_deref() {
                Some("Yes") => Value::from(source_header),
                _ => Value::Null,
            }
        }

        fn format_dynamic_column_cells(
            &self,
            cells: Vec<Value>,
            _column_name: &str,
            _column_index: usize,
            _context: &Context,
        ) -> Value {
            Value::List(cells.into_iter().filter(|c| !c.is_null()).collect())
        }
    }

    fn header() -> Arc<Vec<String>> {
        Arc::new(
            ["first_name", "last_name", "Ruby", "Python", "Rust"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    fn cells(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_dynamic_cells_default_to_a_list_of_text() {
        let mut models = ModelRegistry::new();
        let class = models.define("Person");
        models.column(class, "first_name", ColumnOptions::new()).unwrap();
        models.column(class, "last_name", ColumnOptions::new()).unwrap();
        models.dynamic_column(class, "skills", ColumnOptions::new()).unwrap();
        let row = RowModel::new(
            models.schema(class).unwrap(),
            cells(&["Mario", "Doe", "Yes", "No", "Yes"]),
            RowOptions::new().source_header(header()),
        );

        assert_eq!(row.dynamic_column_source_headers(), ["Ruby", "Python", "Rust"]);
        assert_eq!(row.dynamic_column_source_cells(), ["Yes", "No", "Yes"]);
        assert_eq!(
            row.attribute("skills").unwrap(),
            Value::List(vec!["Yes".into(), "No".into(), "Yes".into()])
        );
        assert_eq!(row.mapped_row().len(), 2);
    }

    #[test]
    fn test_dynamic_hooks_see_each_cell_with_its_header() {
        let mut models = ModelRegistry::new();
        let class = models.define("Person");
        models.column(class, "first_name", ColumnOptions::new()).unwrap();
        models.column(class, "last_name", ColumnOptions::new()).unwrap();
        models.dynamic_column(class, "skills", ColumnOptions::new()).unwrap();
        models.hooks(class, Skills).unwrap();
        let row = RowModel::new(
            models.schema(class).unwrap(),
            cells(&["Mario", "Doe", "Yes", "No", "Yes"]),
            RowOptions::new().source_header(header()),
        );

        assert_eq!(
            row.attribute("skills").unwrap(),
            Value::List(vec!["Ruby".into(), "Rust".into()])
        );
    }

    #[test]
    fn test_row_without_trailing_cells_has_an_empty_group() {
        let mut models = ModelRegistry::new();
        let class = models.define("Person");
        models.column(class, "first_name", ColumnOptions::new()).unwrap();
        models.dynamic_column(class, "skills", ColumnOptions::new()).unwrap();
        let row = RowModel::new(models.schema(class).unwrap(), cells(&["Mario"]), RowOptions::new());

        assert!(row.dynamic_column_source_cells().is_empty());
        assert_eq!(row.attribute("skills").unwrap(), Value::List(vec![]));
    }
}
