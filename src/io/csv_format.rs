//! Export side: typed values back to CSV rows
//!
//! This module centralizes all output format concerns, providing:
//! - [`ExportSource`], the field lookup an exported object offers
//! - [`ExportRowModel`], which lays a source out in a schema's column order
//! - [`CsvWriter`] and [`write_csv`] for serializing rows
//!
//! Row layout is pure (no I/O) for easy testing.

use crate::core::row_model::RowModel;
use crate::core::schema::Schema;
use crate::mapper::Mapper;
use crate::types::{Attributes, Context, RowModelError, Value};
use csv::Writer;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;

/// Anything that can hand out a value per column name
pub trait ExportSource {
    fn export_value(&self, column: &str) -> Value;
}

impl ExportSource for RowModel {
    fn export_value(&self, column: &str) -> Value {
        self.attribute(column).unwrap_or_default()
    }
}

impl ExportSource for Mapper {
    /// Derived attributes first, falling back to the wrapped row's columns
    fn export_value(&self, column: &str) -> Value {
        self.attribute(column)
            .or_else(|_| self.row_model().attribute(column))
            .unwrap_or_default()
    }
}

impl ExportSource for Attributes {
    fn export_value(&self, column: &str) -> Value {
        self.get(column).cloned().unwrap_or_default()
    }
}

impl ExportSource for HashMap<String, Value> {
    fn export_value(&self, column: &str) -> Value {
        self.get(column).cloned().unwrap_or_default()
    }
}

impl ExportSource for BTreeMap<String, Value> {
    fn export_value(&self, column: &str) -> Value {
        self.get(column).cloned().unwrap_or_default()
    }
}

/// One source laid out as a CSV row of `schema`
pub struct ExportRowModel<'a, S: ExportSource + ?Sized> {
    schema: &'a Schema,
    source: &'a S,
    context: Context,
    dynamic_headers: Vec<String>,
}

impl<'a, S: ExportSource + ?Sized> ExportRowModel<'a, S> {
    pub fn new(schema: &'a Schema, source: &'a S) -> Self {
        Self {
            schema,
            source,
            context: Context::new(),
            dynamic_headers: Vec::new(),
        }
    }

    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Labels written in place of the dynamic column's own header
    pub fn dynamic_headers(mut self, headers: Vec<String>) -> Self {
        self.dynamic_headers = headers;
        self
    }

    /// Column headers; the dynamic column expands into its labels when given
    pub fn headers(&self) -> Vec<String> {
        export_headers(self.schema, &self.dynamic_headers)
    }

    /// The source's values as CSV cells, in column order.
    ///
    /// Each value goes through the class's `format_cell` hook; a dynamic
    /// column's list expands into one cell per element.
    pub fn to_row(&self) -> Vec<String> {
        let hooks = self.schema.hooks();
        let mut row = Vec::with_capacity(self.schema.accessors().len());
        for accessor in self.schema.accessors() {
            let value = self.source.export_value(&accessor.name);
            let cells = if accessor.dynamic {
                value.into_cells()
            } else {
                vec![value.to_string()]
            };
            for cell in cells {
                let formatted = hooks.format_cell(Some(cell.as_str()), &accessor.name, accessor.index, &self.context);
                row.push(formatted.unwrap_or_default());
            }
        }
        row
    }
}

impl ExportRowModel<'_, RowModel> {
    /// This row followed by every descendant row, each in its own schema
    pub fn to_rows(&self) -> Vec<Vec<String>> {
        self.source
            .deep_map(|row| ExportRowModel::new(row.schema(), row).context(self.context.clone()).to_row())
    }
}

/// Header row of `schema`; the dynamic column expands into `dynamic_headers` when given
pub fn export_headers(schema: &Schema, dynamic_headers: &[String]) -> Vec<String> {
    let fixed = schema.fixed_column_count();
    let mut headers: Vec<String> = schema.headers().iter().take(fixed).cloned().collect();
    if let Some(dynamic) = schema.dynamic_column() {
        if dynamic_headers.is_empty() {
            headers.extend(schema.headers().get(dynamic.index).cloned());
        } else {
            headers.extend(dynamic_headers.iter().cloned());
        }
    }
    headers
}

/// Streaming CSV output
pub struct CsvWriter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(output: W) -> Self {
        Self {
            writer: Writer::from_writer(output),
        }
    }

    pub fn write_row<I, T>(&mut self, row: I) -> Result<(), RowModelError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer.write_record(row)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), RowModelError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Write an optional header plus rows to `output` as CSV
///
/// # Arguments
///
/// * `headers` - Header row, if one should be written
/// * `rows` - Rows of cells
/// * `output` - Mutable reference to a writer for outputting CSV
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(RowModelError)` if a write error occurred
pub fn write_csv<R>(headers: Option<&[String]>, rows: R, output: &mut dyn Write) -> Result<(), RowModelError>
where
    R: IntoIterator<Item = Vec<String>>,
{
    let mut writer = CsvWriter::new(output);
    if let Some(headers) = headers {
        writer.write_row(headers)?;
    }
    for row in rows {
        writer.write_row(&row)?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::columns::{ColumnOptions, ColumnType};
    use crate::core::row_model::RowOptions;
    use crate::core::schema::ModelRegistry;
    use std::sync::Arc;

    fn schema() -> Arc<Schema> {
        let mut models = ModelRegistry::new();
        let class = models.define("BasicExportModel");
        models
            .column(class, "string1", ColumnOptions::new().header("String 1"))
            .unwrap();
        models.column(class, "string2", ColumnOptions::new()).unwrap();
        models.schema(class).unwrap()
    }

    #[test]
    fn test_round_trip_from_row_model_and_map() {
        let schema = schema();
        let row = RowModel::new(
            Arc::clone(&schema),
            vec!["a".into(), "b".into()],
            RowOptions::new(),
        );
        let attributes = row.attributes();
        assert_eq!(attributes.get("string1"), Some(&Value::from("a")));
        assert_eq!(attributes.get("string2"), Some(&Value::from("b")));

        let mut object = HashMap::new();
        object.insert("string1".to_string(), Value::from("a"));
        object.insert("string2".to_string(), Value::from("b"));

        assert_eq!(ExportRowModel::new(&schema, &object).to_row(), vec!["a", "b"]);
        assert_eq!(ExportRowModel::new(&schema, row.as_ref()).to_row(), vec!["a", "b"]);
        assert_eq!(
            ExportRowModel::new(&schema, &attributes).headers(),
            vec!["String 1", "string2"]
        );
    }

    #[test]
    fn test_missing_values_export_as_empty_cells() {
        let schema = schema();
        let object: BTreeMap<String, Value> = BTreeMap::new();
        assert_eq!(ExportRowModel::new(&schema, &object).to_row(), vec!["", ""]);
    }

    #[test]
    fn test_dynamic_column_expands() {
        let mut models = ModelRegistry::new();
        let class = models.define("Skills");
        models
            .column(class, "age", ColumnOptions::new().column_type(ColumnType::Integer))
            .unwrap();
        models.dynamic_column(class, "skills", ColumnOptions::new()).unwrap();
        let schema = models.schema(class).unwrap();

        let object: Attributes = [
            ("age", Value::from(3)),
            ("skills", Value::List(vec!["Ruby".into(), "Rust".into()])),
        ]
        .into_iter()
        .collect();
        let export = ExportRowModel::new(&schema, &object)
            .dynamic_headers(vec!["first".into(), "second".into()]);

        assert_eq!(export.to_row(), vec!["3", "Ruby", "Rust"]);
        assert_eq!(export.headers(), vec!["age", "first", "second"]);
    }

    #[test]
    fn test_to_rows_includes_children() {
        let schema = schema();
        let parent = RowModel::new(Arc::clone(&schema), vec!["p".into(), "".into()], RowOptions::new());
        parent
            .append_child(vec!["".into(), "c".into()], RowOptions::new())
            .unwrap();

        let rows = ExportRowModel::new(&schema, parent.as_ref()).to_rows();
        assert_eq!(rows, vec![vec!["p", ""], vec!["", "c"]]);
    }

    #[test]
    fn test_write_csv() {
        let mut output = Vec::new();
        let headers = vec!["a".to_string(), "b".to_string()];
        write_csv(
            Some(&headers),
            vec![vec!["1".to_string(), "x,y".to_string()]],
            &mut output,
        )
        .unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "a,b\n1,\"x,y\"\n");
    }
}
