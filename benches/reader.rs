//! Benchmark suite for the streaming reader
//!
//! Measures reading a generated CSV file through typed row models, with and
//! without the export step, using the divan benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```
//!
//! Each benchmark reads a temporary file of the given row count with an
//! integer, a date, a boolean and a three-cell dynamic column.

use csv_row_model::{ColumnOptions, ColumnType, FileReader, ImportPipeline, ModelRegistry, Rule, Schema};
use csv_row_model::types::Context;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn main() {
    divan::main();
}

fn schema() -> Arc<Schema> {
    let mut models = ModelRegistry::new();
    let class = models.define("BenchRow");
    models.column(class, "name", ColumnOptions::new()).unwrap();
    models
        .column(class, "age", ColumnOptions::new().column_type(ColumnType::Integer).default_value(0))
        .unwrap();
    models
        .column(class, "joined", ColumnOptions::new().column_type(ColumnType::Date))
        .unwrap();
    models
        .column(class, "member", ColumnOptions::new().column_type(ColumnType::Boolean))
        .unwrap();
    models.dynamic_column(class, "tags", ColumnOptions::new()).unwrap();
    models.validate(class, Rule::presence("name")).unwrap();
    models.schema(class).unwrap()
}

fn fixture(rows: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "name,age,joined,member,a,b,c").unwrap();
    for i in 0..rows {
        let name = if i % 50 == 0 { String::new() } else { format!("user{}", i) };
        writeln!(file, "{},{},2024-01-{:02},{},x,y,z", name, i % 90, i % 28 + 1, i % 2).unwrap();
    }
    file.flush().unwrap();
    file
}

/// Iterate every row, forcing attribute parsing and validation
#[divan::bench(args = [100, 1_000, 100_000])]
fn read_rows(bencher: divan::Bencher, rows: usize) {
    let file = fixture(rows);
    let schema = schema();

    bencher.bench(|| {
        let mut reader = FileReader::new(file.path(), Arc::clone(&schema), Context::new());
        let mut count = 0;
        for row in reader.each_row() {
            divan::black_box(row.attributes());
            count += 1;
        }
        count
    });
}

/// Read, validate and export to an in-memory buffer
#[divan::bench(args = [100, 1_000, 100_000])]
fn import_pipeline(bencher: divan::Bencher, rows: usize) {
    let file = fixture(rows);
    let pipeline = ImportPipeline::new(schema());

    bencher.bench(|| {
        let mut output = Vec::new();
        pipeline
            .process(file.path(), &mut output)
            .expect("Processing failed");
        output
    });
}
