use crate::core::columns::ColumnOptions;
use crate::core::schema::{ModelRegistry, Schema};
use crate::core::validation::Rule;
use crate::io::csv_source::ReaderConfig;
use crate::pipeline::ImportPipeline;
use crate::types::{Context, RowModelError};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

/// Read a CSV file into typed, validated row models and write the valid rows back out
#[derive(Parser, Debug)]
#[command(name = "csv-row-model")]
#[command(about = "Read CSV rows through typed column definitions", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Column declarations, in CSV order
    #[arg(
        short = 'c',
        long = "column",
        value_name = "SPEC",
        help = "Column as name[:key=value,...]; keys: type, default, parse, header, validate_type, header_matchers. Inferred from the header when omitted"
    )]
    pub columns: Vec<String>,

    /// Trailing dynamic column absorbing every cell past the declared columns
    #[arg(long = "dynamic", value_name = "NAME")]
    pub dynamic: Option<String>,

    /// Columns that must not be blank; rows missing them are skipped
    #[arg(long = "require", value_name = "NAME")]
    pub required: Vec<String>,

    /// Values added to every row's context
    #[arg(long = "context", value_name = "KEY=VALUE")]
    pub context: Vec<String>,

    /// Field delimiter
    #[arg(
        long = "delimiter",
        value_name = "CHAR",
        default_value = ",",
        value_parser = parse_delimiter
    )]
    pub delimiter: u8,

    /// Keep whitespace around fields
    #[arg(long = "no-trim")]
    pub no_trim: bool,

    /// Treat rows whose length differs from the header as unparseable
    #[arg(long = "strict")]
    pub strict: bool,

    /// Read buffer size in bytes
    #[arg(
        long = "buffer-capacity",
        value_name = "BYTES",
        help = "Read buffer size in bytes (default: 8192)"
    )]
    pub buffer_capacity: Option<usize>,

    /// Do not write a header row to the output
    #[arg(long = "no-header")]
    pub no_header: bool,
}

fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "\\t" | "tab" => Ok(b'\t'),
        _ => match value.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => Err(format!("delimiter must be a single ASCII character, got '{}'", value)),
        },
    }
}

/// Split `name[:key=value,...]` into the column name and its option pairs
pub fn parse_column_spec(spec: &str) -> Result<(String, ColumnOptions), RowModelError> {
    let (name, options) = match spec.split_once(':') {
        Some((name, options)) => (name.trim(), options),
        None => (spec.trim(), ""),
    };
    if name.is_empty() {
        return Err(RowModelError::invalid_option("column", &[spec]));
    }

    let pairs: Vec<(&str, &str)> = options
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect();

    Ok((name.to_string(), ColumnOptions::from_pairs(name, pairs)?))
}

impl CliArgs {
    /// Create a ReaderConfig from CLI arguments
    ///
    /// Falls back to the default buffer capacity when none (or zero) is given.
    pub fn to_reader_config(&self) -> ReaderConfig {
        let default = ReaderConfig::default();
        ReaderConfig::new(
            self.delimiter,
            !self.no_trim,
            !self.strict,
            self.buffer_capacity.unwrap_or(default.buffer_capacity),
        )
    }

    /// The row-model class described by the column arguments
    ///
    /// Without `--column`, columns are inferred (untyped) from the input's header row.
    pub fn build_schema(&self) -> Result<Arc<Schema>, RowModelError> {
        let mut models = ModelRegistry::new();
        let class = models.define("CliRowModel");

        if self.columns.is_empty() {
            let inferred = ImportPipeline::infer_schema(&self.input_file, &self.to_reader_config())?;
            for name in inferred.column_names() {
                models.column(class, &name, ColumnOptions::new())?;
            }
        } else {
            for spec in &self.columns {
                let (name, options) = parse_column_spec(spec)?;
                models.column(class, &name, options)?;
            }
        }

        if let Some(name) = &self.dynamic {
            models.dynamic_column(class, name, ColumnOptions::new())?;
        }
        for name in &self.required {
            if !models.column_names(class)?.contains(name) {
                return Err(RowModelError::unknown_column("CliRowModel", name));
            }
            models.validate(class, Rule::presence(name))?;
        }
        models.schema(class)
    }

    /// Context values from `--context KEY=VALUE`
    pub fn to_context(&self) -> Result<Context, RowModelError> {
        let mut context = Context::new();
        for entry in &self.context {
            match entry.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    context.insert(key.trim(), value.trim());
                }
                _ => return Err(RowModelError::invalid_option("context", &[entry])),
            }
        }
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::columns::ColumnType;
    use rstest::rstest;

    #[rstest]
    #[case::no_options(&["program", "input.csv"], b',', true, true)]
    #[case::semicolon(&["program", "--delimiter", ";", "input.csv"], b';', true, true)]
    #[case::tab(&["program", "--delimiter", "tab", "input.csv"], b'\t', true, true)]
    #[case::no_trim(&["program", "--no-trim", "input.csv"], b',', false, true)]
    #[case::strict(&["program", "--strict", "input.csv"], b',', true, false)]
    fn test_reader_config_conversion(
        #[case] args: &[&str],
        #[case] delimiter: u8,
        #[case] trim: bool,
        #[case] flexible: bool,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_reader_config();

        assert_eq!(config.delimiter, delimiter);
        assert_eq!(config.trim, trim);
        assert_eq!(config.flexible, flexible);
        assert_eq!(config.buffer_capacity, 8 * 1024);
    }

    #[rstest]
    #[case::custom(&["program", "--buffer-capacity", "4096", "input.csv"], 4096)]
    #[case::zero_falls_back(&["program", "--buffer-capacity", "0", "input.csv"], 8 * 1024)]
    fn test_buffer_capacity(#[case] args: &[&str], #[case] expected: usize) {
        let config = CliArgs::try_parse_from(args).unwrap().to_reader_config();
        assert_eq!(config.buffer_capacity, expected);
    }

    #[test]
    fn test_repeated_columns_keep_order() {
        let parsed = CliArgs::try_parse_from([
            "program",
            "-c",
            "name",
            "--column",
            "age:type=integer,default=0",
            "--require",
            "name",
            "input.csv",
        ])
        .unwrap();

        assert_eq!(parsed.columns, vec!["name", "age:type=integer,default=0"]);
        assert_eq!(parsed.required, vec!["name"]);

        let schema = parsed.build_schema().unwrap();
        assert_eq!(schema.column_names(), vec!["name", "age"]);
        assert_eq!(schema.rules().len(), 1);
    }

    #[rstest]
    #[case::bare("name", "name", None)]
    #[case::typed("age:type=integer", "age", Some(ColumnType::Integer))]
    #[case::spaced(" when : type = date , header = When ", "when", Some(ColumnType::Date))]
    fn test_parse_column_spec(
        #[case] spec: &str,
        #[case] name: &str,
        #[case] column_type: Option<ColumnType>,
    ) {
        let (parsed, options) = parse_column_spec(spec).unwrap();
        assert_eq!(parsed, name);
        assert_eq!(options.column_type, column_type);
    }

    #[rstest]
    #[case::unknown_key("age:colour=red")]
    #[case::bad_type("age:type=object")]
    #[case::no_name(":type=integer")]
    fn test_parse_column_spec_errors(#[case] spec: &str) {
        let error = parse_column_spec(spec).unwrap_err();
        assert!(error.is_definition());
    }

    #[test]
    fn test_required_column_must_be_declared() {
        let parsed =
            CliArgs::try_parse_from(["program", "-c", "name", "--require", "age", "input.csv"]).unwrap();
        assert!(matches!(
            parsed.build_schema(),
            Err(RowModelError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_context_pairs() {
        let parsed =
            CliArgs::try_parse_from(["program", "--context", "source=upload", "input.csv"]).unwrap();
        let context = parsed.to_context().unwrap();
        assert_eq!(context.get("source").and_then(|v| v.as_str()), Some("upload"));
    }

    #[rstest]
    #[case::missing_input(&["program"])]
    #[case::long_delimiter(&["program", "--delimiter", ";;", "input.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        let result = CliArgs::try_parse_from(args);
        assert!(result.is_err());
    }
}
