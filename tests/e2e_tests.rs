//! End-to-end integration tests
//!
//! These tests validate the complete read-validate-export pipeline using
//! predefined CSV test fixtures. Each test:
//! 1. Parses a command line exactly as the binary would
//! 2. Builds the row-model class and pipeline from it
//! 3. Reads input.csv from a fixture directory and writes the output CSV
//! 4. Compares actual output with expected.csv
//!
//! Test fixtures are located in tests/fixtures/ and cover:
//! - Columns inferred from the header row
//! - Typed columns with defaults and required values
//! - Trailing dynamic columns
//! - Reader settings (delimiter, strict row lengths)
//! - Type validation of malformed cells

#[cfg(test)]
mod tests {
    use clap::Parser;
    use csv_row_model::cli::CliArgs;
    use csv_row_model::{ImportPipeline, ImportSummary, RowModelError};
    use rstest::rstest;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use tempfile::NamedTempFile;

    fn pipeline_for(args: &CliArgs) -> ImportPipeline {
        let schema = args
            .build_schema()
            .unwrap_or_else(|e| panic!("Failed to build schema: {}", e));
        ImportPipeline::new(schema)
            .config(args.to_reader_config())
            .context(args.to_context().unwrap())
            .write_headers(!args.no_header)
    }

    /// Run a test fixture by processing input.csv and comparing with expected.csv
    ///
    /// # Arguments
    ///
    /// * `fixture_name` - Name of the fixture directory (e.g., "typed_defaults")
    /// * `options` - Command-line options placed before the input path
    ///
    /// # Panics
    ///
    /// Panics if:
    /// - Input or expected files cannot be read
    /// - Output doesn't match expected
    fn run_test_fixture(fixture_name: &str, options: &[&str]) -> ImportSummary {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );
        assert!(
            Path::new(&expected_path).exists(),
            "Expected file not found: {}",
            expected_path
        );

        let mut argv = vec!["csv-row-model"];
        argv.extend_from_slice(options);
        argv.push(&input_path);
        let args = CliArgs::try_parse_from(argv).unwrap();

        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");
        let summary = pipeline_for(&args)
            .process(&args.input_file, &mut temp_output)
            .unwrap_or_else(|e| panic!("Failed to process rows: {}", e));
        temp_output.flush().expect("Failed to flush temp file");

        let actual_output = fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e));
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (options: {:?})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, options, actual_output, expected_output
        );
        summary
    }

    #[rstest]
    #[case::inferred_columns("inferred_columns", &[], 0)]
    #[case::typed_defaults(
        "typed_defaults",
        &[
            "-c", "name",
            "-c", "age:type=integer,default=0",
            "-c", "joined:type=date",
            "-c", "member:type=boolean",
            "--require", "name",
        ],
        1
    )]
    #[case::dynamic_columns("dynamic_columns", &["-c", "id", "--dynamic", "skills"], 0)]
    #[case::semicolon_delimiter("semicolon_delimiter", &["--delimiter", ";"], 0)]
    #[case::short_rows("short_rows", &[], 0)]
    #[case::strict_lengths("strict_lengths", &["--strict"], 1)]
    #[case::type_validation(
        "type_validation",
        &["-c", "name", "-c", "age:type=integer,validate_type=true"],
        1
    )]
    fn test_fixtures(#[case] fixture: &str, #[case] options: &[&str], #[case] skipped: usize) {
        let summary = run_test_fixture(fixture, options);
        assert_eq!(summary.skipped, skipped);
        assert!(!summary.aborted);
    }

    #[test]
    fn test_no_header_option() {
        let args = CliArgs::try_parse_from([
            "csv-row-model",
            "--no-header",
            "tests/fixtures/short_rows/input.csv",
        ])
        .unwrap();
        let mut output = Vec::new();
        let summary = pipeline_for(&args).process(&args.input_file, &mut output).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "1,2\n3,\n4,5\n");
        assert_eq!(summary.imported, 3);
    }

    #[test]
    fn test_missing_input_file() {
        let args = CliArgs::try_parse_from([
            "csv-row-model",
            "-c",
            "name",
            "tests/fixtures/does_not_exist.csv",
        ])
        .unwrap();
        let result = pipeline_for(&args).process(&args.input_file, &mut Vec::new());

        assert!(matches!(result, Err(RowModelError::FileNotFound { .. })));
    }
}
