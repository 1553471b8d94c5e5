//! csv-row-model CLI
//!
//! Reads a CSV file through a row-model class described on the command line
//! and writes the rows that pass validation to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- people.csv > clean.csv
//! cargo run -- -c name -c "age:type=integer,default=0" --require name people.csv > clean.csv
//! cargo run -- -c id --dynamic skills --delimiter ";" skills.csv > clean.csv
//! RUST_LOG=debug cargo run -- people.csv > clean.csv
//! ```
//!
//! Without `--column`, one untyped column is declared per header label.
//! Skipped rows and parse problems are logged to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success (including runs that skipped or aborted on rows)
//! - 1: Error (bad column definition, file not found, output failure, etc.)

use csv_row_model::cli;
use csv_row_model::pipeline::ImportPipeline;
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(cli::log_filter(
            std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
        ))
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();

    let pipeline = args
        .build_schema()
        .and_then(|schema| Ok((schema, args.to_context()?)))
        .map(|(schema, context)| {
            ImportPipeline::new(schema)
                .config(args.to_reader_config())
                .context(context)
                .write_headers(!args.no_header)
        });
    let pipeline = match pipeline {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let mut output = std::io::stdout();
    match pipeline.process(&args.input_file, &mut output) {
        Ok(summary) => info!(
            imported = summary.imported,
            skipped = summary.skipped,
            aborted = summary.aborted,
            "import finished"
        ),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
