// CLI module
// Command-line interface and argument parsing

mod args;

pub use args::{parse_column_spec, CliArgs};

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Log directive used when `RUST_LOG` is unset or unparseable
pub const DEFAULT_LOG_DIRECTIVE: &str = "warn";

/// Parse command-line arguments using clap
///
/// If parsing fails (invalid arguments, missing input, or `--help`), clap
/// displays an error message or help text and exits the process.
///
/// # Returns
///
/// Returns a `CliArgs` struct with the parsed command-line arguments.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

/// Log filter built from `directives` (the value of `RUST_LOG`), falling back to
/// [`DEFAULT_LOG_DIRECTIVE`]
pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_DIRECTIVE))
}
