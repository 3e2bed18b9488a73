//! # page-dedup CLI
//!
//! Command-line interface for page duplicate detection.
//!
//! ## Usage
//! ```bash
//! page-dedup dedupe-tail --input captures/dune --dry-run
//! page-dedup capture --book "Dune" --max-pages 500
//! ```

mod cli;

use console::style;
use std::process::ExitCode;

fn main() -> ExitCode {
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
