//! # page-dedup
//!
//! Duplicate-page detection for sequential e-reader page captures.
//!
//! ## What It Decides
//! Whether two consecutive captured frames show the same page, using three
//! signals that must all agree: difference-hash distance, mean grayscale
//! difference and file size change.
//!
//! ## Architecture
//! - `core` - fingerprinting, comparison, policy, the live capture guard and
//!   the tail deduplicator
//! - `config` - `config.yaml` loading and validation
//! - `events` - structured decision events
//! - `error` - error types

pub mod config;
pub mod core;
pub mod error;
pub mod events;

pub use error::{PageDedupError, Result};

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize tracing for the application.
///
/// Logs go to stderr, filtered by `RUST_LOG` (default `info`). With a
/// `log_file`, every line is also appended there without colors; missing
/// parent directories are created. Calling this twice leaves the first
/// subscriber in place.
pub fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            let open_error = |source: std::io::Error| PageDedupError::LogFile {
                path: path.to_path_buf(),
                source,
            };
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(open_error)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(open_error)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();
    Ok(())
}
