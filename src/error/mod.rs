//! # Error Module
//!
//! Error types for the page duplicate detector.
//!
//! ## Design Principles
//! - **Never guess a verdict** - a comparison that cannot be computed is an
//!   error, not a default metrics value
//! - **Include context** - paths, file names, what went wrong
//! - **Keep failure kinds apart** - reaching the end of a book is not an error,
//!   a broken recovery probe is

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum PageDedupError {
    #[error("Comparison error: {0}")]
    Compare(#[from] ComparisonError),

    #[error("Capture guard error: {0}")]
    Guard(#[from] GuardError),

    #[error("Capture device error: {0}")]
    Actuator(#[from] ActuatorError),

    #[error("Page directory error: {0}")]
    Scan(#[from] ScanError),

    #[error("Metadata error: {0}")]
    Sidecar(#[from] SidecarError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An image could not be read or decoded while comparing two pages
#[derive(Error, Debug)]
pub enum ComparisonError {
    #[error("Failed to decode image {path}: {reason}")]
    DecodeError { path: PathBuf, reason: String },

    #[error("Image is empty or corrupted: {path}")]
    EmptyImage { path: PathBuf },

    #[error("Failed to open image file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Resize failed: {0}")]
    ResizeFailed(String),

    #[error("Pages are not comparable: {reason}")]
    Incompatible { reason: String },
}

/// The one-shot recovery probe could not turn the page or capture the
/// confirmation frame
#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Recovery page turn failed: {source}")]
    TurnPage {
        #[source]
        source: ActuatorError,
    },

    #[error("Recovery capture to {path} failed: {source}")]
    ConfirmCapture {
        path: PathBuf,
        #[source]
        source: ActuatorError,
    },
}

/// Errors reported by a page actuator (page turns, frame capture, liveness)
#[derive(Error, Debug)]
pub enum ActuatorError {
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited unsuccessfully: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("Capture produced no file at {path}")]
    MissingFrame { path: PathBuf },

    #[error("No command configured for {action}")]
    NotConfigured { action: &'static str },

    #[error("{0}")]
    Device(String),
}

/// Errors raised by the live capture guard
#[derive(Error, Debug)]
pub enum GuardError {
    #[error(transparent)]
    Comparison(#[from] ComparisonError),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error("Page capture to {path} failed: {source}")]
    Capture {
        path: PathBuf,
        #[source]
        source: ActuatorError,
    },

    #[error("Capture guard has already stopped")]
    Stopped,

    #[error("{event} is not valid while {phase}")]
    InvalidTransition { phase: String, event: String },
}

/// Errors listing the page files of a capture directory
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Failed to read directory {path}: {reason}")]
    ReadDirectory { path: PathBuf, reason: String },
}

/// Errors reading or writing the `metadata.json` sidecar
#[derive(Error, Debug)]
pub enum SidecarError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize metadata: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Invalid thresholds or settings, rejected before any run begins
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{field} must be {expected} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

impl ConfigError {
    pub(crate) fn out_of_range(
        field: &'static str,
        value: impl std::fmt::Display,
        expected: &'static str,
    ) -> Self {
        ConfigError::OutOfRange {
            field,
            value: value.to_string(),
            expected,
        }
    }
}

/// A marked duplicate that could not be deleted.
///
/// Never propagated: recorded in the tail report and logged.
#[derive(Error, Debug, Clone, serde::Serialize)]
#[error("Failed to remove {path}: {reason}")]
pub struct RemovalFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, PageDedupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_includes_path() {
        let error = ComparisonError::DecodeError {
            path: PathBuf::from("/captures/page_0007.png"),
            reason: "invalid PNG signature".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("page_0007.png"));
        assert!(message.contains("invalid PNG signature"));
    }

    #[test]
    fn recovery_error_is_distinct_from_comparison() {
        let error: GuardError = RecoveryError::TurnPage {
            source: ActuatorError::Device("window closed".to_string()),
        }
        .into();
        assert!(matches!(error, GuardError::Recovery(_)));
        assert!(error.to_string().contains("window closed"));
    }

    #[test]
    fn config_error_names_field_and_value() {
        let error = ConfigError::out_of_range("duplicate_threshold", 65, "between 0 and 64");
        let message = error.to_string();
        assert!(message.contains("duplicate_threshold"));
        assert!(message.contains("65"));
    }
}
