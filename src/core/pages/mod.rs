//! Page artifact naming and discovery.
//!
//! Pages are stored as `page_0001.png`, `page_0002.png`, ... in one capture
//! directory. Listing is ordered by the parsed index, not by string order, so
//! captures that run past `page_9999` stay in sequence.

use crate::error::ScanError;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

/// Sidecar file name inside a capture directory
pub const METADATA_FILE: &str = "metadata.json";

fn page_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^page_(\d+)\.png$").expect("valid page regex"))
}

/// File name for a 1-based page index
pub fn page_file_name(index: u32) -> String {
    format!("page_{:04}.png", index)
}

/// Full path for a page index inside `dir`
pub fn page_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(page_file_name(index))
}

/// Parse the index out of a page file name
pub fn parse_page_index(file_name: &str) -> Option<u32> {
    page_pattern()
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// List the page files of a capture directory, oldest first
pub fn list_pages(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    if !dir.is_dir() {
        return Err(ScanError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut pages = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| ScanError::ReadDirectory {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(index) = entry.file_name().to_str().and_then(parse_page_index) {
            pages.push((index, entry.into_path()));
        }
    }

    pages.sort_by_key(|(index, _)| *index);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

/// File name component of a path, for logs and reports
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
