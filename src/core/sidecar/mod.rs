//! # Sidecar Module
//!
//! The `metadata.json` file that sits next to the page images.
//!
//! Written by a capture session, rewritten by every non-dry tail run. Writes
//! go through a temporary file in the same directory and an atomic rename, so
//! readers never see a half-written sidecar. Fields this crate does not know
//! about are carried through untouched.

use crate::core::pages::METADATA_FILE;
use crate::core::policy::PolicyConfig;
use crate::error::SidecarError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Whole-directory capture record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureMetadata {
    /// Number of pages currently in the sequence
    #[serde(default)]
    pub total_pages: usize,

    /// Book or session label given at capture time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book: Option<String>,

    /// Identifier of the capture session that produced the pages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// When the capture finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<NaiveDateTime>,

    /// Why the capture stopped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,

    /// Thresholds the capture ran with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<PolicyConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_limit: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_pages: Option<u32>,

    /// Per-page entries in capture order
    #[serde(default)]
    pub pages: Vec<PageEntry>,

    /// Every tail run, oldest first; only ever appended to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dedupe_tail_history: Vec<TailHistoryEntry>,

    /// The most recent tail run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedupe_tail: Option<TailHistoryEntry>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One captured page.
///
/// Every field is optional on read: sidecars written by other capture tools
/// may carry just `{page, location, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEntry {
    #[serde(default)]
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<NaiveDateTime>,
    /// dHash hex
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    /// Hash distance to the last kept page
    #[serde(default)]
    pub hash_distance: Option<u32>,
    #[serde(default)]
    pub mean_diff: Option<f64>,
    #[serde(default)]
    pub size_kb: f64,
    #[serde(default)]
    pub size_delta_kb: Option<f64>,
    #[serde(default)]
    pub size_delta_ratio: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Record of one tail deduplication run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailHistoryEntry {
    pub timestamp: NaiveDateTime,
    pub removed_count: usize,
    pub removed_files: Vec<String>,
    pub thresholds: PolicyConfig,
    pub min_pages: usize,
    pub remaining_pages: usize,
}

impl CaptureMetadata {
    /// Reflect a tail run: drop removed pages, update the count, append history.
    ///
    /// `removed_files` must list only files that were actually deleted.
    pub fn record_tail_run(
        &mut self,
        removed_files: &[String],
        thresholds: PolicyConfig,
        min_pages: usize,
        remaining_pages: usize,
    ) -> TailHistoryEntry {
        let removed: BTreeSet<&str> = removed_files.iter().map(String::as_str).collect();
        self.pages.retain(|entry| {
            entry
                .file
                .as_deref()
                .map_or(true, |file| !removed.contains(file))
        });
        self.total_pages = remaining_pages;

        let entry = TailHistoryEntry {
            timestamp: chrono::Local::now().naive_local(),
            removed_count: removed.len(),
            removed_files: removed.iter().map(|name| name.to_string()).collect(),
            thresholds,
            min_pages,
            remaining_pages,
        };

        self.dedupe_tail_history.push(entry.clone());
        self.dedupe_tail = Some(entry.clone());
        entry
    }
}

/// Location of the sidecar for a capture directory
pub fn sidecar_path(dir: &Path) -> PathBuf {
    dir.join(METADATA_FILE)
}

/// Load the sidecar, or `None` if the directory has none
pub fn load(dir: &Path) -> Result<Option<CaptureMetadata>, SidecarError> {
    let path = sidecar_path(dir);
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&path).map_err(|e| SidecarError::Read {
        path: path.clone(),
        source: e,
    })?;
    let metadata =
        serde_json::from_str(&contents).map_err(|e| SidecarError::Parse { path, source: e })?;
    Ok(Some(metadata))
}

/// Atomically replace the sidecar
pub fn save(dir: &Path, metadata: &CaptureMetadata) -> Result<(), SidecarError> {
    let path = sidecar_path(dir);
    let json = serde_json::to_string_pretty(metadata)?;

    let write_error = |source: std::io::Error| SidecarError::Write {
        path: path.clone(),
        source,
    };

    let mut file = NamedTempFile::new_in(dir).map_err(write_error)?;
    file.write_all(json.as_bytes()).map_err(write_error)?;
    file.write_all(b"\n").map_err(write_error)?;
    file.as_file().sync_all().map_err(write_error)?;
    file.persist(&path).map_err(|e| write_error(e.error))?;
    Ok(())
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Round size fields the way they are stored: KB to 2 places, ratio to 6
pub fn round_kb(value: f64) -> f64 {
    round_to(value, 2)
}

pub fn round_ratio(value: f64) -> f64 {
    round_to(value, 6)
}
