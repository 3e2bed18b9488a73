//! # Tail Module
//!
//! Offline removal of trailing duplicate pages from a finished capture.
//!
//! The walk starts at the last page and compares each tail with its
//! predecessor. A duplicate tail is marked and the walk moves one page
//! earlier; the first non-duplicate pair ends it. Each predecessor's
//! signature becomes the next tail's, so every page is decoded at most once.
//!
//! Planning never touches the directory. Committing deletes the marked files
//! and appends a history entry to `metadata.json`; a dry run only reports.

use crate::core::comparator::{compare, Comparator};
use crate::core::hasher::PageSignature;
use crate::core::pages::{display_name, list_pages};
use crate::core::policy::PolicyConfig;
use crate::core::sidecar::{self, TailHistoryEntry};
use crate::error::{ComparisonError, ConfigError, PageDedupError, RemovalFailure};
use crate::events::{Event, EventSender, TailEvent};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Tail deduplication settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TailConfig {
    pub policy: PolicyConfig,
    /// Never leave fewer pages than this
    pub min_pages: usize,
    /// Stop after marking this many pages
    pub max_remove: Option<usize>,
    /// Report only; delete nothing, write nothing
    pub dry_run: bool,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::default(),
            min_pages: 2,
            max_remove: None,
            dry_run: false,
        }
    }
}

impl TailConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.policy.validate()?;
        if self.min_pages == 0 {
            return Err(ConfigError::out_of_range("min_pages", 0, "greater than 0"));
        }
        if self.max_remove == Some(0) {
            return Err(ConfigError::out_of_range("max_remove", 0, "greater than 0"));
        }
        Ok(())
    }
}

/// Why the backward walk ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TailStop {
    /// Fewer than two pages; nothing to compare
    TooFewPages,
    /// Removing another page would go below `min_pages`
    FloorReached,
    /// `max_remove` pages marked
    LimitReached,
    /// Found the last genuinely new page
    NonDuplicate,
    /// A page could not be decoded; removals found so far stand
    ComparisonFailed { path: PathBuf, message: String },
}

/// A planned tail removal
#[derive(Debug, Clone)]
pub struct TailRun {
    /// The sequence as found, oldest first
    pages: Vec<PathBuf>,
    /// Marked pages, newest first
    removals: Vec<PathBuf>,
    stop: TailStop,
}

impl TailRun {
    /// Walk `pages` backwards and mark trailing duplicates
    pub fn plan(
        pages: Vec<PathBuf>,
        config: &TailConfig,
        comparator: &Comparator,
        events: &EventSender,
    ) -> Result<Self, ConfigError> {
        Self::plan_with(pages, config, events, |path| comparator.analyze(path))
    }

    fn plan_with<F>(
        pages: Vec<PathBuf>,
        config: &TailConfig,
        events: &EventSender,
        mut analyze: F,
    ) -> Result<Self, ConfigError>
    where
        F: FnMut(&Path) -> Result<PageSignature, ComparisonError>,
    {
        config.validate()?;

        if pages.len() < 2 {
            info!(pages = pages.len(), "Not enough pages to dedupe");
            return Ok(Self {
                pages,
                removals: Vec::new(),
                stop: TailStop::TooFewPages,
            });
        }

        let mut removals = Vec::new();
        let mut index = pages.len() - 1;
        let mut tail: Option<PageSignature> = None;

        let stop = loop {
            let remaining = pages.len() - removals.len();
            if remaining <= config.min_pages || index == 0 {
                info!(min_pages = config.min_pages, "Reached min_pages, stopping dedupe");
                events.send(Event::Tail(TailEvent::FloorReached {
                    min_pages: config.min_pages,
                }));
                break TailStop::FloorReached;
            }

            let previous_path = &pages[index - 1];
            let current_path = &pages[index];

            let analyzed = match tail.take() {
                Some(current) => analyze(previous_path).map(|previous| (previous, current)),
                None => analyze(current_path)
                    .and_then(|current| analyze(previous_path).map(|previous| (previous, current))),
            };
            let compared = analyzed.and_then(|(previous, current)| {
                compare(&previous, &current).map(|metrics| (previous, metrics))
            });
            let (previous, metrics) = match compared {
                Ok(pair) => pair,
                Err(error) => {
                    warn!(
                        previous = %display_name(previous_path),
                        current = %display_name(current_path),
                        error = %error,
                        "Comparison failed, stopping dedupe"
                    );
                    events.send(Event::Tail(TailEvent::ComparisonFailed {
                        previous: previous_path.clone(),
                        current: current_path.clone(),
                        message: error.to_string(),
                    }));
                    break TailStop::ComparisonFailed {
                        path: error_path(&error).unwrap_or_else(|| current_path.clone()),
                        message: error.to_string(),
                    };
                }
            };

            let verdict = config.policy.evaluate(&metrics);
            info!(
                previous = %display_name(previous_path),
                current = %display_name(current_path),
                distance = metrics.hamming_distance,
                mean_diff = metrics.mean_diff,
                size_delta_kb = metrics.size_delta_kb,
                size_ratio = ?metrics.size_ratio,
                duplicate = verdict.is_duplicate,
                "Tail check"
            );
            events.send(Event::Tail(TailEvent::PairChecked {
                previous: previous_path.clone(),
                current: current_path.clone(),
                metrics,
                verdict,
            }));

            if !verdict.is_duplicate {
                break TailStop::NonDuplicate;
            }

            removals.push(current_path.clone());
            index -= 1;
            tail = Some(previous);

            if let Some(max_remove) = config.max_remove {
                if removals.len() >= max_remove {
                    info!(max_remove, "Reached max_remove, stopping dedupe");
                    events.send(Event::Tail(TailEvent::LimitReached { max_remove }));
                    break TailStop::LimitReached;
                }
            }
        };

        Ok(Self {
            pages,
            removals,
            stop,
        })
    }

    /// Marked pages, newest first
    pub fn removals(&self) -> &[PathBuf] {
        &self.removals
    }

    pub fn pages(&self) -> &[PathBuf] {
        &self.pages
    }

    pub fn stop(&self) -> &TailStop {
        &self.stop
    }

    /// Delete the marked pages (unless `dry_run`) and record the run in the
    /// sidecar of `dir`
    pub fn commit(self, dir: &Path, config: &TailConfig, events: &EventSender) -> TailReport {
        let pages_before = self.pages.len();

        if self.removals.is_empty() {
            info!("No trailing duplicates detected");
        }

        if config.dry_run || self.removals.is_empty() {
            if config.dry_run && !self.removals.is_empty() {
                info!(marked = self.removals.len(), "Dry run enabled; no files were removed");
            }
            return TailReport {
                pages_before,
                marked: self.removals,
                removed: Vec::new(),
                failures: Vec::new(),
                stop: self.stop,
                dry_run: config.dry_run,
                remaining: pages_before,
                history: None,
            };
        }

        let mut removed = Vec::new();
        let mut failures = Vec::new();
        for path in &self.removals {
            match fs::remove_file(path) {
                Ok(()) => {
                    info!(path = %path.display(), "Removed");
                    events.send(Event::Tail(TailEvent::FileRemoved { path: path.clone() }));
                    removed.push(path.clone());
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove");
                    events.send(Event::Tail(TailEvent::RemovalFailed {
                        path: path.clone(),
                        message: e.to_string(),
                    }));
                    failures.push(RemovalFailure {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let remaining = match list_pages(dir) {
            Ok(pages) => pages.len(),
            Err(e) => {
                warn!(error = %e, "Failed to relist pages after removal");
                pages_before - removed.len()
            }
        };
        let history = record_history(dir, &removed, config, remaining);

        TailReport {
            pages_before,
            marked: self.removals,
            removed,
            failures,
            stop: self.stop,
            dry_run: false,
            remaining,
            history,
        }
    }
}

/// Outcome of a tail deduplication run
#[derive(Debug, Clone, Serialize)]
pub struct TailReport {
    /// Pages in the sequence before the run
    pub pages_before: usize,
    /// Pages judged trailing duplicates, newest first
    pub marked: Vec<PathBuf>,
    /// Pages actually deleted (empty on a dry run)
    pub removed: Vec<PathBuf>,
    pub failures: Vec<RemovalFailure>,
    pub stop: TailStop,
    pub dry_run: bool,
    /// Pages left on disk
    pub remaining: usize,
    /// The sidecar history entry written by this run
    pub history: Option<TailHistoryEntry>,
}

/// List, plan and commit in one go
pub fn dedupe_tail(
    dir: &Path,
    config: &TailConfig,
    comparator: &Comparator,
    events: &EventSender,
) -> Result<TailReport, PageDedupError> {
    config.validate()?;
    let pages = list_pages(dir)?;

    info!(
        dir = %dir.display(),
        pages = pages.len(),
        min_pages = config.min_pages,
        max_remove = ?config.max_remove,
        dry_run = config.dry_run,
        "Tail dedupe started"
    );
    events.send(Event::Tail(TailEvent::Started {
        total_pages: pages.len(),
        dry_run: config.dry_run,
    }));

    let run = TailRun::plan(pages, config, comparator, events)?;
    let report = run.commit(dir, config, events);

    events.send(Event::Tail(TailEvent::Completed {
        removed: if report.dry_run {
            report.marked.len()
        } else {
            report.removed.len()
        },
        dry_run: report.dry_run,
    }));
    Ok(report)
}

fn record_history(
    dir: &Path,
    removed: &[PathBuf],
    config: &TailConfig,
    remaining: usize,
) -> Option<TailHistoryEntry> {
    if removed.is_empty() {
        return None;
    }

    let mut metadata = match sidecar::load(dir) {
        Ok(Some(metadata)) => metadata,
        Ok(None) => {
            info!("metadata.json not found; skipping update");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "Failed to read metadata.json");
            return None;
        }
    };

    let names: Vec<String> = removed.iter().map(|path| display_name(path)).collect();
    let entry = metadata.record_tail_run(&names, config.policy, config.min_pages, remaining);

    if let Err(e) = sidecar::save(dir, &metadata) {
        warn!(error = %e, "Failed to update metadata.json");
        return None;
    }
    Some(entry)
}

fn error_path(error: &ComparisonError) -> Option<PathBuf> {
    match error {
        ComparisonError::DecodeError { path, .. }
        | ComparisonError::EmptyImage { path }
        | ComparisonError::IoError { path, .. } => Some(path.clone()),
        _ => None,
    }
}
