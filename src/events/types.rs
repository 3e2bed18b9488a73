//! Event type definitions for decision reporting.

use crate::core::comparator::ComparisonMetrics;
use crate::core::policy::Verdict;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the capture guard and the tail deduplicator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Live capture events
    Capture(CaptureEvent),
    /// Trailing-duplicate trimming events
    Tail(TailEvent),
}

/// Events from a live capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CaptureEvent {
    /// A capture session has started
    Started {
        session_id: String,
        output_dir: PathBuf,
    },
    /// A page was captured and classified
    PageCaptured(PageDecision),
    /// The duplicate streak crossed the limit; a recovery probe is issued
    RecoveryStarted { page: u32, streak: u32 },
    /// The confirmation page differs from the flagged page; capture continues
    RecoveryAdvanced {
        flagged_page: u32,
        confirm_page: u32,
        metrics: ComparisonMetrics,
        verdict: Verdict,
    },
    /// The confirmation page is still a duplicate; both pages were discarded
    EndOfContent {
        flagged_page: u32,
        confirm_page: u32,
        metrics: ComparisonMetrics,
        verdict: Verdict,
        discarded: Vec<PathBuf>,
    },
    /// The recovery page turn or confirmation capture failed
    RecoveryFailed { page: u32, message: String },
    /// A page could not be decoded for comparison
    ComparisonFailed { page: u32, message: String },
    /// The session has ended
    Completed { total_pages: usize, stop_reason: String },
}

/// Classification of one captured page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageDecision {
    /// 1-based page index
    pub page: u32,
    /// Page artifact on disk
    pub file: PathBuf,
    /// dHash as zero-padded hex
    pub hash: String,
    /// File size in KB
    pub size_kb: f64,
    /// Metrics against the last kept page (None for the first page)
    pub metrics: Option<ComparisonMetrics>,
    /// Policy verdict for `metrics`
    pub verdict: Option<Verdict>,
    /// Consecutive duplicates after this page
    pub streak: u32,
}

impl PageDecision {
    /// Whether this page was classified as a duplicate of the last kept page
    pub fn is_duplicate(&self) -> bool {
        self.verdict.is_some_and(|v| v.is_duplicate)
    }
}

/// Events from a tail deduplication run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TailEvent {
    /// Backward scan has started
    Started { total_pages: usize, dry_run: bool },
    /// A (predecessor, tail) pair was compared
    PairChecked {
        previous: PathBuf,
        current: PathBuf,
        metrics: ComparisonMetrics,
        verdict: Verdict,
    },
    /// A pair could not be compared; the scan stops here
    ComparisonFailed {
        previous: PathBuf,
        current: PathBuf,
        message: String,
    },
    /// Removing another page would go below `min_pages`
    FloorReached { min_pages: usize },
    /// `max_remove` pages have been marked
    LimitReached { max_remove: usize },
    /// A marked page was deleted
    FileRemoved { path: PathBuf },
    /// A marked page could not be deleted
    RemovalFailed { path: PathBuf, message: String },
    /// The run has finished
    Completed { removed: usize, dry_run: bool },
}
