//! # Session Module
//!
//! The capture loop around a [`CaptureGuard`].
//!
//! The guard decides whether a page is a duplicate and when content has run
//! out. The session owns everything else: the page turn between steps, the
//! external stop conditions and the sidecar written when the run ends.
//!
//! ## Stop conditions
//! | Reason | Trigger |
//! |--------|---------|
//! | `EndOfContent` | the guard's recovery probe confirmed a duplicate |
//! | `MaxPages` | `max_pages` pages committed (a recovery may commit one extra) |
//! | `NoNextPage` | the actuator reports no further page |
//! | `SessionExpired` | liveness check failed (every `session_check_interval` pages) |
//! | `Cancelled` | the cancel flag was set; checked between steps only |

mod command;

pub use command::{CommandActuator, CommandActuatorConfig};

use crate::core::comparator::Comparator;
use crate::core::guard::{CaptureGuard, GuardConfig, PageActuator, PageRecord, StepOutcome};
use crate::core::sidecar::{self, CaptureMetadata};
use crate::error::{ConfigError, PageDedupError};
use crate::events::{CaptureEvent, Event, EventSender};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Default number of pages between liveness checks
pub const DEFAULT_SESSION_CHECK_INTERVAL: u32 = 50;

/// Why a capture session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxPages,
    NoNextPage,
    SessionExpired,
    EndOfContent,
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::MaxPages => "max_pages",
            StopReason::NoNextPage => "no_next_page",
            StopReason::SessionExpired => "session_expired",
            StopReason::EndOfContent => "end_of_content",
            StopReason::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capture session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub guard: GuardConfig,
    /// Stop after this many committed pages
    pub max_pages: Option<u32>,
    /// Pages between liveness checks
    pub session_check_interval: u32,
    /// Pause before the first capture
    pub initial_wait: Duration,
    /// Label recorded in the sidecar
    pub book: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            guard: GuardConfig::default(),
            max_pages: None,
            session_check_interval: DEFAULT_SESSION_CHECK_INTERVAL,
            initial_wait: Duration::ZERO,
            book: None,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.guard.validate()?;
        if self.max_pages == Some(0) {
            return Err(ConfigError::out_of_range("max_pages", 0, "greater than 0"));
        }
        if self.session_check_interval == 0 {
            return Err(ConfigError::out_of_range(
                "session_check_interval",
                0,
                "greater than 0",
            ));
        }
        Ok(())
    }
}

/// What a finished session produced
#[derive(Debug, Clone)]
pub struct CaptureSummary {
    pub session_id: String,
    pub output_dir: PathBuf,
    /// Committed pages in capture order
    pub pages: Vec<PageRecord>,
    pub stop_reason: StopReason,
}

/// One capture run into one output directory
pub struct CaptureSession {
    config: SessionConfig,
    guard: CaptureGuard,
    session_id: String,
    cancelled: Arc<AtomicBool>,
    events: EventSender,
}

impl CaptureSession {
    /// Validate settings and create the output directory
    pub fn new(
        config: SessionConfig,
        comparator: Comparator,
        output_dir: impl Into<PathBuf>,
        events: EventSender,
    ) -> Result<Self, PageDedupError> {
        config.validate()?;
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|source| PageDedupError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let guard = CaptureGuard::new(config.guard, comparator, &output_dir, events.clone())?;

        Ok(Self {
            config,
            guard,
            session_id: Uuid::new_v4().to_string(),
            cancelled: Arc::new(AtomicBool::new(false)),
            events,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn output_dir(&self) -> &Path {
        self.guard.output_dir()
    }

    /// Flag that stops the session before its next step
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Capture until a stop condition holds.
    ///
    /// The sidecar is written for the committed pages however the run ends,
    /// including on error.
    pub fn run<A: PageActuator + ?Sized>(
        mut self,
        actuator: &mut A,
    ) -> Result<CaptureSummary, PageDedupError> {
        info!(
            session_id = %self.session_id,
            output_dir = %self.output_dir().display(),
            duplicate_limit = self.config.guard.duplicate_limit,
            min_pages = self.config.guard.min_pages,
            max_pages = ?self.config.max_pages,
            "Capture session started"
        );
        self.events.send(Event::Capture(CaptureEvent::Started {
            session_id: self.session_id.clone(),
            output_dir: self.output_dir().to_path_buf(),
        }));

        if !self.config.initial_wait.is_zero() {
            std::thread::sleep(self.config.initial_wait);
        }

        let mut pages = Vec::new();
        let result = self.capture_loop(actuator, &mut pages);
        self.guard.halt();

        let stop_label = match &result {
            Ok(reason) => reason.as_str().to_string(),
            Err(_) => "error".to_string(),
        };
        let written = self.write_metadata(&pages, &stop_label);

        self.events.send(Event::Capture(CaptureEvent::Completed {
            total_pages: pages.len(),
            stop_reason: stop_label.clone(),
        }));

        match result {
            Ok(stop_reason) => {
                written?;
                info!(
                    session_id = %self.session_id,
                    pages = pages.len(),
                    stop_reason = %stop_reason,
                    "Capture session finished"
                );
                Ok(CaptureSummary {
                    session_id: self.session_id,
                    output_dir: self.guard.output_dir().to_path_buf(),
                    pages,
                    stop_reason,
                })
            }
            Err(error) => {
                if let Err(sidecar_error) = written {
                    warn!(error = %sidecar_error, "Failed to write metadata after capture error");
                }
                warn!(session_id = %self.session_id, pages = pages.len(), error = %error, "Capture session failed");
                Err(error)
            }
        }
    }

    fn capture_loop<A: PageActuator + ?Sized>(
        &mut self,
        actuator: &mut A,
        pages: &mut Vec<PageRecord>,
    ) -> Result<StopReason, PageDedupError> {
        let interval = self.config.session_check_interval as usize;
        let mut next_check = interval;

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                info!("Capture cancelled");
                return Ok(StopReason::Cancelled);
            }

            let outcome = self.guard.step(actuator)?;
            pages.extend(outcome.committed().into_iter().cloned());

            if let StepOutcome::EndOfContent { .. } = outcome {
                return Ok(StopReason::EndOfContent);
            }

            if let Some(max_pages) = self.config.max_pages {
                if pages.len() >= max_pages as usize {
                    info!(max_pages, "Reached max pages");
                    return Ok(StopReason::MaxPages);
                }
            }

            if !actuator.has_next_page()? {
                info!(pages = pages.len(), "No next page reported");
                return Ok(StopReason::NoNextPage);
            }

            actuator.turn_page()?;

            if pages.len() >= next_check {
                next_check = pages.len() + interval;
                if !actuator.is_session_alive()? {
                    warn!(pages = pages.len(), "Reading session expired during capture");
                    return Ok(StopReason::SessionExpired);
                }
            }
        }
    }

    fn write_metadata(&self, pages: &[PageRecord], stop_reason: &str) -> Result<(), PageDedupError> {
        let guard = self.guard.config();
        let metadata = CaptureMetadata {
            total_pages: pages.len(),
            book: self.config.book.clone(),
            session_id: Some(self.session_id.clone()),
            captured_at: Some(chrono::Local::now().naive_local()),
            stop_reason: Some(stop_reason.to_string()),
            thresholds: Some(guard.policy),
            duplicate_limit: Some(guard.duplicate_limit),
            min_pages: Some(guard.min_pages),
            pages: pages.iter().map(PageRecord::to_entry).collect(),
            ..CaptureMetadata::default()
        };
        sidecar::save(self.guard.output_dir(), &metadata)?;
        Ok(())
    }
}
