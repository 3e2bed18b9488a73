//! Capture stream state and its transition function.
//!
//! ```text
//!            PageClassified (streak below limit)
//!              ┌──────────┐
//!              ▼          │
//!          Capturing ─────┘
//!           │     ▲
//! streak >= │     │ ConfirmClassified (new page)
//!   limit   ▼     │
//!       RecoveryPending ──── ConfirmClassified (duplicate) ──▶ Stopped
//!              │                                              ▲
//!              └──────── RecoveryFailed / Abort ──────────────┘
//! ```
//!
//! `apply` is the only code that mutates the state; the guard performs the
//! I/O that each returned [`GuardAction`] asks for.

use crate::core::hasher::PageSignature;
use crate::error::GuardError;

/// Guard phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Capturing and classifying pages
    Capturing,
    /// The streak crossed the limit; waiting for the confirmation page
    RecoveryPending,
    /// Terminal
    Stopped,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Capturing => write!(f, "capturing"),
            Phase::RecoveryPending => write!(f, "recovery pending"),
            Phase::Stopped => write!(f, "stopped"),
        }
    }
}

/// Gates for triggering a recovery probe; both must hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakLimits {
    /// Consecutive duplicates that trigger a probe
    pub duplicate_limit: u32,
    /// No probe before this page index
    pub min_pages: u32,
}

/// Inputs to the transition function
#[derive(Debug)]
pub enum GuardEvent {
    /// The current page was compared against the last kept page
    /// (`duplicate` is false for the very first page)
    PageClassified {
        signature: PageSignature,
        duplicate: bool,
    },
    /// The recovery confirmation page was compared against the flagged page
    ConfirmClassified {
        signature: PageSignature,
        duplicate: bool,
    },
    /// The recovery page turn or confirmation capture failed
    RecoveryFailed,
    /// A capture or comparison failed; nothing in flight can be trusted
    Abort,
    /// The capture loop stopped for an external reason
    Halt,
}

impl GuardEvent {
    fn name(&self) -> &'static str {
        match self {
            GuardEvent::PageClassified { .. } => "page classified",
            GuardEvent::ConfirmClassified { .. } => "confirm classified",
            GuardEvent::RecoveryFailed => "recovery failed",
            GuardEvent::Abort => "abort",
            GuardEvent::Halt => "halt",
        }
    }
}

/// What the guard must do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardAction {
    /// Keep the page; it is the new comparison anchor
    KeepAsAnchor,
    /// Keep the page; the anchor stays where it was
    KeepDuplicate,
    /// Turn once more and capture a confirmation page
    Probe,
    /// False positive: keep flagged and confirmation pages
    CommitPair,
    /// End of content: delete flagged and confirmation pages
    DiscardPair,
    /// Delete whatever artifacts are in flight
    DiscardInFlight,
    /// Nothing to clean up
    Finish,
}

/// Single-owner state threaded through every capture step
#[derive(Debug)]
pub struct CaptureStreamState {
    last_kept: Option<PageSignature>,
    flagged: Option<PageSignature>,
    consecutive_duplicates: u32,
    page_index: u32,
    phase: Phase,
}

impl Default for CaptureStreamState {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureStreamState {
    /// Fresh state: capturing page 1, no anchor
    pub fn new() -> Self {
        Self {
            last_kept: None,
            flagged: None,
            consecutive_duplicates: 0,
            page_index: 1,
            phase: Phase::Capturing,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Index of the page being (or about to be) captured
    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn consecutive_duplicates(&self) -> u32 {
        self.consecutive_duplicates
    }

    /// The page new captures are compared against
    pub fn last_kept(&self) -> Option<&PageSignature> {
        self.last_kept.as_ref()
    }

    /// The duplicate that triggered the pending recovery probe
    pub fn flagged(&self) -> Option<&PageSignature> {
        self.flagged.as_ref()
    }

    /// Apply one event and report the action it requires
    pub fn apply(
        &mut self,
        event: GuardEvent,
        limits: &StreakLimits,
    ) -> Result<GuardAction, GuardError> {
        match (self.phase, event) {
            (Phase::Stopped, _) => Err(GuardError::Stopped),

            (Phase::Capturing, GuardEvent::PageClassified { signature, duplicate }) => {
                if duplicate {
                    self.consecutive_duplicates += 1;
                } else {
                    self.consecutive_duplicates = 0;
                }

                if self.page_index >= limits.min_pages
                    && self.consecutive_duplicates >= limits.duplicate_limit
                {
                    self.phase = Phase::RecoveryPending;
                    self.flagged = Some(signature);
                    return Ok(GuardAction::Probe);
                }

                self.page_index += 1;
                if duplicate {
                    Ok(GuardAction::KeepDuplicate)
                } else {
                    self.last_kept = Some(signature);
                    Ok(GuardAction::KeepAsAnchor)
                }
            }

            (Phase::RecoveryPending, GuardEvent::ConfirmClassified { signature, duplicate }) => {
                self.flagged = None;
                if duplicate {
                    self.phase = Phase::Stopped;
                    Ok(GuardAction::DiscardPair)
                } else {
                    // Streak restarts from zero, so a later stall gets a fresh limit
                    self.consecutive_duplicates = 0;
                    self.page_index += 2;
                    self.last_kept = Some(signature);
                    self.phase = Phase::Capturing;
                    Ok(GuardAction::CommitPair)
                }
            }

            (Phase::RecoveryPending, GuardEvent::RecoveryFailed | GuardEvent::Abort) => {
                self.flagged = None;
                self.phase = Phase::Stopped;
                Ok(GuardAction::DiscardInFlight)
            }

            (Phase::Capturing, GuardEvent::Abort) => {
                self.phase = Phase::Stopped;
                Ok(GuardAction::DiscardInFlight)
            }

            (Phase::Capturing, GuardEvent::Halt) => {
                self.phase = Phase::Stopped;
                Ok(GuardAction::Finish)
            }

            (phase, event) => Err(GuardError::InvalidTransition {
                phase: phase.to_string(),
                event: event.name().to_string(),
            }),
        }
    }
}
