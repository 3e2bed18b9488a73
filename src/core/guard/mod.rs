//! # Guard Module
//!
//! Live duplicate guard for a page capture stream.
//!
//! Each [`CaptureGuard::step`] captures one page, compares it with the last
//! kept page, and feeds the result to the [`CaptureStreamState`] transition
//! function. When the duplicate streak crosses `duplicate_limit` (and at least
//! `min_pages` pages exist) the guard probes once: it turns the page, captures
//! a confirmation frame and compares it with the flagged page.
//!
//! | Confirmation | Result |
//! |--------------|--------|
//! | differs from flagged page | both pages kept, capture continues |
//! | still a duplicate | both pages deleted, guard stops (end of content) |
//! | turn or capture fails | both artifacts deleted, guard stops with an error |

mod actuator;
mod state;

pub use actuator::PageActuator;
pub use state::{CaptureStreamState, GuardAction, GuardEvent, Phase, StreakLimits};

use crate::core::comparator::{compare, Comparator, ComparisonMetrics};
use crate::core::hasher::{Fingerprint, PerceptualHash};
use crate::core::pages::{display_name, page_path};
use crate::core::policy::{PolicyConfig, Verdict};
use crate::core::sidecar::{round_kb, round_ratio, PageEntry};
use crate::error::{ActuatorError, ComparisonError, ConfigError, GuardError, RecoveryError};
use crate::events::{CaptureEvent, Event, EventSender, PageDecision};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default consecutive-duplicate count that triggers a recovery probe
pub const DEFAULT_DUPLICATE_LIMIT: u32 = 5;

/// Default minimum page index before a probe may happen
pub const DEFAULT_MIN_PAGES: u32 = 2;

/// Guard configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Duplicate decision thresholds
    pub policy: PolicyConfig,
    /// Consecutive duplicates before probing for end of content
    pub duplicate_limit: u32,
    /// Never probe before this page index
    pub min_pages: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::default(),
            duplicate_limit: DEFAULT_DUPLICATE_LIMIT,
            min_pages: DEFAULT_MIN_PAGES,
        }
    }
}

impl GuardConfig {
    /// Reject out-of-range settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.policy.validate()?;
        if self.duplicate_limit == 0 {
            return Err(ConfigError::out_of_range(
                "duplicate_limit",
                self.duplicate_limit,
                "greater than 0",
            ));
        }
        if self.min_pages == 0 {
            return Err(ConfigError::out_of_range(
                "min_pages",
                self.min_pages,
                "greater than 0",
            ));
        }
        Ok(())
    }

    fn limits(&self) -> StreakLimits {
        StreakLimits {
            duplicate_limit: self.duplicate_limit,
            min_pages: self.min_pages,
        }
    }
}

/// A page the guard has committed to disk
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub page: u32,
    pub file: PathBuf,
    pub fingerprint: Fingerprint,
    /// Metrics against the page it was compared with (None for page 1)
    pub metrics: Option<ComparisonMetrics>,
    pub verdict: Option<Verdict>,
    pub captured_at: NaiveDateTime,
}

impl PageRecord {
    /// Sidecar entry for this page
    pub fn to_entry(&self) -> PageEntry {
        PageEntry {
            page: self.page,
            file: Some(display_name(&self.file)),
            timestamp: Some(self.captured_at),
            hash: self.fingerprint.hash.to_hex(),
            hash_distance: self.metrics.map(|m| m.hamming_distance),
            mean_diff: self.metrics.map(|m| m.mean_diff),
            size_kb: round_kb(self.fingerprint.size_kb),
            size_delta_kb: self.metrics.map(|m| round_kb(m.size_delta_kb)),
            size_delta_ratio: self.metrics.and_then(|m| m.size_ratio).map(round_ratio),
            extra: Default::default(),
        }
    }

    fn is_duplicate(&self) -> bool {
        self.verdict.is_some_and(|v| v.is_duplicate)
    }
}

/// Result of one guard step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// One page captured and kept
    Captured(PageRecord),
    /// A recovery probe found a new page; both pages are kept
    Recovered {
        flagged: PageRecord,
        confirm: PageRecord,
    },
    /// The probe confirmed the end of content; both pages were deleted
    EndOfContent { discarded: Vec<PathBuf> },
}

impl StepOutcome {
    /// Pages this step committed, in order
    pub fn committed(&self) -> Vec<&PageRecord> {
        match self {
            StepOutcome::Captured(record) => vec![record],
            StepOutcome::Recovered { flagged, confirm } => vec![flagged, confirm],
            StepOutcome::EndOfContent { .. } => Vec::new(),
        }
    }
}

/// Live capture duplicate guard
pub struct CaptureGuard {
    config: GuardConfig,
    comparator: Comparator,
    output_dir: PathBuf,
    state: CaptureStreamState,
    events: EventSender,
}

impl CaptureGuard {
    /// Create a guard writing pages into `output_dir`
    pub fn new(
        config: GuardConfig,
        comparator: Comparator,
        output_dir: impl Into<PathBuf>,
        events: EventSender,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            comparator,
            output_dir: output_dir.into(),
            state: CaptureStreamState::new(),
            events,
        })
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Current stream state
    pub fn state(&self) -> &CaptureStreamState {
        &self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.state.phase() == Phase::Stopped
    }

    /// Stop the guard for a reason outside its control. No-op once stopped.
    pub fn halt(&mut self) {
        if self.state.phase() == Phase::Capturing {
            // Halt is always valid while capturing
            let _ = self.state.apply(GuardEvent::Halt, &self.config.limits());
        }
    }

    /// Capture and classify the page at the current index.
    ///
    /// The caller turns the page between steps.
    pub fn step<A: PageActuator + ?Sized>(
        &mut self,
        actuator: &mut A,
    ) -> Result<StepOutcome, GuardError> {
        if self.is_stopped() {
            return Err(GuardError::Stopped);
        }

        let page = self.state.page_index();
        let path = page_path(&self.output_dir, page);

        if let Err(source) = capture_to(actuator, &path) {
            warn!(page, error = %source, "Page capture failed");
            self.abort(&[&path]);
            return Err(GuardError::Capture { path, source });
        }

        let signature = match self.comparator.analyze(&path) {
            Ok(signature) => signature,
            Err(error) => return Err(self.comparison_failed(page, error, &[&path])),
        };

        let compared = self
            .state
            .last_kept()
            .map(|anchor| compare(anchor, &signature));
        let comparison = match compared {
            Some(Ok(metrics)) => Some((metrics, self.config.policy.evaluate(&metrics))),
            Some(Err(error)) => return Err(self.comparison_failed(page, error, &[&path])),
            None => None,
        };

        let record = PageRecord {
            page,
            file: path.clone(),
            fingerprint: signature.fingerprint.clone(),
            metrics: comparison.map(|(metrics, _)| metrics),
            verdict: comparison.map(|(_, verdict)| verdict),
            captured_at: chrono::Local::now().naive_local(),
        };
        let duplicate = record.is_duplicate();

        let action = self.state.apply(
            GuardEvent::PageClassified {
                signature,
                duplicate,
            },
            &self.config.limits(),
        )?;
        let streak = self.state.consecutive_duplicates();

        match &record.metrics {
            Some(metrics) => info!(
                page,
                distance = metrics.hamming_distance,
                mean_diff = metrics.mean_diff,
                size_delta_kb = metrics.size_delta_kb,
                size_ratio = ?metrics.size_ratio,
                duplicate,
                streak,
                "Page captured"
            ),
            None => info!(page, "First page captured"),
        }
        self.events.send(Event::Capture(CaptureEvent::PageCaptured(
            PageDecision {
                page,
                file: path,
                hash: record.fingerprint.hash.to_hex(),
                size_kb: record.fingerprint.size_kb,
                metrics: record.metrics,
                verdict: record.verdict,
                streak,
            },
        )));

        match action {
            GuardAction::Probe => self.recover(actuator, record),
            _ => Ok(StepOutcome::Captured(record)),
        }
    }

    /// One-shot recovery probe for the flagged page in `flagged`
    fn recover<A: PageActuator + ?Sized>(
        &mut self,
        actuator: &mut A,
        flagged: PageRecord,
    ) -> Result<StepOutcome, GuardError> {
        let streak = self.state.consecutive_duplicates();
        let confirm_page = flagged.page + 1;
        let confirm_path = page_path(&self.output_dir, confirm_page);

        info!(
            page = flagged.page,
            streak,
            limit = self.config.duplicate_limit,
            "Duplicate streak reached limit, probing next page"
        );
        self.events.send(Event::Capture(CaptureEvent::RecoveryStarted {
            page: flagged.page,
            streak,
        }));

        if let Err(source) = actuator.turn_page() {
            return Err(self.recovery_failed(
                flagged.page,
                RecoveryError::TurnPage { source },
                &[&flagged.file, &confirm_path],
            ));
        }
        if let Err(source) = capture_to(actuator, &confirm_path) {
            return Err(self.recovery_failed(
                flagged.page,
                RecoveryError::ConfirmCapture {
                    path: confirm_path.clone(),
                    source,
                },
                &[&flagged.file, &confirm_path],
            ));
        }

        let signature = match self.comparator.analyze(&confirm_path) {
            Ok(signature) => signature,
            Err(error) => {
                return Err(self.comparison_failed(
                    confirm_page,
                    error,
                    &[&flagged.file, &confirm_path],
                ))
            }
        };
        let compared = match self.state.flagged() {
            Some(flagged_signature) => compare(flagged_signature, &signature),
            None => {
                return Err(GuardError::InvalidTransition {
                    phase: self.state.phase().to_string(),
                    event: "confirm classified".to_string(),
                })
            }
        };
        let metrics = match compared {
            Ok(metrics) => metrics,
            Err(error) => {
                return Err(self.comparison_failed(
                    confirm_page,
                    error,
                    &[&flagged.file, &confirm_path],
                ))
            }
        };
        let verdict = self.config.policy.evaluate(&metrics);

        let confirm = PageRecord {
            page: confirm_page,
            file: confirm_path.clone(),
            fingerprint: signature.fingerprint.clone(),
            metrics: Some(metrics),
            verdict: Some(verdict),
            captured_at: chrono::Local::now().naive_local(),
        };

        let action = self.state.apply(
            GuardEvent::ConfirmClassified {
                signature,
                duplicate: verdict.is_duplicate,
            },
            &self.config.limits(),
        )?;

        match action {
            GuardAction::CommitPair => {
                info!(
                    flagged = flagged.page,
                    confirm = confirm_page,
                    distance = metrics.hamming_distance,
                    mean_diff = metrics.mean_diff,
                    "Recovery found a new page, continuing"
                );
                self.events.send(Event::Capture(CaptureEvent::RecoveryAdvanced {
                    flagged_page: flagged.page,
                    confirm_page,
                    metrics,
                    verdict,
                }));
                Ok(StepOutcome::Recovered { flagged, confirm })
            }
            _ => {
                let discarded = discard(&[&flagged.file, &confirm_path]);
                info!(
                    flagged = flagged.page,
                    confirm = confirm_page,
                    distance = metrics.hamming_distance,
                    mean_diff = metrics.mean_diff,
                    "Recovery page is still a duplicate, end of content"
                );
                self.events.send(Event::Capture(CaptureEvent::EndOfContent {
                    flagged_page: flagged.page,
                    confirm_page,
                    metrics,
                    verdict,
                    discarded: discarded.clone(),
                }));
                Ok(StepOutcome::EndOfContent { discarded })
            }
        }
    }

    fn abort(&mut self, in_flight: &[&Path]) {
        // Abort is valid in every phase except Stopped
        let _ = self.state.apply(GuardEvent::Abort, &self.config.limits());
        discard(in_flight);
    }

    fn comparison_failed(
        &mut self,
        page: u32,
        error: ComparisonError,
        in_flight: &[&Path],
    ) -> GuardError {
        warn!(page, error = %error, "Page could not be compared, stopping");
        self.events.send(Event::Capture(CaptureEvent::ComparisonFailed {
            page,
            message: error.to_string(),
        }));
        self.abort(in_flight);
        error.into()
    }

    fn recovery_failed(
        &mut self,
        page: u32,
        error: RecoveryError,
        in_flight: &[&Path],
    ) -> GuardError {
        warn!(page, error = %error, "Recovery probe failed, stopping");
        self.events.send(Event::Capture(CaptureEvent::RecoveryFailed {
            page,
            message: error.to_string(),
        }));
        let _ = self
            .state
            .apply(GuardEvent::RecoveryFailed, &self.config.limits());
        discard(in_flight);
        error.into()
    }
}

fn capture_to<A: PageActuator + ?Sized>(
    actuator: &mut A,
    path: &Path,
) -> Result<(), ActuatorError> {
    actuator.capture_frame(path)?;
    if !path.is_file() {
        return Err(ActuatorError::MissingFrame {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Delete whichever of `paths` exist; returns the ones removed
fn discard(paths: &[&Path]) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    for path in paths {
        if !path.exists() {
            continue;
        }
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "Discarded page artifact");
                removed.push(path.to_path_buf());
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to discard page artifact"),
        }
    }
    removed
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedActuator;
    use super::*;
    use crate::events::{EventChannel, EventReceiver};
    use tempfile::TempDir;

    fn guard(dir: &TempDir, duplicate_limit: u32, min_pages: u32) -> (CaptureGuard, EventReceiver) {
        let (sender, receiver) = EventChannel::new();
        let config = GuardConfig {
            duplicate_limit,
            min_pages,
            ..GuardConfig::default()
        };
        let guard = CaptureGuard::new(config, Comparator::default(), dir.path(), sender).unwrap();
        (guard, receiver)
    }

    /// Step, then turn the page the way the capture loop does
    fn step_and_turn(
        guard: &mut CaptureGuard,
        actuator: &mut ScriptedActuator,
    ) -> Result<StepOutcome, GuardError> {
        let outcome = guard.step(actuator)?;
        actuator.turn_page().unwrap();
        Ok(outcome)
    }

    fn page_exists(dir: &TempDir, page: u32) -> bool {
        page_path(dir.path(), page).exists()
    }

    #[test]
    fn first_page_has_no_comparison() {
        let dir = TempDir::new().unwrap();
        let (mut guard, receiver) = guard(&dir, 5, 2);
        let mut actuator = ScriptedActuator::new(&[1, 2]);

        let outcome = guard.step(&mut actuator).unwrap();

        match outcome {
            StepOutcome::Captured(record) => {
                assert_eq!(record.page, 1);
                assert!(record.metrics.is_none());
                assert!(record.verdict.is_none());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(page_exists(&dir, 1));
        assert_eq!(guard.state().page_index(), 2);

        let events = receiver.drain();
        assert!(matches!(
            events.as_slice(),
            [Event::Capture(CaptureEvent::PageCaptured(decision))] if !decision.is_duplicate()
        ));
    }

    #[test]
    fn distinct_pages_are_not_duplicates() {
        let dir = TempDir::new().unwrap();
        let (mut guard, _receiver) = guard(&dir, 5, 2);
        let mut actuator = ScriptedActuator::new(&[1, 2, 3]);

        for _ in 0..3 {
            let outcome = step_and_turn(&mut guard, &mut actuator).unwrap();
            if let StepOutcome::Captured(record) = outcome {
                assert!(!record.is_duplicate());
            }
        }
        assert_eq!(guard.state().consecutive_duplicates(), 0);
        assert_eq!(guard.state().page_index(), 4);
    }

    #[test]
    fn repeated_screen_builds_a_streak() {
        let dir = TempDir::new().unwrap();
        let (mut guard, receiver) = guard(&dir, 5, 2);
        let mut actuator = ScriptedActuator::new(&[1, 2, 2, 2]);

        for _ in 0..4 {
            step_and_turn(&mut guard, &mut actuator).unwrap();
        }

        assert_eq!(guard.state().consecutive_duplicates(), 2);
        let streaks: Vec<u32> = receiver
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                Event::Capture(CaptureEvent::PageCaptured(decision)) => Some(decision.streak),
                _ => None,
            })
            .collect();
        assert_eq!(streaks, vec![0, 0, 1, 2]);
    }

    #[test]
    fn recovery_keeps_both_pages_when_content_continues() {
        let dir = TempDir::new().unwrap();
        let (mut guard, receiver) = guard(&dir, 2, 2);
        // Page 4 repeats twice, page 5 shows new content
        let mut actuator = ScriptedActuator::new(&[1, 2, 2, 2, 3, 4]);

        for _ in 0..3 {
            step_and_turn(&mut guard, &mut actuator).unwrap();
        }
        let outcome = guard.step(&mut actuator).unwrap();

        match outcome {
            StepOutcome::Recovered { flagged, confirm } => {
                assert_eq!(flagged.page, 4);
                assert_eq!(confirm.page, 5);
                assert!(flagged.is_duplicate());
                assert!(!confirm.is_duplicate());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(page_exists(&dir, 4));
        assert!(page_exists(&dir, 5));
        assert_eq!(guard.state().phase(), Phase::Capturing);
        assert_eq!(guard.state().consecutive_duplicates(), 0);
        assert_eq!(guard.state().page_index(), 6);
        assert!(receiver
            .drain()
            .iter()
            .any(|e| matches!(e, Event::Capture(CaptureEvent::RecoveryAdvanced { flagged_page: 4, confirm_page: 5, .. }))));

        // The confirm page is the new anchor
        actuator.turn_page().unwrap();
        match guard.step(&mut actuator).unwrap() {
            StepOutcome::Captured(record) => assert!(!record.is_duplicate()),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn confirmed_duplicate_discards_pair_and_stops() {
        let dir = TempDir::new().unwrap();
        let (mut guard, receiver) = guard(&dir, 2, 2);
        let mut actuator = ScriptedActuator::new(&[1, 2, 2, 2, 2]);

        for _ in 0..3 {
            step_and_turn(&mut guard, &mut actuator).unwrap();
        }
        let outcome = guard.step(&mut actuator).unwrap();

        match outcome {
            StepOutcome::EndOfContent { discarded } => {
                assert_eq!(
                    discarded,
                    vec![page_path(dir.path(), 4), page_path(dir.path(), 5)]
                );
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(page_exists(&dir, 3));
        assert!(!page_exists(&dir, 4));
        assert!(!page_exists(&dir, 5));
        assert!(guard.is_stopped());
        assert!(matches!(guard.step(&mut actuator), Err(GuardError::Stopped)));
        assert!(receiver
            .drain()
            .iter()
            .any(|e| matches!(e, Event::Capture(CaptureEvent::EndOfContent { .. }))));
    }

    #[test]
    fn min_pages_delays_the_probe() {
        let dir = TempDir::new().unwrap();
        let (mut guard, _receiver) = guard(&dir, 1, 4);
        let mut actuator = ScriptedActuator::new(&[1, 1, 1, 1, 1]);

        // Pages 2 and 3 are duplicates but below min_pages
        for _ in 0..3 {
            let outcome = step_and_turn(&mut guard, &mut actuator).unwrap();
            assert!(matches!(outcome, StepOutcome::Captured(_)));
        }
        let outcome = guard.step(&mut actuator).unwrap();
        assert!(matches!(outcome, StepOutcome::EndOfContent { .. }));
    }

    #[test]
    fn failed_recovery_turn_is_an_error_not_end_of_content() {
        let dir = TempDir::new().unwrap();
        let (mut guard, receiver) = guard(&dir, 2, 2);
        let mut actuator = ScriptedActuator::new(&[1, 2, 2, 2, 3]);
        // Turns 1-3 are the loop's, turn 4 is the probe
        actuator.fail_turn = Some(4);

        for _ in 0..3 {
            step_and_turn(&mut guard, &mut actuator).unwrap();
        }
        let result = guard.step(&mut actuator);

        assert!(matches!(
            result,
            Err(GuardError::Recovery(RecoveryError::TurnPage { .. }))
        ));
        assert!(!page_exists(&dir, 4));
        assert!(!page_exists(&dir, 5));
        assert!(page_exists(&dir, 3));
        assert!(guard.is_stopped());
        assert!(receiver
            .drain()
            .iter()
            .any(|e| matches!(e, Event::Capture(CaptureEvent::RecoveryFailed { page: 4, .. }))));
    }

    #[test]
    fn failed_confirm_capture_discards_both_pages() {
        let dir = TempDir::new().unwrap();
        let (mut guard, receiver) = guard(&dir, 2, 2);
        let mut actuator = ScriptedActuator::new(&[1, 2, 2, 2, 3]);
        // Captures 1-4 are pages 1-4, capture 5 is the confirm frame
        actuator.fail_capture = Some(5);

        for _ in 0..3 {
            step_and_turn(&mut guard, &mut actuator).unwrap();
        }
        let result = guard.step(&mut actuator);

        match result {
            Err(GuardError::Recovery(RecoveryError::ConfirmCapture { path, .. })) => {
                assert!(path.ends_with("page_0005.png"));
            }
            other => panic!("expected confirm capture failure, got {:?}", other),
        }
        assert_eq!(actuator.turns, 4);
        assert!(!page_exists(&dir, 4));
        assert!(!page_exists(&dir, 5));
        assert!(page_exists(&dir, 3));
        assert!(guard.is_stopped());
        assert!(matches!(guard.step(&mut actuator), Err(GuardError::Stopped)));
        assert!(receiver
            .drain()
            .iter()
            .any(|e| matches!(e, Event::Capture(CaptureEvent::RecoveryFailed { page: 4, .. }))));
    }

    #[test]
    fn undecodable_capture_stops_the_guard() {
        struct Garbage;
        impl PageActuator for Garbage {
            fn turn_page(&mut self) -> Result<(), ActuatorError> {
                Ok(())
            }
            fn capture_frame(&mut self, destination: &Path) -> Result<(), ActuatorError> {
                std::fs::write(destination, b"not a png").unwrap();
                Ok(())
            }
        }

        let dir = TempDir::new().unwrap();
        let (mut guard, _receiver) = guard(&dir, 5, 2);

        let result = guard.step(&mut Garbage);

        assert!(matches!(result, Err(GuardError::Comparison(_))));
        assert!(!page_exists(&dir, 1));
        assert!(guard.is_stopped());
    }

    #[test]
    fn capture_without_file_is_reported() {
        struct Blind;
        impl PageActuator for Blind {
            fn turn_page(&mut self) -> Result<(), ActuatorError> {
                Ok(())
            }
            fn capture_frame(&mut self, _destination: &Path) -> Result<(), ActuatorError> {
                Ok(())
            }
        }

        let dir = TempDir::new().unwrap();
        let (mut guard, _receiver) = guard(&dir, 5, 2);

        assert!(matches!(
            guard.step(&mut Blind),
            Err(GuardError::Capture {
                source: ActuatorError::MissingFrame { .. },
                ..
            })
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = GuardConfig {
            duplicate_limit: 0,
            ..GuardConfig::default()
        };
        let result = CaptureGuard::new(
            config,
            Comparator::default(),
            dir.path(),
            crate::events::null_sender(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn record_converts_to_rounded_entry() {
        let record = PageRecord {
            page: 7,
            file: PathBuf::from("/captures/page_0007.png"),
            fingerprint: Fingerprint {
                hash: crate::core::hasher::DHash::from_bytes(vec![0xAB; 8]),
                size_kb: 12.34567,
                source: PathBuf::from("/captures/page_0007.png"),
            },
            metrics: Some(ComparisonMetrics {
                hamming_distance: 2,
                mean_diff: 1.5,
                size_delta_kb: 0.126,
                size_ratio: Some(0.010_203_04),
            }),
            verdict: None,
            captured_at: chrono::Local::now().naive_local(),
        };

        let entry = record.to_entry();

        assert_eq!(entry.file.as_deref(), Some("page_0007.png"));
        assert_eq!(entry.hash, "abababababababab");
        assert_eq!(entry.size_kb, 12.35);
        assert_eq!(entry.size_delta_kb, Some(0.13));
        assert_eq!(entry.size_delta_ratio, Some(0.010203));
        assert_eq!(entry.hash_distance, Some(2));
    }
}
