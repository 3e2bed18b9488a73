//! # Core Module
//!
//! The duplicate-page decision engine.
//!
//! ## Modules
//! - `hasher` - Page fingerprints (dHash, grayscale sample, file size)
//! - `comparator` - Metrics between two fingerprints
//! - `policy` - Duplicate verdict from metrics and thresholds
//! - `guard` - Live capture guard with one-shot recovery probe
//! - `session` - Capture loop and stop conditions
//! - `tail` - Trailing-duplicate removal
//! - `pages` - Page file naming and listing
//! - `sidecar` - `metadata.json` reading and writing

pub mod comparator;
pub mod guard;
pub mod hasher;
pub mod pages;
pub mod policy;
pub mod session;
pub mod sidecar;
pub mod tail;

// Re-export commonly used types
pub use comparator::{Comparator, ComparisonMetrics};
pub use guard::{CaptureGuard, GuardConfig, PageActuator, StepOutcome};
pub use hasher::{Fingerprint, PageSignature, PerceptualHash};
pub use policy::{PolicyConfig, Verdict};
pub use session::{CaptureSession, CaptureSummary, StopReason};
pub use tail::{dedupe_tail, TailConfig, TailReport};
