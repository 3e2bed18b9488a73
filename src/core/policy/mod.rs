//! # Policy Module
//!
//! Turns comparison metrics into a duplicate verdict.
//!
//! A pair is a duplicate only when every enabled criterion agrees:
//!
//! ```text
//! duplicate = distance <= hash_threshold
//!         AND mean_diff <= mean_diff_threshold
//!         AND size_delta_kb <= size_delta_kb_threshold   (when set)
//!         AND size_ratio <= size_ratio_threshold         (when set)
//! ```
//!
//! An unset size threshold contributes `true`. All comparisons are `<=`, so
//! raising any threshold can only turn "different" into "duplicate".

use crate::core::comparator::ComparisonMetrics;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Default maximum hash distance for a duplicate
pub const DEFAULT_HASH_THRESHOLD: u32 = 3;
/// Default maximum mean pixel difference for a duplicate
pub const DEFAULT_MEAN_DIFF_THRESHOLD: f64 = 3.0;
/// Default maximum size delta ratio for a duplicate
pub const DEFAULT_SIZE_RATIO_THRESHOLD: f64 = 0.02;

/// Duplicate thresholds.
///
/// Serialized with the configuration key names used in `config.yaml` and in
/// the sidecar history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Maximum Hamming distance (0-64)
    #[serde(rename = "duplicate_threshold")]
    pub hash_threshold: u32,
    /// Maximum mean pixel difference
    #[serde(rename = "duplicate_diff_mean")]
    pub mean_diff_threshold: f64,
    /// Maximum absolute size delta in KB
    #[serde(rename = "duplicate_size_kb")]
    pub size_delta_kb_threshold: Option<f64>,
    /// Maximum relative size delta
    #[serde(rename = "duplicate_size_ratio")]
    pub size_ratio_threshold: Option<f64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            hash_threshold: DEFAULT_HASH_THRESHOLD,
            mean_diff_threshold: DEFAULT_MEAN_DIFF_THRESHOLD,
            size_delta_kb_threshold: None,
            size_ratio_threshold: Some(DEFAULT_SIZE_RATIO_THRESHOLD),
        }
    }
}

impl PolicyConfig {
    /// Reject out-of-range thresholds; values are never clamped
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hash_threshold > 64 {
            return Err(ConfigError::out_of_range(
                "duplicate_threshold",
                self.hash_threshold,
                "between 0 and 64",
            ));
        }
        if !(self.mean_diff_threshold >= 0.0) {
            return Err(ConfigError::out_of_range(
                "duplicate_diff_mean",
                self.mean_diff_threshold,
                "non-negative",
            ));
        }
        if let Some(kb) = self.size_delta_kb_threshold {
            if !(kb >= 0.0) {
                return Err(ConfigError::out_of_range(
                    "duplicate_size_kb",
                    kb,
                    "non-negative",
                ));
            }
        }
        if let Some(ratio) = self.size_ratio_threshold {
            if !(ratio >= 0.0) {
                return Err(ConfigError::out_of_range(
                    "duplicate_size_ratio",
                    ratio,
                    "non-negative",
                ));
            }
        }
        Ok(())
    }

    /// Evaluate metrics against these thresholds
    pub fn evaluate(&self, metrics: &ComparisonMetrics) -> Verdict {
        evaluate(metrics, self)
    }
}

/// Per-criterion outcome of a policy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub hash_ok: bool,
    pub diff_ok: bool,
    pub size_ok: bool,
    pub is_duplicate: bool,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = |ok: bool| if ok { "ok" } else { "differs" };
        write!(
            f,
            "{} (hash {}, pixels {}, size {})",
            if self.is_duplicate { "duplicate" } else { "new page" },
            mark(self.hash_ok),
            mark(self.diff_ok),
            mark(self.size_ok)
        )
    }
}

/// Pure duplicate decision
pub fn evaluate(metrics: &ComparisonMetrics, config: &PolicyConfig) -> Verdict {
    let hash_ok = metrics.hamming_distance <= config.hash_threshold;
    let diff_ok = metrics.mean_diff <= config.mean_diff_threshold;

    let mut size_ok = true;
    if let Some(max_kb) = config.size_delta_kb_threshold {
        size_ok &= metrics.size_delta_kb <= max_kb;
    }
    // A missing ratio (empty previous file) cannot disagree
    if let (Some(max_ratio), Some(ratio)) = (config.size_ratio_threshold, metrics.size_ratio) {
        size_ok &= ratio <= max_ratio;
    }

    Verdict {
        hash_ok,
        diff_ok,
        size_ok,
        is_duplicate: hash_ok && diff_ok && size_ok,
    }
}

/// Shorthand for `evaluate(..).is_duplicate`
pub fn is_duplicate(metrics: &ComparisonMetrics, config: &PolicyConfig) -> bool {
    evaluate(metrics, config).is_duplicate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(distance: u32, mean_diff: f64, delta_kb: f64, ratio: Option<f64>) -> ComparisonMetrics {
        ComparisonMetrics {
            hamming_distance: distance,
            mean_diff,
            size_delta_kb: delta_kb,
            size_ratio: ratio,
        }
    }

    fn image_only(hash_threshold: u32, mean_diff_threshold: f64) -> PolicyConfig {
        PolicyConfig {
            hash_threshold,
            mean_diff_threshold,
            size_delta_kb_threshold: None,
            size_ratio_threshold: None,
        }
    }

    #[test]
    fn thresholds_are_inclusive() {
        let config = image_only(3, 3.0);
        assert!(is_duplicate(&metrics(3, 3.0, 0.0, None), &config));
        assert!(!is_duplicate(&metrics(4, 3.0, 0.0, None), &config));
        assert!(!is_duplicate(&metrics(3, 3.01, 0.0, None), &config));
    }

    #[test]
    fn all_criteria_must_agree() {
        let config = PolicyConfig {
            size_delta_kb_threshold: Some(5.0),
            ..image_only(3, 3.0)
        };

        let verdict = evaluate(&metrics(1, 1.0, 6.0, None), &config);
        assert!(verdict.hash_ok);
        assert!(verdict.diff_ok);
        assert!(!verdict.size_ok);
        assert!(!verdict.is_duplicate);
    }

    #[test]
    fn unset_size_thresholds_do_not_block() {
        let config = image_only(3, 3.0);
        let verdict = evaluate(&metrics(0, 0.0, 500.0, Some(10.0)), &config);
        assert!(verdict.size_ok);
        assert!(verdict.is_duplicate);
    }

    #[test]
    fn ratio_threshold_applies_when_ratio_known() {
        let config = PolicyConfig::default();
        assert!(is_duplicate(&metrics(0, 0.0, 1.0, Some(0.01)), &config));
        assert!(!is_duplicate(&metrics(0, 0.0, 1.0, Some(0.05)), &config));
        // Previous file was empty: ratio is undefined and cannot disagree
        assert!(is_duplicate(&metrics(0, 0.0, 1.0, None), &config));
    }

    #[test]
    fn raising_thresholds_never_flips_duplicate_to_new_page() {
        let samples = [
            metrics(0, 0.0, 0.0, Some(0.0)),
            metrics(2, 2.5, 1.0, Some(0.01)),
            metrics(5, 4.0, 3.0, Some(0.03)),
            metrics(40, 20.0, 30.0, None),
        ];
        let base = PolicyConfig {
            hash_threshold: 3,
            mean_diff_threshold: 3.0,
            size_delta_kb_threshold: Some(2.0),
            size_ratio_threshold: Some(0.02),
        };
        let raised = [
            PolicyConfig { hash_threshold: 10, ..base },
            PolicyConfig { mean_diff_threshold: 10.0, ..base },
            PolicyConfig { size_delta_kb_threshold: Some(50.0), ..base },
            PolicyConfig { size_ratio_threshold: Some(0.5), ..base },
        ];

        for m in &samples {
            if is_duplicate(m, &base) {
                for config in &raised {
                    assert!(is_duplicate(m, config), "{:?} flipped under {:?}", m, config);
                }
            }
        }
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        assert!(PolicyConfig::default().validate().is_ok());
        assert!(image_only(64, 0.0).validate().is_ok());
        assert!(image_only(65, 3.0).validate().is_err());
        assert!(image_only(3, -0.5).validate().is_err());
        assert!(image_only(3, f64::NAN).validate().is_err());
        assert!(PolicyConfig {
            size_delta_kb_threshold: Some(-1.0),
            ..PolicyConfig::default()
        }
        .validate()
        .is_err());
        assert!(PolicyConfig {
            size_ratio_threshold: Some(-0.1),
            ..PolicyConfig::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn serializes_with_config_key_names() {
        let json = serde_json::to_value(PolicyConfig::default()).unwrap();
        assert_eq!(json["duplicate_threshold"], 3);
        assert_eq!(json["duplicate_diff_mean"], 3.0);
        assert!(json["duplicate_size_kb"].is_null());
        assert_eq!(json["duplicate_size_ratio"], 0.02);
    }

    #[test]
    fn verdict_display_explains_failed_criterion() {
        let verdict = evaluate(&metrics(10, 0.0, 0.0, None), &image_only(3, 3.0));
        assert_eq!(verdict.to_string(), "new page (hash differs, pixels ok, size ok)");
    }
}
