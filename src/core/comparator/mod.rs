//! # Comparator Module
//!
//! Measures how different two consecutive pages are.
//!
//! ## Signals
//! | Metric | Meaning |
//! |--------|---------|
//! | `hamming_distance` | differing dHash bits (0 = same gradient layout) |
//! | `mean_diff` | mean absolute grayscale difference of the 64x64 samples |
//! | `size_delta_kb` | absolute file size change |
//! | `size_ratio` | `size_delta_kb / previous size`, absent when the previous file is empty |
//!
//! The hash catches layout changes, the mean difference catches small text
//! changes that leave the coarse gradient alone, and the size delta catches
//! compressed-content changes that neither image signal sees.

use crate::core::hasher::{Extractor, PageSignature, PerceptualHash};
use crate::error::ComparisonError;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Metrics for one ordered (previous, current) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonMetrics {
    /// Hamming distance between the two dHashes
    pub hamming_distance: u32,
    /// Mean absolute per-pixel grayscale difference (0-255)
    pub mean_diff: f64,
    /// |current size - previous size| in KB
    pub size_delta_kb: f64,
    /// `size_delta_kb / previous size`, None if the previous size is zero
    pub size_ratio: Option<f64>,
}

/// Compare two page signatures.
///
/// Fails only when the signatures were produced with different hash or
/// sample sizes; the metrics are otherwise fully determined by the inputs.
pub fn compare(
    previous: &PageSignature,
    current: &PageSignature,
) -> Result<ComparisonMetrics, ComparisonError> {
    let prev_hash = &previous.fingerprint.hash;
    let curr_hash = &current.fingerprint.hash;
    if prev_hash.as_bytes().len() != curr_hash.as_bytes().len() {
        return Err(ComparisonError::Incompatible {
            reason: format!(
                "hash lengths differ ({} vs {} bits)",
                prev_hash.bit_count(),
                curr_hash.bit_count()
            ),
        });
    }

    let mean_diff = mean_abs_diff(&previous.sample, &current.sample)?;
    let (size_delta_kb, size_ratio) =
        size_change(previous.fingerprint.size_kb, current.fingerprint.size_kb);

    Ok(ComparisonMetrics {
        hamming_distance: prev_hash.distance(curr_hash),
        mean_diff,
        size_delta_kb,
        size_ratio,
    })
}

/// Mean of the per-pixel absolute difference between two equally sized
/// grayscale images
pub fn mean_abs_diff(a: &GrayImage, b: &GrayImage) -> Result<f64, ComparisonError> {
    if a.dimensions() != b.dimensions() {
        return Err(ComparisonError::Incompatible {
            reason: format!(
                "sample sizes differ ({:?} vs {:?})",
                a.dimensions(),
                b.dimensions()
            ),
        });
    }

    let pixels = a.as_raw().len();
    if pixels == 0 {
        return Ok(0.0);
    }

    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw().iter())
        .map(|(x, y)| x.abs_diff(*y) as u64)
        .sum();

    Ok(total as f64 / pixels as f64)
}

/// Absolute size delta and delta ratio relative to the previous size
pub fn size_change(previous_kb: f64, current_kb: f64) -> (f64, Option<f64>) {
    let delta = (current_kb - previous_kb).abs();
    let ratio = if previous_kb > 0.0 {
        Some(delta / previous_kb)
    } else {
        None
    };
    (delta, ratio)
}

/// File-level comparator: decodes both pages and compares them
#[derive(Debug, Clone, Default)]
pub struct Comparator {
    extractor: Extractor,
}

impl Comparator {
    /// Create a comparator around an extractor
    pub fn new(extractor: Extractor) -> Self {
        Self { extractor }
    }

    /// The extractor used to analyze files
    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Analyze one page file
    pub fn analyze(&self, path: &Path) -> Result<PageSignature, ComparisonError> {
        self.extractor.analyze_file(path)
    }

    /// Decode and compare two page files
    pub fn compare_files(
        &self,
        previous: &Path,
        current: &Path,
    ) -> Result<ComparisonMetrics, ComparisonError> {
        let previous = self.analyze(previous)?;
        let current = self.analyze(current)?;
        compare(&previous, &current)
    }
}
