//! # Hasher Module
//!
//! Fingerprint extraction for captured pages.
//!
//! ## How It Works
//! 1. Decode the page straight to grayscale (zune-jpeg for JPEG, image crate otherwise)
//! 2. Skip empty frames
//! 3. Resize to (hash_size+1) x hash_size and compute the dHash
//! 4. Resize to sample_size x sample_size for the mean-difference signal
//! 5. Record the file size in KB
//!
//! Everything a comparison needs from one image lands in a [`PageSignature`],
//! so the tail walk and the capture guard decode each page exactly once.
//!
//! ## Example
//! ```rust,ignore
//! use page_dedup::core::hasher::ExtractorConfig;
//!
//! let extractor = ExtractorConfig::new().hash_size(8).build()?;
//! let signature = extractor.analyze_file(&path)?;
//! println!("{}", signature.fingerprint.hash);
//! ```

mod difference;
pub mod fast_decode;
pub mod fast_resize;
mod traits;

pub use difference::DifferenceHasher;
pub use traits::{DHash, PerceptualHash};

use crate::error::{ComparisonError, ConfigError};
use fast_decode::decode_gray;
use fast_resize::resize_gray;
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default dHash grid (64-bit hash)
pub const DEFAULT_HASH_SIZE: u32 = 8;

/// Default side of the mean-difference sample square
pub const DEFAULT_SAMPLE_SIZE: u32 = 64;

/// Compact perceptual identity of one page image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Difference hash
    pub hash: DHash,
    /// Source file size in kilobytes (bytes / 1024)
    pub size_kb: f64,
    /// Where the image came from
    pub source: PathBuf,
}

/// A fingerprint plus the downsampled grayscale sample used for mean
/// pixel difference
#[derive(Debug, Clone)]
pub struct PageSignature {
    pub fingerprint: Fingerprint,
    pub sample: GrayImage,
}

impl PageSignature {
    /// Source path of the page
    pub fn source(&self) -> &Path {
        &self.fingerprint.source
    }
}

/// Configuration builder for the extractor
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    hash_size: u32,
    sample_size: u32,
}

impl ExtractorConfig {
    /// Create a configuration with the default 8x8 hash and 64x64 sample
    pub fn new() -> Self {
        Self {
            hash_size: DEFAULT_HASH_SIZE,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }

    /// Set the dHash grid size (positive multiple of 4)
    pub fn hash_size(mut self, size: u32) -> Self {
        self.hash_size = size;
        self
    }

    /// Set the mean-difference sample size
    pub fn sample_size(mut self, size: u32) -> Self {
        self.sample_size = size;
        self
    }

    /// Build the extractor
    pub fn build(self) -> Result<Extractor, ConfigError> {
        if self.hash_size == 0 || self.hash_size % 4 != 0 || self.hash_size > 64 {
            return Err(ConfigError::out_of_range(
                "hash_size",
                self.hash_size,
                "a multiple of 4 between 4 and 64",
            ));
        }
        if self.sample_size == 0 {
            return Err(ConfigError::out_of_range(
                "sample_size",
                self.sample_size,
                "a positive integer",
            ));
        }
        Ok(Extractor {
            hasher: DifferenceHasher::new(self.hash_size),
            sample_size: self.sample_size,
        })
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes page signatures
#[derive(Debug, Clone)]
pub struct Extractor {
    hasher: DifferenceHasher,
    sample_size: u32,
}

impl Extractor {
    /// dHash grid size
    pub fn hash_size(&self) -> u32 {
        self.hasher.hash_size()
    }

    /// Mean-difference sample size
    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    /// Decode a page file and compute its signature
    pub fn analyze_file(&self, path: &Path) -> Result<PageSignature, ComparisonError> {
        let size_bytes = fs::metadata(path)
            .map_err(|e| ComparisonError::IoError {
                path: path.to_path_buf(),
                source: e,
            })?
            .len();
        let gray = decode_gray(path)?;
        self.analyze_gray(&gray, size_bytes, path)
    }

    /// Compute the signature of an already decoded image
    pub fn analyze_image(
        &self,
        image: &DynamicImage,
        size_bytes: u64,
        source: &Path,
    ) -> Result<PageSignature, ComparisonError> {
        self.analyze_gray(&image.to_luma8(), size_bytes, source)
    }

    fn analyze_gray(
        &self,
        gray: &GrayImage,
        size_bytes: u64,
        source: &Path,
    ) -> Result<PageSignature, ComparisonError> {
        if gray.width() == 0 || gray.height() == 0 {
            return Err(ComparisonError::EmptyImage {
                path: source.to_path_buf(),
            });
        }

        let hash = self.hasher.hash_gray(gray)?;
        let sample = resize_gray(gray, self.sample_size, self.sample_size)?;

        Ok(PageSignature {
            fingerprint: Fingerprint {
                hash,
                size_kb: size_bytes as f64 / 1024.0,
                source: source.to_path_buf(),
            },
            sample,
        })
    }

    /// Fingerprint only, for callers that do not compare
    pub fn fingerprint_file(&self, path: &Path) -> Result<Fingerprint, ComparisonError> {
        self.analyze_file(path).map(|signature| signature.fingerprint)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            hasher: DifferenceHasher::new(DEFAULT_HASH_SIZE),
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}
