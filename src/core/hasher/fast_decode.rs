//! Grayscale page decoding.
//!
//! Both page signals work on luma only, so JPEG captures are decoded by
//! zune-jpeg straight into a single channel. Everything else (PNG screenshots
//! in practice) goes through the image crate and is converted once.

use crate::error::ComparisonError;
use image::GrayImage;
use std::fs;
use std::path::Path;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

/// Whether the file extension names a JPEG
pub fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
}

/// Decode a page file to 8-bit grayscale.
///
/// An undecodable or zero-sized page is an error; callers never get a
/// placeholder image back.
pub fn decode_gray(path: &Path) -> Result<GrayImage, ComparisonError> {
    let gray = if is_jpeg(path) {
        // Mislabelled files (a PNG saved as .jpg) still decode via the fallback
        match jpeg_luma(path) {
            Ok(gray) => gray,
            Err(_) => generic_luma(path)?,
        }
    } else {
        generic_luma(path)?
    };

    if gray.width() == 0 || gray.height() == 0 {
        return Err(ComparisonError::EmptyImage {
            path: path.to_path_buf(),
        });
    }
    Ok(gray)
}

fn jpeg_luma(path: &Path) -> Result<GrayImage, ComparisonError> {
    let bytes = fs::read(path).map_err(|source| ComparisonError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    let options = DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::Luma);
    let mut decoder = JpegDecoder::new_with_options(&bytes, options);
    let decode_error = |reason: String| ComparisonError::DecodeError {
        path: path.to_path_buf(),
        reason,
    };

    let pixels = decoder
        .decode()
        .map_err(|e| decode_error(format!("jpeg: {e:?}")))?;
    let info = decoder
        .info()
        .ok_or_else(|| decode_error("jpeg header missing".to_string()))?;

    GrayImage::from_raw(info.width as u32, info.height as u32, pixels)
        .ok_or_else(|| decode_error("luma buffer does not match the frame size".to_string()))
}

fn generic_luma(path: &Path) -> Result<GrayImage, ComparisonError> {
    let image = image::open(path).map_err(|e| match e {
        image::ImageError::IoError(source) => ComparisonError::IoError {
            path: path.to_path_buf(),
            source,
        },
        other => ComparisonError::DecodeError {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    })?;
    Ok(image.into_luma8())
}
