//! SIMD-accelerated grayscale resizing.
//!
//! Both the dHash grid and the mean-difference sample are produced here, with
//! a Lanczos3 convolution so that the downsampled pixels are a smooth average
//! of the source rather than a nearest-neighbour pick.

use crate::error::ComparisonError;
use fast_image_resize::images::{Image, ImageRef};
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::GrayImage;
use std::cell::RefCell;

thread_local! {
    // Resizer keeps scratch buffers between calls; one per thread is enough.
    static RESIZER: RefCell<Resizer> = RefCell::new(Resizer::new());
}

/// Resize a grayscale page to `width` x `height` with Lanczos3
pub fn resize_gray(gray: &GrayImage, width: u32, height: u32) -> Result<GrayImage, ComparisonError> {
    if gray.width() == 0 || gray.height() == 0 {
        return Err(ComparisonError::ResizeFailed(format!(
            "source is {}x{}",
            gray.width(),
            gray.height()
        )));
    }
    if width == 0 || height == 0 {
        return Err(ComparisonError::ResizeFailed(format!(
            "target is {width}x{height}"
        )));
    }

    let src = ImageRef::new(gray.width(), gray.height(), gray.as_raw(), PixelType::U8)
        .map_err(|e| ComparisonError::ResizeFailed(e.to_string()))?;
    let mut dst = Image::new(width, height, PixelType::U8);
    let options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3));

    RESIZER
        .with(|resizer| resizer.borrow_mut().resize(&src, &mut dst, &options))
        .map_err(|e| ComparisonError::ResizeFailed(e.to_string()))?;

    GrayImage::from_raw(width, height, dst.into_vec())
        .ok_or_else(|| ComparisonError::ResizeFailed("output buffer size mismatch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    fn gradient_page(width: u32, height: u32) -> GrayImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Luma([((x * 255 / width + y * 64 / height) % 256) as u8])
        })
    }

    #[test]
    fn produces_hash_grid_dimensions() {
        let resized = resize_gray(&gradient_page(120, 160), 9, 8).unwrap();
        assert_eq!(resized.dimensions(), (9, 8));
    }

    #[test]
    fn produces_sample_square() {
        let resized = resize_gray(&gradient_page(300, 400), 64, 64).unwrap();
        assert_eq!(resized.dimensions(), (64, 64));
    }

    #[test]
    fn uniform_page_stays_uniform() {
        let gray: GrayImage = ImageBuffer::from_pixel(50, 70, Luma([200u8]));
        let resized = resize_gray(&gray, 9, 8).unwrap();

        assert!(resized.pixels().all(|p| p[0].abs_diff(200) <= 1));
    }

    #[test]
    fn zero_sized_target_is_rejected() {
        let gray: GrayImage = ImageBuffer::from_pixel(10, 10, Luma([0u8]));
        assert!(matches!(
            resize_gray(&gray, 0, 8),
            Err(ComparisonError::ResizeFailed(_))
        ));
    }

    #[test]
    fn repeated_resizes_are_identical() {
        let page = gradient_page(100, 100);
        let first = resize_gray(&page, 64, 64).unwrap();
        let second = resize_gray(&page, 64, 64).unwrap();

        assert_eq!(first.as_raw(), second.as_raw());
    }
}
