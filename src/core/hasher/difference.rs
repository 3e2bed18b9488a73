//! Difference Hash (dHash) implementation.
//!
//! dHash works by:
//! 1. Converting to grayscale
//! 2. Resizing the image to (hash_size+1) x hash_size
//! 3. Comparing each pixel to the one to its right
//! 4. If left pixel is strictly brighter, set bit to 1, else 0
//!
//! Bits are emitted row by row, most significant bit first.

use super::fast_resize::resize_gray;
use super::traits::DHash;
use crate::error::ComparisonError;
use image::GrayImage;

/// Difference Hash (dHash) implementation
#[derive(Debug, Clone)]
pub struct DifferenceHasher {
    /// Width and height of the comparison grid
    hash_size: u32,
}

impl DifferenceHasher {
    /// Create a new dHash hasher
    pub fn new(hash_size: u32) -> Self {
        Self { hash_size }
    }

    /// Grid size this hasher was built with
    pub fn hash_size(&self) -> u32 {
        self.hash_size
    }

    /// Hash a grayscale image of any size
    pub fn hash_gray(&self, gray: &GrayImage) -> Result<DHash, ComparisonError> {
        // One extra column so every cell has a right-hand neighbour
        let grid = resize_gray(gray, self.hash_size + 1, self.hash_size)?;
        Ok(self.hash_grid(&grid))
    }

    /// Pack the left > right comparisons of an already-resized grid
    fn hash_grid(&self, grid: &GrayImage) -> DHash {
        let total_bits = (self.hash_size * self.hash_size) as usize;
        let mut hash_bytes = Vec::with_capacity(total_bits.div_ceil(8));
        let mut current_byte: u8 = 0;
        let mut bit_position = 0;

        for y in 0..self.hash_size {
            for x in 0..self.hash_size {
                let left_pixel = grid.get_pixel(x, y)[0];
                let right_pixel = grid.get_pixel(x + 1, y)[0];

                if left_pixel > right_pixel {
                    current_byte |= 1 << (7 - bit_position);
                }

                bit_position += 1;

                if bit_position == 8 {
                    hash_bytes.push(current_byte);
                    current_byte = 0;
                    bit_position = 0;
                }
            }
        }

        if bit_position > 0 {
            hash_bytes.push(current_byte);
        }

        DHash::from_bytes(hash_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hasher::PerceptualHash;
    use image::{ImageBuffer, Luma};

    fn solid(value: u8) -> GrayImage {
        ImageBuffer::from_pixel(100, 100, Luma([value]))
    }

    fn gradient(left_bright: bool) -> GrayImage {
        ImageBuffer::from_fn(100, 100, |x, _| {
            let v = (x * 255 / 99) as u8;
            Luma([if left_bright { 255 - v } else { v }])
        })
    }

    #[test]
    fn identical_images_produce_identical_hash() {
        let hasher = DifferenceHasher::new(8);
        let image = gradient(true);

        let first = hasher.hash_gray(&image).unwrap();
        let second = hasher.hash_gray(&image).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn solid_image_hashes_to_zero() {
        let hasher = DifferenceHasher::new(8);
        let hash = hasher.hash_gray(&solid(128)).unwrap();

        // Equal neighbours are not "strictly greater"
        assert_eq!(hash.as_u64(), Some(0));
    }

    #[test]
    fn opposite_gradients_are_far_apart() {
        let hasher = DifferenceHasher::new(8);

        let dark_to_bright = hasher.hash_gray(&gradient(false)).unwrap();
        let bright_to_dark = hasher.hash_gray(&gradient(true)).unwrap();

        let distance = dark_to_bright.distance(&bright_to_dark);
        assert!(distance >= 48, "expected opposite gradients to differ, got {}", distance);
    }

    #[test]
    fn bits_are_row_major_msb_first() {
        let hasher = DifferenceHasher::new(8);
        // Only the first cell of the first row is brighter than its neighbour
        let mut grid: GrayImage = ImageBuffer::from_pixel(9, 8, Luma([10u8]));
        grid.put_pixel(0, 0, Luma([200]));

        let hash = hasher.hash_grid(&grid);
        assert_eq!(hash.as_u64(), Some(1u64 << 63));
        assert_eq!(hash.to_hex(), "8000000000000000");
    }

    #[test]
    fn hash_size_affects_output_length() {
        let image = solid(128);

        let hash_8 = DifferenceHasher::new(8).hash_gray(&image).unwrap();
        let hash_16 = DifferenceHasher::new(16).hash_gray(&image).unwrap();

        assert_eq!(hash_8.as_bytes().len(), 8);
        assert_eq!(hash_16.as_bytes().len(), 32);
        assert_eq!(hash_16.to_hex().len(), 16 * 16 / 4);
    }
}
