use std::path::Path;

use image::{GrayImage, ImageReader, Luma};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use tracing::debug;

use crate::error::VectorizeError;

/// Threshold method for converting a grayscale raster to a binary skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMethod {
    /// Fixed brightness threshold (0-255). Pixels at or below it are ink.
    Fixed(u8),
    /// Otsu's method (automatic).
    Otsu,
}

/// A 1-bit-per-pixel image: row-major, MSB-first within each byte, with
/// padding only after the final pixel. A set bit is foreground (line).
///
/// The buffer length is validated on construction, so every accessor can
/// address pixels without further checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl BinaryImage {
    /// Wrap a bit-packed buffer, checking it against the declared size.
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, VectorizeError> {
        let expected = packed_len(width, height)?;
        if data.len() != expected {
            return Err(VectorizeError::BufferLength {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Pack a per-pixel predicate `f(x, y)`.
    pub fn from_fn(
        width: usize,
        height: usize,
        mut f: impl FnMut(usize, usize) -> bool,
    ) -> Result<Self, VectorizeError> {
        let mut data = vec![0_u8; packed_len(width, height)?];
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    let i = y * width + x;
                    data[i / 8] |= 0x80 >> (i % 8);
                }
            }
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Pack a grayscale image; any non-zero pixel is foreground.
    pub fn from_gray(gray: &GrayImage) -> Result<Self, VectorizeError> {
        let (w, h) = gray.dimensions();
        Self::from_fn(w as usize, h as usize, |x, y| {
            gray.get_pixel(x as u32, y as u32).0[0] > 0
        })
    }

    /// Load a raster file and threshold it into a skeleton bitmap.
    ///
    /// Dark strokes on a light background become foreground; `invert`
    /// swaps that. The image is expected to be thinned already.
    pub fn load(
        path: &Path,
        method: ThresholdMethod,
        invert: bool,
    ) -> Result<Self, VectorizeError> {
        let img = ImageReader::open(path)
            .map_err(|e| VectorizeError::ImageLoad(e.to_string()))?
            .decode()
            .map_err(|e| VectorizeError::ImageLoad(e.to_string()))?
            .into_luma8();

        let level = match method {
            ThresholdMethod::Fixed(t) => t,
            ThresholdMethod::Otsu => {
                let t = otsu_level(&img);
                debug!(level = t, "otsu threshold");
                t
            }
        };

        let mut binary = threshold(&img, level, ThresholdType::BinaryInverted);
        if invert {
            for pixel in binary.pixels_mut() {
                pixel.0[0] = 255 - pixel.0[0];
            }
        }
        Self::from_gray(&binary)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// The packed buffer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Pixel at `(x, y)`. Out of bounds reads as background.
    pub fn get(&self, x: usize, y: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let i = y * self.width + x;
        self.data[i / 8] & (0x80 >> (i % 8)) != 0
    }

    /// Foreground pixels in raster order.
    pub fn foreground(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.height)
            .flat_map(move |y| (0..self.width).map(move |x| (x, y)))
            .filter(|&(x, y)| self.get(x, y))
    }

    pub fn count_foreground(&self) -> usize {
        let total = self.width * self.height;
        let full = total / 8;
        let mut count: usize = self.data[..full]
            .iter()
            .map(|b| b.count_ones() as usize)
            .sum();
        for i in full * 8..total {
            if self.data[i / 8] & (0x80 >> (i % 8)) != 0 {
                count += 1;
            }
        }
        count
    }

    /// Unpack to a grayscale image, foreground = 255.
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            Luma([if self.get(x as usize, y as usize) { 255 } else { 0 }])
        })
    }
}

/// Packed length in bytes for a `width × height` bitmap.
fn packed_len(width: usize, height: usize) -> Result<usize, VectorizeError> {
    if width == 0 || height == 0 {
        return Err(VectorizeError::ZeroDimension { width, height });
    }
    let pixels = width
        .checked_mul(height)
        .filter(|&n| n <= u32::MAX as usize)
        .ok_or(VectorizeError::DimensionOverflow { width, height })?;
    Ok(pixels.div_ceil(8))
}
