//! Pixel buffers handed from the display to the OCR engine

use image::RgbaImage;

/// Bytes per pixel of every region buffer (RGBA)
pub const CHANNELS: u32 = 4;

/// A rectangular region of a rendered page
#[derive(Debug, Clone)]
pub struct RegionImage {
    /// Raw RGBA pixel data, `stride` bytes per row
    pub data: Vec<u8>,
    /// Region width in pixels
    pub width: u32,
    /// Region height in pixels
    pub height: u32,
    /// Bytes per row, at least `width * CHANNELS`
    pub stride: u32,
}

impl RegionImage {
    /// Create a tightly packed region
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            stride: width * CHANNELS,
        }
    }

    pub fn from_rgba(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height)
    }

    /// Get region dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Repack into an `RgbaImage`, dropping any row padding.
    ///
    /// Returns `None` when the buffer is shorter than the declared geometry.
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        let row_bytes = (self.width * CHANNELS) as usize;
        let stride = self.stride as usize;
        if self.height > 0 && self.data.len() < stride * (self.height as usize - 1) + row_bytes {
            return None;
        }

        let mut packed = Vec::with_capacity(row_bytes * self.height as usize);
        for row in 0..self.height as usize {
            let start = row * stride;
            packed.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        RgbaImage::from_raw(self.width, self.height, packed)
    }
}
