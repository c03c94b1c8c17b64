//! Rendered page pixels.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::Result;

/// An RGBA8 pixel buffer produced by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// Create an opaque white bitmap.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![255; (width as usize) * (height as usize) * 4],
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Consume the bitmap and return its RGBA bytes.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Size of the pixel buffer in bytes.
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    /// Convert into an `image` buffer.
    pub fn to_image(&self) -> RgbaImage {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    /// Encode as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        DynamicImage::ImageRgba8(self.to_image())
            .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)?;
        Ok(data)
    }
}

impl From<RgbaImage> for Bitmap {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: image.into_raw(),
        }
    }
}

impl From<DynamicImage> for Bitmap {
    fn from(image: DynamicImage) -> Self {
        image.into_rgba8().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_blank_is_white() {
        let bitmap = Bitmap::blank(3, 2);
        assert_eq!(bitmap.byte_len(), 24);
        assert!(bitmap.pixels().iter().all(|&b| b == 255));
    }

    #[test]
    fn test_png_header() {
        let png = Bitmap::blank(4, 4).to_png().unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
    }
}
