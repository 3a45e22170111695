//! Shared test utilities.
//!
//! Fixtures are generated in memory with the `image` crate, so no test
//! depends on files checked into the repository.
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let source = encode_png_bytes(&transparent_rgba(16, 16));
//! let encoded = api.run(&source, &params).unwrap();
//! ```

use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;

/// An opaque RGB gradient, distinct per pixel for small sizes.
pub fn gradient_rgb(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 17 % 256) as u8, (y * 31 % 256) as u8, ((x + y) * 7 % 256) as u8])
    }))
}

/// RGBA image whose left half is fully transparent and right half opaque red.
pub fn transparent_rgba(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([255, 0, 0, 255])
        }
    }))
}

/// Encode as a plain (non-interlaced) PNG.
pub fn encode_png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}
