//! The in-memory image handle passed between pipeline stages.
//!
//! An [`Image`] owns its pixels. Stages take it by value and hand back either
//! the same image or a replacement, so exactly one image is live per run.
//!
//! Besides pixels it remembers where it came from: the media type detected
//! when it was decoded, and the quality it was last encoded at. The pipeline
//! uses both for the final serialization.

use super::calculations::anchor_position;
use super::params::{Anchor, Interlace, Quality};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

/// Opaque white, the flattening background for formats without alpha.
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Backend-level image state: the raster plus the interlace flag.
///
/// This is what [`Image::native_mut`] exposes to backends.
#[derive(Debug, Clone)]
pub struct NativeImage {
    pub pixels: DynamicImage,
    pub interlace: Interlace,
}

#[derive(Debug, Clone)]
pub struct Image {
    native: NativeImage,
    media_type: Option<&'static str>,
    quality: Option<Quality>,
}

impl Image {
    /// Wrap decoded pixels, recording the detected media type.
    pub fn new(pixels: DynamicImage, media_type: Option<&'static str>) -> Self {
        Self {
            native: NativeImage {
                pixels,
                interlace: Interlace::None,
            },
            media_type,
            quality: None,
        }
    }

    /// A fully transparent canvas with no origin media type.
    pub fn canvas(width: u32, height: u32) -> Self {
        Self::new(DynamicImage::ImageRgba8(RgbaImage::new(width, height)), None)
    }

    pub fn width(&self) -> u32 {
        self.native.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.native.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.native.pixels.dimensions()
    }

    /// Media type of the bytes this image was decoded from.
    pub fn media_type(&self) -> Option<&'static str> {
        self.media_type
    }

    /// Quality of the last encode this image went through, if any.
    pub fn quality(&self) -> Option<Quality> {
        self.quality
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn interlace(&self) -> Interlace {
        self.native.interlace
    }

    pub fn has_alpha(&self) -> bool {
        self.native.pixels.color().has_alpha()
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.native.pixels
    }

    /// Replace the pixels, keeping origin and interlace state.
    pub fn map_pixels(mut self, f: impl FnOnce(DynamicImage) -> DynamicImage) -> Self {
        self.native.pixels = f(self.native.pixels);
        self
    }

    pub fn native(&self) -> &NativeImage {
        &self.native
    }

    /// Escape hatch for backend-specific state (interlace toggling).
    pub fn native_mut(&mut self) -> &mut NativeImage {
        &mut self.native
    }

    /// Fill the whole image with a single color.
    pub fn fill(self, color: Rgba<u8>) -> Self {
        let (width, height) = self.dimensions();
        self.map_pixels(|_| DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, color)))
    }

    /// Alpha-composite `other` on top of this image.
    ///
    /// The position is computed from `anchor` and the `(dx, dy)` offset; parts
    /// falling outside the canvas are clipped.
    pub fn place(self, other: &Image, anchor: Anchor, dx: i64, dy: i64) -> Self {
        let (x, y) = anchor_position(self.dimensions(), other.dimensions(), anchor, dx, dy);
        let top = other.native.pixels.to_rgba8();
        self.map_pixels(|pixels| {
            let mut bottom = pixels.into_rgba8();
            image::imageops::overlay(&mut bottom, &top, x, y);
            DynamicImage::ImageRgba8(bottom)
        })
    }

    /// Composite onto an opaque canvas of the same size and drop alpha.
    pub fn flatten(self, background: Rgba<u8>) -> Self {
        let (width, height) = self.dimensions();
        let flattened = Image::canvas(width, height)
            .fill(background)
            .place(&self, Anchor::TopLeft, 0, 0);
        Self {
            native: NativeImage {
                pixels: DynamicImage::ImageRgb8(flattened.native.pixels.into_rgb8()),
                interlace: self.native.interlace,
            },
            media_type: self.media_type,
            quality: self.quality,
        }
    }
}
