//! Resizing.
//!
//! | Parameter | Meaning | Invalid or missing |
//! |---|---|---|
//! | `w`, `h` | Target box in pixels, truncated | side is derived from the other |
//! | `dpr` | Device pixel ratio, `0..=8` | `1` |
//! | `fit` | `contain`, `max`, `stretch`, `crop` | `contain` |
//!
//! With neither `w` nor `h` the image passes through untouched. All sizes are
//! computed by [`calculations`](crate::imaging::calculations); the pixel work
//! is `image`'s `Lanczos3` resampling.

use super::{Manipulator, ManipulatorError};
use crate::imaging::calculations::{apply_dpr, fits_within, limit_dimensions, target_dimensions};
use crate::imaging::{Image, ImageBackend};
use crate::params::ParameterSet;
use image::imageops::FilterType;

pub const NAME: &str = "size";

const MAX_DPR: f64 = 8.0;

/// Default cap on the output area: 4096 x 4096 pixels.
pub const DEFAULT_MAX_IMAGE_SIZE: u64 = 16_777_216;

/// How the image is fitted into the requested box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Fit {
    /// Scale to fit inside the box, preserving aspect ratio.
    #[default]
    Contain,
    /// Like `Contain`, but never upscale.
    Max,
    /// Scale to the exact box, ignoring aspect ratio.
    Stretch,
    /// Cover the box, then center-crop the overflow.
    Crop,
}

impl Fit {
    /// Unknown values fall back to [`Fit::Contain`].
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            Some("max") => Fit::Max,
            Some("stretch") => Fit::Stretch,
            Some("crop") => Fit::Crop,
            _ => Fit::Contain,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Size {
    max_image_size: u64,
}

impl Size {
    /// `max_image_size` caps the target area in pixels.
    pub fn new(max_image_size: u64) -> Self {
        Self { max_image_size }
    }

    /// A positive pixel length, or `None`.
    fn dimension(params: &ParameterSet, key: &str) -> Option<u32> {
        params
            .get(key)
            .and_then(crate::imaging::parse_numeric)
            .filter(|v| *v > 0.0 && *v <= u32::MAX as f64)
            .map(|v| (v.trunc() as u32).max(1))
    }

    pub fn dpr(params: &ParameterSet) -> f64 {
        params
            .get("dpr")
            .and_then(crate::imaging::parse_numeric)
            .filter(|v| (0.0..=MAX_DPR).contains(v))
            .unwrap_or(1.0)
    }

    /// The box the image is fitted into, after dpr and the area limit.
    pub fn target(&self, source: (u32, u32), params: &ParameterSet) -> Option<(u32, u32)> {
        let width = Self::dimension(params, "w");
        let height = Self::dimension(params, "h");
        let size = target_dimensions(source, width, height)?;
        let size = apply_dpr(size, Self::dpr(params));
        Some(limit_dimensions(size, self.max_image_size))
    }
}

impl Default for Size {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGE_SIZE)
    }
}

impl Manipulator for Size {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run(
        &self,
        image: Image,
        params: &ParameterSet,
        _backend: &dyn ImageBackend,
    ) -> Result<Image, ManipulatorError> {
        let source = image.dimensions();
        let Some((width, height)) = self.target(source, params) else {
            return Ok(image);
        };
        let fit = Fit::from_param(params.get("fit"));

        if fit == Fit::Max && fits_within(source, (width, height)) {
            tracing::debug!(?source, width, height, "Source fits, not upscaling");
            return Ok(image);
        }

        tracing::debug!(?source, width, height, ?fit, "Resizing");
        Ok(image.map_pixels(|pixels| match fit {
            Fit::Contain | Fit::Max => pixels.resize(width, height, FilterType::Lanczos3),
            Fit::Stretch => pixels.resize_exact(width, height, FilterType::Lanczos3),
            Fit::Crop => pixels.resize_to_fill(width, height, FilterType::Lanczos3),
        }))
    }
}
