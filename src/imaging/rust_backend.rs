//! Pure Rust image processing backend. Runs no external programs.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, TIFF, WebP) | `image::ImageReader` with content sniffing |
//! | Encode → JPEG (baseline and progressive) | `jpeg-encoder` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → PNG (Adam7) | [`interlace`](super::interlace) (miniz_oxide + crc32fast) |
//! | Encode → GIF, TIFF, WebP (lossless) | `image::DynamicImage::write_to` |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//!
//! Progressive output is a flag on the image ([`Interlace::Line`]), toggled
//! directly on the raster state and read back by the JPEG and PNG encoders.

use super::backend::{BackendError, BackendKind, ImageBackend, mark_progressive};
use super::format::OutputFormat;
use super::handle::Image;
use super::interlace::encode_interlaced_png;
use super::params::{Interlace, Quality};
use image::codecs::avif::AvifEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::borrow::Cow;
use std::io::Cursor;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in and known to work.
///
/// No AVIF: the `image` crate's `"avif"` feature only
/// enables the **encoder** (rav1e). AVIF can be written but not read.
const DECODABLE_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    DECODABLE_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// AVIF encoder speed: 1 (slowest) to 10 (fastest).
const AVIF_SPEED: u8 = 6;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode bytes, sniffing the format from content rather than trusting a name.
fn load_image(bytes: &[u8]) -> Result<Image, BackendError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader
        .format()
        .ok_or_else(|| BackendError::Decode("unrecognized image format".into()))?;
    let pixels = reader
        .decode()
        .map_err(|e| BackendError::Decode(format!("{format:?}: {e}")))?;
    Ok(Image::new(pixels, Some(format.to_mime_type())))
}

/// 8-bit RGB or RGBA, whichever keeps the alpha channel.
fn rgb_or_rgba(pixels: &DynamicImage) -> Cow<'_, DynamicImage> {
    match pixels {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => Cow::Borrowed(pixels),
        other if other.color().has_alpha() => Cow::Owned(DynamicImage::ImageRgba8(other.to_rgba8())),
        other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
    }
}

/// Encode as JPEG through jpeg-encoder, which supports progressive scans.
fn encode_jpeg(
    pixels: &DynamicImage,
    quality: Quality,
    progressive: bool,
) -> Result<Vec<u8>, BackendError> {
    use jpeg_encoder::{ColorType, Encoder};

    let encode_error = |message: String| BackendError::Encode {
        format: OutputFormat::Jpg,
        message,
    };

    let (width, height) = (pixels.width(), pixels.height());
    let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
        return Err(BackendError::Unsupported(format!(
            "JPEG dimensions are limited to 65535px, got {width}x{height}"
        )));
    };

    let (data, color_type) = if pixels.color().channel_count() <= 2 {
        (pixels.to_luma8().into_raw(), ColorType::Luma)
    } else {
        (pixels.to_rgb8().into_raw(), ColorType::Rgb)
    };

    let mut out = Vec::new();
    // jpeg-encoder treats 0 as invalid; the lowest useful quality is 1
    let mut encoder = Encoder::new(&mut out, quality.value().max(1));
    encoder.set_progressive(progressive);
    encoder
        .encode(&data, w, h, color_type)
        .map_err(|e| encode_error(e.to_string()))?;
    Ok(out)
}

fn encode_png(pixels: &DynamicImage, interlace: Interlace) -> Result<Vec<u8>, BackendError> {
    let pixels = rgb_or_rgba(pixels);
    if interlace.is_progressive() {
        return encode_interlaced_png(&pixels);
    }
    let mut out = Vec::new();
    pixels
        .write_with_encoder(PngEncoder::new(&mut out))
        .map_err(|e| BackendError::Encode {
            format: OutputFormat::Png,
            message: e.to_string(),
        })?;
    Ok(out)
}

fn encode_avif(pixels: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let mut out = Vec::new();
    let encoder = AvifEncoder::new_with_speed_quality(&mut out, AVIF_SPEED, quality.value().max(1));
    rgb_or_rgba(pixels)
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode {
            format: OutputFormat::Avif,
            message: e.to_string(),
        })?;
    Ok(out)
}

/// GIF, TIFF and WebP go through the `image` crate's generic writer.
///
/// The WebP encoder is lossless, so quality does not apply.
fn encode_generic(
    pixels: &DynamicImage,
    format: OutputFormat,
    target: ImageFormat,
) -> Result<Vec<u8>, BackendError> {
    let pixels = match target {
        ImageFormat::Gif => Cow::Owned(DynamicImage::ImageRgba8(pixels.to_rgba8())),
        _ => rgb_or_rgba(pixels),
    };
    let mut out = Cursor::new(Vec::new());
    pixels
        .write_to(&mut out, target)
        .map_err(|e| BackendError::Encode {
            format,
            message: e.to_string(),
        })?;
    Ok(out.into_inner())
}

impl ImageBackend for RustBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Rust
    }

    fn decode(&self, bytes: &[u8]) -> Result<Image, BackendError> {
        load_image(bytes)
    }

    fn encode(
        &self,
        image: &Image,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let pixels = image.pixels();
        let interlace = image.interlace();
        match format {
            OutputFormat::Jpg => encode_jpeg(pixels, quality, interlace.is_progressive()),
            OutputFormat::Pjpg => encode_jpeg(pixels, quality, true),
            OutputFormat::Png => encode_png(pixels, interlace),
            OutputFormat::Avif => encode_avif(pixels, quality),
            OutputFormat::Gif => encode_generic(pixels, format, ImageFormat::Gif),
            OutputFormat::Webp => encode_generic(pixels, format, ImageFormat::WebP),
            OutputFormat::Tiff => encode_generic(pixels, format, ImageFormat::Tiff),
        }
    }

    fn set_progressive(&self, image: &mut Image) {
        mark_progressive(image, Interlace::Line);
    }
}
