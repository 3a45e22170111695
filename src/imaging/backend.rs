//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the seam between the pipeline and whatever
//! does the pixel work. Every backend supports the same three operations:
//! decode, encode, and toggling progressive output on a decoded image.
//!
//! | Backend | Decode / encode | Progressive toggle |
//! |---|---|---|
//! | [`RustBackend`](super::rust_backend::RustBackend) | `image`, `jpeg-encoder`, Adam7 writer | [`Interlace::Line`] |
//! | [`MagickBackend`](super::magick_backend::MagickBackend) | ImageMagick subprocess | [`Interlace::Plane`] |
//!
//! Backends are picked by [`BackendKind`] from configuration, never by
//! inspecting type names.

use super::format::OutputFormat;
use super::handle::Image;
use super::params::{Interlace, Quality};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode {format}: {message}")]
    Encode {
        format: OutputFormat,
        message: String,
    },
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("{program} failed: {stderr}")]
    Process { program: String, stderr: String },
}

/// Which backend a pipeline runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Pure Rust: `image` crate decoders and encoders.
    #[default]
    Rust,
    /// ImageMagick, driven through its command-line program.
    Magick,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Rust => "rust",
            BackendKind::Magick => "magick",
        })
    }
}

/// Trait for image processing backends.
///
/// Implementations must be shareable across threads: one pipeline (and its
/// backend) serves many concurrent runs.
pub trait ImageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Decode raw bytes, detecting the format from content.
    fn decode(&self, bytes: &[u8]) -> Result<Image, BackendError>;

    /// Encode an image. JPEG and PNG output honor the image's interlace flag.
    fn encode(
        &self,
        image: &Image,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;

    /// Mark an image so that its next JPEG or PNG encode is progressive.
    fn set_progressive(&self, image: &mut Image);
}

/// Backend-independent helper: the interlace value a backend writes.
pub(crate) fn mark_progressive(image: &mut Image, scheme: Interlace) {
    image.native_mut().interlace = scheme;
}
