//! Image processing: the collaborator the pipeline delegates pixel work to.
//!
//! | Operation | Rust backend | ImageMagick backend |
//! |---|---|---|
//! | **Decode** | `image::ImageReader` | `magick - png:-` |
//! | **Encode** | `jpeg-encoder`, `image` codecs | `magick png:- FMT:-` |
//! | **Progressive** | [`Interlace::Line`] | [`Interlace::Plane`] |
//! | **Fill / place** | `image::imageops::overlay` on [`Image`] | same |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and placement math (unit testable)
//! - **Parameters**: Quality, interlace and anchor value types
//! - **Format**: The supported output format table
//! - **Image**: The in-memory handle passed between pipeline stages
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`] + [`MagickBackend`]

pub mod backend;
pub mod calculations;
pub mod format;
pub mod handle;
pub mod interlace;
pub mod magick_backend;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, BackendKind, ImageBackend};
pub use format::{OutputFormat, SUPPORTED_FORMATS};
pub use handle::{Image, NativeImage, WHITE};
pub use magick_backend::MagickBackend;
pub use params::{Anchor, Interlace, Quality};
pub(crate) use params::parse_numeric;
pub use rust_backend::RustBackend;

/// Build the backend selected by configuration.
pub fn backend_for(kind: BackendKind, magick_program: &str) -> Box<dyn ImageBackend> {
    match kind {
        BackendKind::Rust => Box::new(RustBackend::new()),
        BackendKind::Magick => Box::new(MagickBackend::new(magick_program)),
    }
}
