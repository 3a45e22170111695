//! Value types shared between manipulators and backends.
//!
//! These describe *what* to do, not *how*. Backends interpret them; the
//! manipulators only ever produce them.
//!
//! - [`Quality`]: lossy encoding quality (0–100, default 90).
//! - [`Interlace`]: native interlace flag carried on an image until encode.
//! - [`Anchor`]: placement anchor for compositing one image onto another.

/// Quality setting for lossy image encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quality(u8);

impl Quality {
    pub const DEFAULT: Quality = Quality(90);

    /// Returns `None` for values above 100.
    pub fn new(value: u8) -> Option<Self> {
        (value <= 100).then_some(Self(value))
    }

    /// Resolve a raw request value leniently.
    ///
    /// Accepts any finite decimal number in `[0, 100]` (surrounding
    /// whitespace, fractions and exponents allowed) and truncates it.
    /// Anything else, including an absent value, falls back to 90.
    pub fn from_param(raw: Option<&str>) -> Self {
        raw.and_then(parse_numeric)
            .filter(|v| (0.0..=100.0).contains(v))
            .map(|v| Self(v.trunc() as u8))
            .unwrap_or_default()
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Parse a request value as a finite number.
///
/// `f64::from_str` accepts `inf`/`nan`, which are not numbers for our purposes.
pub(crate) fn parse_numeric(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

/// Interlace scheme recorded on the native image.
///
/// Backends toggle this in [`ImageBackend::set_progressive`](super::ImageBackend::set_progressive)
/// and honor it when encoding JPEG (progressive scans) or PNG (Adam7).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Interlace {
    #[default]
    None,
    /// Row interlacing, toggled directly on the raster (Rust backend).
    Line,
    /// Plane interlacing, as ImageMagick's `-interlace Plane`.
    Plane,
}

impl Interlace {
    pub fn is_progressive(self) -> bool {
        self != Interlace::None
    }
}

/// Where to anchor an image placed onto a larger canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Anchor {
    #[default]
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}
