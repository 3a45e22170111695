//! Output formats and the format/media-type table.
//!
//! Request parameters name formats by short key (`fm=webp`). Every key maps
//! to exactly one media type, but the mapping is not injective: `jpg` and
//! `pjpg` both produce `image/jpeg`. `pjpg` is "progressive JPEG", realized
//! by interlacing a regular JPEG encode rather than by a separate codec.
//!
//! | Key | Media type |
//! |---|---|
//! | `avif` | `image/avif` |
//! | `gif` | `image/gif` |
//! | `jpg` | `image/jpeg` |
//! | `pjpg` | `image/jpeg` |
//! | `png` | `image/png` |
//! | `webp` | `image/webp` |
//! | `tiff` | `image/tiff` |

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Avif,
    Gif,
    Jpg,
    Pjpg,
    Png,
    Webp,
    Tiff,
}

/// The supported-format table, in lookup order.
///
/// Reverse lookups by media type return the first match, so `image/jpeg`
/// resolves to `jpg`, never `pjpg`.
pub const SUPPORTED_FORMATS: &[(OutputFormat, &str, &str)] = &[
    (OutputFormat::Avif, "avif", "image/avif"),
    (OutputFormat::Gif, "gif", "image/gif"),
    (OutputFormat::Jpg, "jpg", "image/jpeg"),
    (OutputFormat::Pjpg, "pjpg", "image/jpeg"),
    (OutputFormat::Png, "png", "image/png"),
    (OutputFormat::Webp, "webp", "image/webp"),
    (OutputFormat::Tiff, "tiff", "image/tiff"),
];

impl OutputFormat {
    /// Look up a format by its parameter key. Keys are case-sensitive.
    pub fn from_key(key: &str) -> Option<Self> {
        SUPPORTED_FORMATS
            .iter()
            .find(|(_, k, _)| *k == key)
            .map(|(format, _, _)| *format)
    }

    /// Reverse lookup: the first format whose media type matches.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        SUPPORTED_FORMATS
            .iter()
            .find(|(_, _, mime)| *mime == media_type)
            .map(|(format, _, _)| *format)
    }

    pub fn key(self) -> &'static str {
        self.entry().1
    }

    pub fn media_type(self) -> &'static str {
        self.entry().2
    }

    /// File extension for output files. Progressive JPEG is still a `.jpg`.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pjpg => "jpg",
            other => other.key(),
        }
    }

    fn entry(self) -> &'static (OutputFormat, &'static str, &'static str) {
        SUPPORTED_FORMATS
            .iter()
            .find(|(format, _, _)| *format == self)
            .expect("every OutputFormat variant has a table entry")
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
