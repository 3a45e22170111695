//! Output format, quality and interlacing.
//!
//! `Encode` is normally the last stage of a chain. It decides the output
//! format and quality, re-encodes the image through the backend, and reads
//! the result back so later consumers see an image tagged with the new media
//! type. Serialization to the caller's bytes still happens once, in
//! [`Api::run`](crate::api::Api::run).
//!
//! ## Format resolution
//!
//! 1. `fm`, if it is a key of [`SUPPORTED_FORMATS`](crate::imaging::SUPPORTED_FORMATS)
//!    (case-sensitive).
//! 2. Otherwise the format whose media type matches the image's origin.
//! 3. Otherwise `jpg`.
//!
//! ## Post-processing
//!
//! | Format | Flatten onto white | Interlace | Encoded as |
//! |---|---|---|---|
//! | `jpg` | yes | no | `jpg` |
//! | `pjpg` | yes | yes | `jpg` |
//! | `png` | no | yes | `png` |
//! | others | no | no | as requested |

use super::{Manipulator, ManipulatorError};
use crate::imaging::{Image, ImageBackend, OutputFormat, Quality, WHITE};
use crate::params::ParameterSet;

pub const NAME: &str = "encode";

/// Format key parameter.
pub const FORMAT_KEY: &str = "fm";
/// Quality parameter.
pub const QUALITY_KEY: &str = "q";

#[derive(Debug, Clone, Copy, Default)]
pub struct Encode;

impl Encode {
    /// Resolve the output format for `image`. Never fails.
    pub fn format(image: &Image, params: &ParameterSet) -> OutputFormat {
        params
            .get(FORMAT_KEY)
            .and_then(OutputFormat::from_key)
            .or_else(|| image.media_type().and_then(OutputFormat::from_media_type))
            .unwrap_or(OutputFormat::Jpg)
    }

    /// Resolve the output quality. Never fails; bad values become 90.
    pub fn quality(params: &ParameterSet) -> Quality {
        Quality::from_param(params.get(QUALITY_KEY))
    }
}

impl Manipulator for Encode {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run(
        &self,
        image: Image,
        params: &ParameterSet,
        backend: &dyn ImageBackend,
    ) -> Result<Image, ManipulatorError> {
        let requested = Self::format(&image, params);
        let quality = Self::quality(params);

        let image = match requested {
            OutputFormat::Jpg | OutputFormat::Pjpg => image.flatten(WHITE),
            _ => image,
        };

        let interlace = matches!(requested, OutputFormat::Png | OutputFormat::Pjpg);
        let format = match requested {
            OutputFormat::Pjpg => OutputFormat::Jpg,
            other => other,
        };

        tracing::debug!(
            requested = %requested,
            format = %format,
            quality = quality.value(),
            interlace,
            "Encoding"
        );

        let bytes = backend.encode(&image, format, quality)?;
        let mut encoded = backend.decode(&bytes)?.with_quality(quality);
        if interlace {
            backend.set_progressive(&mut encoded);
        }
        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{Interlace, RustBackend};
    use crate::test_helpers::transparent_rgba;

    fn image_of(media_type: Option<&'static str>) -> Image {
        Image::new(transparent_rgba(4, 4), media_type)
    }

    fn params(pairs: &[(&str, &str)]) -> ParameterSet {
        pairs.iter().copied().collect()
    }

    // =========================================================================
    // Format resolution
    // =========================================================================

    #[test]
    fn explicit_format_wins_over_media_type() {
        let image = image_of(Some("image/png"));
        assert_eq!(
            Encode::format(&image, &params(&[("fm", "webp")])),
            OutputFormat::Webp
        );
    }

    #[test]
    fn every_table_key_is_accepted() {
        let image = image_of(None);
        for &(format, key, _) in crate::imaging::SUPPORTED_FORMATS {
            assert_eq!(Encode::format(&image, &params(&[("fm", key)])), format);
        }
    }

    #[test]
    fn falls_back_to_source_media_type() {
        let image = image_of(Some("image/png"));
        assert_eq!(Encode::format(&image, &ParameterSet::new()), OutputFormat::Png);
        assert_eq!(
            Encode::format(&image, &params(&[("fm", "bmp")])),
            OutputFormat::Png
        );
    }

    #[test]
    fn jpeg_media_type_maps_to_plain_jpg() {
        let image = image_of(Some("image/jpeg"));
        assert_eq!(Encode::format(&image, &ParameterSet::new()), OutputFormat::Jpg);
    }

    #[test]
    fn unknown_everything_defaults_to_jpg() {
        assert_eq!(
            Encode::format(&image_of(None), &ParameterSet::new()),
            OutputFormat::Jpg
        );
        assert_eq!(
            Encode::format(&image_of(Some("image/x-icon")), &params(&[("fm", "ico")])),
            OutputFormat::Jpg
        );
    }

    #[test]
    fn format_key_is_case_sensitive() {
        let image = image_of(Some("image/gif"));
        assert_eq!(
            Encode::format(&image, &params(&[("fm", "WEBP")])),
            OutputFormat::Gif
        );
    }

    // =========================================================================
    // Quality resolution
    // =========================================================================

    #[test]
    fn quality_resolution() {
        let q = |raw: &str| Encode::quality(&params(&[("q", raw)])).value();
        assert_eq!(q("50"), 50);
        assert_eq!(q("0"), 0);
        assert_eq!(q("100"), 100);
        assert_eq!(q("150"), 90);
        assert_eq!(q("abc"), 90);
        assert_eq!(q("-5"), 90);
        assert_eq!(q("42.7"), 42);
        assert_eq!(Encode::quality(&ParameterSet::new()).value(), 90);
    }

    // =========================================================================
    // run() against the recording backend
    // =========================================================================

    #[test]
    fn pjpg_encodes_as_flattened_jpg_then_interlaces() {
        let backend = MockBackend::new();
        let result = Encode
            .run(image_of(Some("image/png")), &params(&[("fm", "pjpg")]), &backend)
            .unwrap();

        assert_eq!(
            backend.get_operations(),
            vec![
                RecordedOp::Encode {
                    format: OutputFormat::Jpg,
                    quality: 90,
                    interlace: Interlace::None,
                    has_alpha: false,
                },
                RecordedOp::Decode(3),
                RecordedOp::SetProgressive,
            ]
        );
        assert_eq!(result.media_type(), Some("image/jpeg"));
        assert!(result.interlace().is_progressive());
        assert_eq!(result.quality(), Some(Quality::DEFAULT));
    }

    #[test]
    fn png_keeps_alpha_and_interlaces() {
        let backend = MockBackend::new();
        let result = Encode
            .run(image_of(Some("image/png")), &ParameterSet::new(), &backend)
            .unwrap();

        assert!(matches!(
            backend.encodes()[0],
            RecordedOp::Encode {
                format: OutputFormat::Png,
                has_alpha: true,
                ..
            }
        ));
        assert!(backend.get_operations().contains(&RecordedOp::SetProgressive));
        assert_eq!(result.media_type(), Some("image/png"));
    }

    #[test]
    fn webp_is_neither_flattened_nor_interlaced() {
        let backend = MockBackend::new();
        let result = Encode
            .run(
                image_of(Some("image/png")),
                &params(&[("fm", "webp"), ("q", "75")]),
                &backend,
            )
            .unwrap();

        assert_eq!(
            backend.encodes(),
            vec![RecordedOp::Encode {
                format: OutputFormat::Webp,
                quality: 75,
                interlace: Interlace::None,
                has_alpha: true,
            }]
        );
        assert!(!backend.get_operations().contains(&RecordedOp::SetProgressive));
        assert_eq!(result.media_type(), Some("image/webp"));
        assert_eq!(result.quality().map(Quality::value), Some(75));
    }

    #[test]
    fn plain_jpg_is_flattened_without_interlace() {
        let backend = MockBackend::new();
        let result = Encode
            .run(image_of(Some("image/gif")), &params(&[("fm", "jpg")]), &backend)
            .unwrap();

        assert!(matches!(
            backend.encodes()[0],
            RecordedOp::Encode {
                format: OutputFormat::Jpg,
                has_alpha: false,
                ..
            }
        ));
        assert!(!result.interlace().is_progressive());
    }

    #[test]
    fn backend_failures_propagate() {
        struct FailingBackend;
        impl ImageBackend for FailingBackend {
            fn kind(&self) -> crate::imaging::BackendKind {
                crate::imaging::BackendKind::Rust
            }
            fn decode(&self, _: &[u8]) -> Result<Image, crate::imaging::BackendError> {
                unreachable!("encode fails first")
            }
            fn encode(
                &self,
                _: &Image,
                format: OutputFormat,
                _: Quality,
            ) -> Result<Vec<u8>, crate::imaging::BackendError> {
                Err(crate::imaging::BackendError::Encode {
                    format,
                    message: "boom".into(),
                })
            }
            fn set_progressive(&self, _: &mut Image) {}
        }

        let result = Encode.run(image_of(None), &ParameterSet::new(), &FailingBackend);
        assert!(matches!(result, Err(ManipulatorError::Backend(_))));
    }

    // =========================================================================
    // run() against real pixels
    // =========================================================================

    #[test]
    fn jpg_round_trip_reports_jpeg_and_drops_alpha() {
        let backend = RustBackend::new();
        let result = Encode
            .run(image_of(Some("image/png")), &params(&[("fm", "jpg")]), &backend)
            .unwrap();

        assert_eq!(result.media_type(), Some("image/jpeg"));
        assert!(!result.has_alpha());
        assert_eq!(result.dimensions(), (4, 4));
    }

    #[test]
    fn png_round_trip_marks_line_interlace() {
        let backend = RustBackend::new();
        let result = Encode
            .run(image_of(Some("image/png")), &params(&[("fm", "png")]), &backend)
            .unwrap();

        assert_eq!(result.media_type(), Some("image/png"));
        assert_eq!(result.interlace(), Interlace::Line);
        assert!(result.has_alpha());
    }
}
