//! Adam7-interlaced PNG writer.
//!
//! The `png` encoder behind the `image` crate only writes non-interlaced
//! images, so interlaced output is assembled here: the raster is split into
//! the seven Adam7 passes, each scanline is prefixed with filter type 0, the
//! concatenated passes are zlib-compressed into a single `IDAT`, and chunks
//! are framed with their CRC.
//!
//! Only 8-bit grayscale, grayscale+alpha, RGB and RGBA are written; other
//! color types are converted to RGB(A) first.

use super::backend::BackendError;
use image::DynamicImage;
use std::borrow::Cow;

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// `(x0, y0, dx, dy)` for each Adam7 pass.
const PASSES: [(u32, u32, u32, u32); 7] = [
    (0, 0, 8, 8),
    (4, 0, 8, 8),
    (0, 4, 4, 8),
    (2, 0, 4, 4),
    (0, 2, 2, 4),
    (1, 0, 2, 2),
    (0, 1, 1, 2),
];

const COMPRESSION_LEVEL: u8 = 6;

/// Encode an image as an Adam7-interlaced PNG.
pub fn encode_interlaced_png(image: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let (color_type, channels, raster): (u8, usize, Cow<'_, [u8]>) = match image {
        DynamicImage::ImageLuma8(img) => (0, 1, Cow::Borrowed(img.as_raw())),
        DynamicImage::ImageLumaA8(img) => (4, 2, Cow::Borrowed(img.as_raw())),
        DynamicImage::ImageRgb8(img) => (2, 3, Cow::Borrowed(img.as_raw())),
        DynamicImage::ImageRgba8(img) => (6, 4, Cow::Borrowed(img.as_raw())),
        other if other.color().has_alpha() => (6, 4, Cow::Owned(other.to_rgba8().into_raw())),
        other => (2, 3, Cow::Owned(other.to_rgb8().into_raw())),
    };
    let (width, height) = (image.width(), image.height());

    let scanlines = adam7_scanlines(&raster, width, height, channels);
    let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&scanlines, COMPRESSION_LEVEL);

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    // bit depth, color type, compression, filter method, interlace = Adam7
    ihdr.extend_from_slice(&[8, color_type, 0, 0, 1]);

    let mut out = Vec::with_capacity(compressed.len() + 64);
    out.extend_from_slice(&SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr)?;
    write_chunk(&mut out, b"IDAT", &compressed)?;
    write_chunk(&mut out, b"IEND", &[])?;
    Ok(out)
}

/// Size of a reduced image for one pass. Zero-sized passes are skipped.
pub(crate) fn pass_dimensions(pass: usize, width: u32, height: u32) -> (u32, u32) {
    let (x0, y0, dx, dy) = PASSES[pass];
    let span = |size: u32, start: u32, step: u32| {
        if size > start {
            (size - start).div_ceil(step)
        } else {
            0
        }
    };
    (span(width, x0, dx), span(height, y0, dy))
}

/// Filtered (type 0) scanlines of all seven passes, concatenated.
fn adam7_scanlines(raster: &[u8], width: u32, height: u32, channels: usize) -> Vec<u8> {
    let row_bytes = width as usize * channels;
    let mut data = Vec::with_capacity(raster.len() + height as usize * 7);

    for (pass, &(x0, y0, dx, dy)) in PASSES.iter().enumerate() {
        let (pass_w, pass_h) = pass_dimensions(pass, width, height);
        if pass_w == 0 || pass_h == 0 {
            continue;
        }
        for row in 0..pass_h {
            let y = (y0 + row * dy) as usize;
            data.push(0);
            for col in 0..pass_w {
                let x = (x0 + col * dx) as usize;
                let start = y * row_bytes + x * channels;
                data.extend_from_slice(&raster[start..start + channels]);
            }
        }
    }

    data
}

/// Chunk lengths are 32-bit on the wire.
fn chunk_length(len: usize) -> Result<u32, BackendError> {
    u32::try_from(len).map_err(|_| {
        BackendError::Unsupported(format!("PNG chunk of {len} bytes exceeds the 4 GiB limit"))
    })
}

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) -> Result<(), BackendError> {
    out.extend_from_slice(&chunk_length(data.len())?.to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    let mut crc = crc32fast::Hasher::new();
    crc.update(kind);
    crc.update(data);
    out.extend_from_slice(&crc.finalize().to_be_bytes());
    Ok(())
}

/// Whether PNG bytes declare Adam7 interlacing in their header.
pub fn is_interlaced_png(bytes: &[u8]) -> bool {
    // signature (8) + length (4) + "IHDR" (4) + 12 bytes into the IHDR payload
    bytes.len() > 28 && bytes[..8] == SIGNATURE && &bytes[12..16] == b"IHDR" && bytes[28] == 1
}

/// Whether JPEG bytes contain a progressive (SOF2) frame header.
pub fn is_progressive_jpeg(bytes: &[u8]) -> bool {
    if bytes.len() < 4 || bytes[..2] != [0xFF, 0xD8] {
        return false;
    }
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return false;
        }
        let marker = bytes[pos + 1];
        match marker {
            0xC2 => return true,
            // baseline / extended sequential / lossless frames, or start of scan
            0xC0 | 0xC1 | 0xC3 | 0xDA => return false,
            // fill byte
            0xFF => pos += 1,
            _ => {
                let len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
                pos += 2 + len;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{gradient_rgb, transparent_rgba};

    #[test]
    fn pass_dimensions_for_8x8() {
        let dims: Vec<_> = (0..7).map(|p| pass_dimensions(p, 8, 8)).collect();
        assert_eq!(
            dims,
            vec![(1, 1), (1, 1), (2, 1), (2, 2), (4, 2), (4, 4), (8, 4)]
        );
    }

    #[test]
    fn pass_dimensions_cover_every_pixel() {
        for (w, h) in [(1, 1), (3, 5), (8, 8), (13, 7), (33, 2)] {
            let total: u32 = (0..7)
                .map(|p| {
                    let (pw, ph) = pass_dimensions(p, w, h);
                    pw * ph
                })
                .sum();
            assert_eq!(total, w * h, "{w}x{h}");
        }
    }

    #[test]
    fn single_pixel_image_only_uses_first_pass() {
        assert_eq!(pass_dimensions(0, 1, 1), (1, 1));
        for pass in 1..7 {
            let (w, h) = pass_dimensions(pass, 1, 1);
            assert_eq!(w * h, 0);
        }
    }

    #[test]
    fn interlaced_rgb_decodes_to_same_pixels() {
        let source = gradient_rgb(13, 9);
        let bytes = encode_interlaced_png(&source).unwrap();

        assert!(is_interlaced_png(&bytes));
        let decoded = image::load_from_memory_with_format(&bytes, image::ImageFormat::Png).unwrap();
        assert_eq!(decoded.to_rgb8(), source.to_rgb8());
    }

    #[test]
    fn interlaced_rgba_keeps_alpha() {
        let source = transparent_rgba(10, 6);
        let bytes = encode_interlaced_png(&source).unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(decoded.color().has_alpha());
        assert_eq!(decoded.to_rgba8(), source.to_rgba8());
    }

    #[test]
    fn chunk_length_rejects_oversized_data() {
        assert_eq!(chunk_length(0).unwrap(), 0);
        assert_eq!(chunk_length(u32::MAX as usize).unwrap(), u32::MAX);
        if let Some(too_big) = (u32::MAX as usize).checked_add(1) {
            assert!(matches!(chunk_length(too_big), Err(BackendError::Unsupported(_))));
        }
    }

    #[test]
    fn sixteen_bit_input_is_written_as_eight_bit() {
        let source = DynamicImage::ImageRgb16(gradient_rgb(4, 4).to_rgb16());
        let bytes = encode_interlaced_png(&source).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.to_rgb8(), source.to_rgb8());
    }

    #[test]
    fn non_interlaced_png_is_detected() {
        let mut buf = std::io::Cursor::new(Vec::new());
        gradient_rgb(4, 4)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        assert!(!is_interlaced_png(buf.get_ref()));
    }

    #[test]
    fn progressive_detection_rejects_garbage() {
        assert!(!is_progressive_jpeg(b"not a jpeg"));
        assert!(!is_progressive_jpeg(&[]));
    }
}
