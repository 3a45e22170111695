//! Pure calculation functions for image dimensions and placement.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::Anchor;

/// Top-left position of an image placed onto a canvas.
///
/// The anchor picks the reference point on both the canvas and the image;
/// `(dx, dy)` then shift the image away from the anchored edge (towards the
/// center), which matches how offsets behave for every anchor except
/// `Center`, where they shift right/down.
///
/// # Examples
/// ```
/// # use imgpipe::imaging::{Anchor, calculations::anchor_position};
/// assert_eq!(anchor_position((100, 100), (40, 20), Anchor::TopLeft, 0, 0), (0, 0));
/// assert_eq!(anchor_position((100, 100), (40, 20), Anchor::Center, 0, 0), (30, 40));
/// assert_eq!(anchor_position((100, 100), (40, 20), Anchor::BottomRight, 5, 5), (55, 75));
/// ```
pub fn anchor_position(
    canvas: (u32, u32),
    image: (u32, u32),
    anchor: Anchor,
    dx: i64,
    dy: i64,
) -> (i64, i64) {
    let free_w = canvas.0 as i64 - image.0 as i64;
    let free_h = canvas.1 as i64 - image.1 as i64;

    let x = match anchor {
        Anchor::TopLeft | Anchor::Left | Anchor::BottomLeft => dx,
        Anchor::Top | Anchor::Center | Anchor::Bottom => free_w / 2 + dx,
        Anchor::TopRight | Anchor::Right | Anchor::BottomRight => free_w - dx,
    };
    let y = match anchor {
        Anchor::TopLeft | Anchor::Top | Anchor::TopRight => dy,
        Anchor::Left | Anchor::Center | Anchor::Right => free_h / 2 + dy,
        Anchor::BottomLeft | Anchor::Bottom | Anchor::BottomRight => free_h - dy,
    };
    (x, y)
}

/// Resolve requested width/height into a full target size.
///
/// A missing side is derived from the source aspect ratio. Returns `None`
/// when neither side is requested. Results are never smaller than 1px.
pub fn target_dimensions(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    let (w, h) = match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, (w as f64 * src_h as f64 / src_w as f64).round() as u32),
        (None, Some(h)) => ((h as f64 * src_w as f64 / src_h as f64).round() as u32, h),
        (None, None) => return None,
    };
    Some((w.max(1), h.max(1)))
}

/// Scale a size by a device pixel ratio, rounding to whole pixels.
pub fn apply_dpr(size: (u32, u32), dpr: f64) -> (u32, u32) {
    (
        ((size.0 as f64 * dpr).round() as u32).max(1),
        ((size.1 as f64 * dpr).round() as u32).max(1),
    )
}

/// Shrink a size proportionally so its area does not exceed `max_pixels`.
pub fn limit_dimensions(size: (u32, u32), max_pixels: u64) -> (u32, u32) {
    let area = size.0 as u64 * size.1 as u64;
    if area <= max_pixels {
        return size;
    }
    let scale = (max_pixels as f64 / area as f64).sqrt();
    (
        ((size.0 as f64 * scale).floor() as u32).max(1),
        ((size.1 as f64 * scale).floor() as u32).max(1),
    )
}

/// Whether a source already fits inside a bounding box.
pub fn fits_within(source: (u32, u32), bounds: (u32, u32)) -> bool {
    source.0 <= bounds.0 && source.1 <= bounds.1
}
