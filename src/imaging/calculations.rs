//! Pure calculation functions for preview geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//! Arithmetic is done in `u64` so `width * height` products cannot overflow.

/// Which dimensions a variant spec constrains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Geometry {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
}

/// Center-gravity crop rectangle inside a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// `floor(numerator_side * target / denominator_side)`, the other edge of an
/// aspect-preserving scale. Never below one pixel.
fn proportional(numerator_side: u32, target: u32, denominator_side: u32) -> u32 {
    let scaled = (numerator_side as u64 * target as u64)
        .checked_div(denominator_side as u64)
        .unwrap_or(0);
    scaled.clamp(1, u32::MAX as u64) as u32
}

/// Calculate the target `(width, height)` of a variant.
///
/// - Height only: the width follows the source aspect ratio, clamped down to
///   `max_width` when that is smaller.
/// - Width only: symmetric, clamped by `max_height`.
/// - Both: exactly `(width, height)`.
/// - Neither: `None`, the variant keeps the base dimensions.
///
/// # Examples
/// ```
/// # use previewer::imaging::{Geometry, target_dimensions};
/// let spec = Geometry { height: Some(300), ..Geometry::default() };
/// assert_eq!(target_dimensions((1600, 1200), &spec), Some((400, 300)));
/// ```
pub fn target_dimensions(base: (u32, u32), geometry: &Geometry) -> Option<(u32, u32)> {
    let (base_w, base_h) = base;

    match (geometry.width, geometry.height) {
        (None, Some(height)) => {
            let proportional_width = proportional(base_w, height, base_h);
            let width = match geometry.max_width {
                Some(max) if max < proportional_width => max,
                _ => proportional_width,
            };
            Some((width, height))
        }
        (Some(width), None) => {
            let proportional_height = proportional(base_h, width, base_w);
            let height = match geometry.max_height {
                Some(max) if max < proportional_height => max,
                _ => proportional_height,
            };
            Some((width, height))
        }
        (Some(width), Some(height)) => Some((width, height)),
        (None, None) => None,
    }
}

/// Calculate the dimensions to downscale to before cropping.
///
/// Returns the smallest aspect-preserving size that still covers `target`
/// on both axes (one edge matches exactly, the other may exceed), or `None`
/// when that size is not smaller than the source. Images are never
/// upscaled. For a height-only target this is exactly "resize to the target
/// height".
pub fn fill_down_dimensions(source: (u32, u32), target: (u32, u32)) -> Option<(u32, u32)> {
    let (src_w, src_h) = (source.0 as u64, source.1 as u64);
    let (tgt_w, tgt_h) = (target.0 as u64, target.1 as u64);

    if src_w == 0 || src_h == 0 || tgt_w == 0 || tgt_h == 0 {
        return None;
    }

    let (w, h) = if src_w * tgt_h >= tgt_w * src_h {
        // Source is wider (or same aspect): height matches, width exceeds
        ((src_w * tgt_h).div_ceil(src_h).max(tgt_w), tgt_h)
    } else {
        // Source is taller: width matches, height exceeds
        (tgt_w, (src_h * tgt_w).div_ceil(src_w).max(tgt_h))
    };

    if h < src_h { Some((w as u32, h as u32)) } else { None }
}

/// Calculate a center-gravity crop of `target` inside `source`.
///
/// Margins are symmetric on each axis. A target larger than the source on
/// an axis is clamped to the source, so the crop never extends past the
/// image.
pub fn center_crop(source: (u32, u32), target: (u32, u32)) -> CropRect {
    let width = target.0.min(source.0);
    let height = target.1.min(source.1);
    CropRect {
        x: (source.0 - width) / 2,
        y: (source.1 - height) / 2,
        width,
        height,
    }
}

/// Predict the final dimensions of a render: downscale to fill, then crop.
pub fn predict_output_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    if source == target {
        return source;
    }
    let resized = fill_down_dimensions(source, target).unwrap_or(source);
    let crop = center_crop(resized, target);
    (crop.width, crop.height)
}
