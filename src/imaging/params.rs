//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which applies the skip/resize/crop policy) and the
//! [`backend`](super::backend) (which does the actual pixel work). This
//! separation allows swapping the filter engine (e.g. for testing with a
//! mock) without changing policy logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`Sharpening`]: Unsharp-mask parameters (sigma + threshold).
//! - [`FrameSelection`]: Whether an animated source keeps all its frames.
//! - [`RenderParams`]: Full specification of one render: source, target box, encoding.

use super::backend::Dimensions;
use super::calculations::Geometry;
use crate::format::ImageKind;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Sharpening parameters for unsharp mask.
///
/// - `sigma`: Standard deviation of the Gaussian blur (higher = more sharpening)
/// - `threshold`: Minimum brightness difference to sharpen (0 = sharpen all pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub sigma: f32,
    pub threshold: i32,
}

impl Sharpening {
    /// Mild sharpening applied when a spec sets `unsharp`.
    pub fn light() -> Self {
        Self {
            sigma: 0.5,
            threshold: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSelection {
    /// Keep every frame of an animated source.
    All,
    /// Decode and encode the first frame only.
    First,
}

/// Parameters for one render: decode, downscale to fill, center crop, encode.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    pub source_kind: ImageKind,
    /// Dimensions probed from the source header.
    pub source_dimensions: Dimensions,
    pub output_kind: ImageKind,
    /// Final crop box. Equal to `source_dimensions` for pure conversions.
    pub target: Dimensions,
    /// Constraints `target` was computed from. Re-applied when orientation
    /// swaps the decoded axes relative to `source_dimensions`.
    pub geometry: Geometry,
    pub frames: FrameSelection,
    /// Only set for lossy photographic output.
    pub quality: Option<Quality>,
    /// Only set for lossy photographic output.
    pub sharpening: Option<Sharpening>,
    /// Rotate/flip according to EXIF orientation before resizing.
    pub auto_orient: bool,
}
