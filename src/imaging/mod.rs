//! Image processing in pure Rust, with no system dependencies.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` (header probe, no decode) |
//! | **Resize** | `resize_exact` with Lanczos3, downscale only |
//! | **Crop** | `crop_imm`, center gravity |
//! | **Encode** | JPEG / PNG / GIF / WebP / TIFF / BMP / AVIF encoders |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for preview geometry (unit testable)
//! - **Parameters**: Data structures describing a render
//! - **Backend**: [`FilterEngine`] trait + [`RustBackend`]
//! - **Operations**: The skip/resize/crop/encode policy combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, FilterEngine, Identified, Rendered};
pub use calculations::{
    CropRect, Geometry, center_crop, fill_down_dimensions, predict_output_dimensions,
    target_dimensions,
};
pub use operations::{
    BaseKind, Preview, PreviewAction, PreviewPlan, TransformError, create_preview,
    get_dimensions, plan_preview,
};
pub use params::{FrameSelection, Quality, RenderParams, Sharpening};
pub use rust_backend::RustBackend;
