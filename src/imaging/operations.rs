//! High-level image operations.
//!
//! These functions combine calculations with backend execution. They take a
//! base image and a variant spec, decide between passthrough and render,
//! compute the render parameters, and call the filter engine.

use super::backend::{BackendError, Dimensions, FilterEngine};
use super::calculations::target_dimensions;
use super::params::{FrameSelection, Quality, RenderParams, Sharpening};
use crate::config::VariantSpec;
use crate::format::ImageKind;
use crate::types::RawImage;
use thiserror::Error;

/// A filter-engine failure while deriving one variant.
#[derive(Error, Debug)]
#[error("failed to derive variant `{key}`: {source}")]
pub struct TransformError {
    pub key: String,
    #[source]
    pub source: BackendError,
}

/// Get image format and dimensions using the backend.
pub fn get_dimensions(
    engine: &impl FilterEngine,
    bytes: &[u8],
    hint: Option<ImageKind>,
) -> Result<(ImageKind, (u32, u32)), BackendError> {
    let identified = engine.identify(bytes, hint)?;
    Ok((identified.kind, identified.dimensions.as_tuple()))
}

/// The formats a base image carries into planning.
///
/// They differ only for the raw source when `ext` names another format
/// than the one sniffed from its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseKind {
    /// Format of the bytes; drives decoding.
    pub decoded: ImageKind,
    /// Default output type, and the type passthroughs are tagged with.
    pub tagged: ImageKind,
}

impl BaseKind {
    pub fn new(decoded: ImageKind, tagged: ImageKind) -> Self {
        Self { decoded, tagged }
    }
}

impl From<ImageKind> for BaseKind {
    fn from(kind: ImageKind) -> Self {
        Self::new(kind, kind)
    }
}

/// How a preview was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewAction {
    /// Base smaller than `skip_size`: returned untouched.
    SkippedBySize,
    /// Base already has the target dimensions: returned untouched.
    AlreadySized,
    /// Decoded, resized/cropped and re-encoded by the engine.
    Rendered,
}

/// Outcome of planning a preview, before any pixel work.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewPlan {
    Passthrough(PreviewAction),
    Render(RenderParams),
}

/// A derived image with the format it is tagged with.
#[derive(Debug, Clone)]
pub struct Preview {
    pub image: RawImage,
    pub kind: BaseKind,
    pub action: PreviewAction,
}

/// Plan a preview without executing it.
///
/// Applies, in order: skip-by-size, output type, frame selection, target
/// geometry and the already-sized early exit. Quality, sharpening and
/// auto-orientation are only requested for lossy photographic output.
pub fn plan_preview(
    base: &RawImage,
    base_kind: impl Into<BaseKind>,
    spec: &VariantSpec,
) -> PreviewPlan {
    let base_kind = base_kind.into();
    if let Some(skip_size) = spec.skip_size
        && base.length < skip_size
    {
        return PreviewPlan::Passthrough(PreviewAction::SkippedBySize);
    }

    let output_kind = spec.kind.unwrap_or(base_kind.tagged);

    let frames = if base_kind.decoded.is_animated() && spec.gif_animation == Some(false) {
        FrameSelection::First
    } else {
        FrameSelection::All
    };

    let base_dims = base.dimensions();
    let geometry = spec.geometry();
    let target = target_dimensions(base_dims, &geometry);
    match target {
        Some(t) if t == base_dims => return PreviewPlan::Passthrough(PreviewAction::AlreadySized),
        None if output_kind == base_kind.decoded && frames == FrameSelection::All => {
            return PreviewPlan::Passthrough(PreviewAction::AlreadySized);
        }
        _ => {}
    }

    let lossy = output_kind.is_lossy_photo();
    PreviewPlan::Render(RenderParams {
        source_kind: base_kind.decoded,
        source_dimensions: base_dims.into(),
        output_kind,
        target: Dimensions::from(target.unwrap_or(base_dims)),
        geometry,
        frames,
        quality: lossy.then(|| spec.jpeg_quality.map(Quality::new).unwrap_or_default()),
        sharpening: (lossy && spec.unsharp).then(Sharpening::light),
        auto_orient: lossy,
    })
}

/// Create one preview from a base image.
///
/// Passthroughs return a copy of the base bytes tagged with the base type;
/// renders return the engine's output tagged with the output type.
pub fn create_preview(
    engine: &impl FilterEngine,
    key: &str,
    base: &RawImage,
    base_kind: impl Into<BaseKind>,
    spec: &VariantSpec,
) -> Result<Preview, TransformError> {
    let base_kind = base_kind.into();
    match plan_preview(base, base_kind, spec) {
        PreviewPlan::Passthrough(action) => Ok(Preview {
            image: base.clone(),
            kind: base_kind,
            action,
        }),
        PreviewPlan::Render(params) => {
            let rendered = engine
                .render(&base.buffer, &params)
                .map_err(|source| TransformError {
                    key: key.to_string(),
                    source,
                })?;
            Ok(Preview {
                image: RawImage::new(rendered.bytes, rendered.dimensions),
                kind: params.output_kind.into(),
                action: PreviewAction::Rendered,
            })
        }
    }
}
