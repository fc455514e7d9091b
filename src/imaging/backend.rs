//! Filter engine trait and shared types.
//!
//! The [`FilterEngine`] trait is the narrow contract the pipeline drives the
//! codec layer through: identify (format sniff + header probe) and render
//! (decode, frame select, downscale, crop, sharpen, encode).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. The pipeline never touches pixels itself.

use super::params::RenderParams;
use crate::format::ImageKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("unrecognised image format")]
    UnknownFormat,
    #[error("no codec for {0}")]
    Unsupported(ImageKind),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identified {
    pub kind: ImageKind,
    pub dimensions: Dimensions,
}

/// Encoded output of a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub dimensions: Dimensions,
}

/// Trait for image codec/filter engines.
///
/// Implementations must be `Sync`: batch mode shares one engine across
/// concurrently running pipelines.
pub trait FilterEngine: Sync {
    /// Sniff the format and read dimensions from the header, without a full
    /// decode. `hint` is used when the bytes carry no recognisable signature.
    fn identify(&self, bytes: &[u8], hint: Option<ImageKind>) -> Result<Identified, BackendError>;

    /// Execute one render and return the encoded bytes with their dimensions.
    fn render(&self, bytes: &[u8], params: &RenderParams) -> Result<Rendered, BackendError>;
}
