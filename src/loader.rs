//! Source loading.
//!
//! Buffers the whole input stream, then asks the filter engine for the
//! format and dimensions. Nothing is decoded beyond the header here; pixel
//! work happens only when a variant actually needs rendering.

use crate::config::LimitsConfig;
use crate::format::ImageKind;
use crate::imaging::{BackendError, FilterEngine, get_dimensions};
use crate::types::RawImage;
use std::io::{self, Read};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("failed to read source: {0}")]
    Io(#[from] io::Error),
    #[error("source is empty")]
    Empty,
    #[error("source exceeds {max} bytes")]
    TooLarge { max: u64 },
    #[error("failed to identify source image: {0}")]
    Unidentified(#[source] BackendError),
}

/// A buffered source together with its detected format.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub image: RawImage,
    pub kind: ImageKind,
}

/// Read a source stream to completion and identify it.
///
/// `hint` is used only when the magic bytes are inconclusive.
pub fn read_image(
    engine: &impl FilterEngine,
    source: impl Read,
    hint: Option<ImageKind>,
    limits: &LimitsConfig,
) -> Result<LoadedSource, DecodeError> {
    let max = limits.max_source_bytes;
    let mut buffer = Vec::new();
    source.take(max.saturating_add(1)).read_to_end(&mut buffer)?;

    if buffer.is_empty() {
        return Err(DecodeError::Empty);
    }
    if buffer.len() as u64 > max {
        return Err(DecodeError::TooLarge { max });
    }

    let (kind, dimensions) =
        get_dimensions(engine, &buffer, hint).map_err(DecodeError::Unidentified)?;
    Ok(LoadedSource {
        image: RawImage::new(buffer, dimensions.into()),
        kind,
    })
}
