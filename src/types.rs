//! Shared types passed between pipeline stages.
//!
//! [`RawImage`] and [`Variant`] live only for the duration of one run;
//! [`PersistedAsset`] and [`AssetDescriptor`] are what outlives it.

use crate::imaging::{BaseKind, Dimensions};
use crate::store::AssetId;
use serde::Serialize;

/// Key of the variant that stands for the source image itself.
pub const ORIG_KEY: &str = "orig";

/// An encoded image held fully in memory.
///
/// Immutable once produced. Handed from stage to stage by value; passthrough
/// variants get their own copy of the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub buffer: Vec<u8>,
    pub length: u64,
    pub width: u32,
    pub height: u32,
}

impl RawImage {
    pub fn new(buffer: Vec<u8>, dimensions: Dimensions) -> Self {
        Self {
            length: buffer.len() as u64,
            buffer,
            width: dimensions.width,
            height: dimensions.height,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// One derived image for a configured key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub key: String,
    pub image: RawImage,
    /// `tagged` is the stored content type; `decoded` is what the bytes are.
    pub kind: BaseKind,
}

/// The durable record of one stored variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistedAsset {
    pub key: String,
    pub id: AssetId,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
    pub length: u64,
}

/// One entry of [`AssetDescriptor::images`], in variant order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageEntry {
    /// Variant key. Entries are still ordered positionally like the
    /// configuration, so callers relying on position keep working.
    pub key: String,
    pub width: u32,
    pub height: u32,
    pub length: u64,
}

/// Result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetDescriptor {
    /// Identifier of the `orig` asset.
    pub id: AssetId,
    /// Byte length of the `orig` asset.
    pub size: u64,
    pub images: Vec<ImageEntry>,
}

impl AssetDescriptor {
    pub fn from_assets(orig_id: AssetId, assets: &[PersistedAsset]) -> Self {
        let size = assets
            .iter()
            .find(|a| a.key == ORIG_KEY)
            .map(|a| a.length)
            .unwrap_or_default();
        Self {
            id: orig_id,
            size,
            images: assets
                .iter()
                .map(|a| ImageEntry {
                    key: a.key.clone(),
                    width: a.width,
                    height: a.height,
                    length: a.length,
                })
                .collect(),
        }
    }

    /// Look up an entry by variant key.
    pub fn image(&self, key: &str) -> Option<&ImageEntry> {
        self.images.iter().find(|e| e.key == key)
    }
}
