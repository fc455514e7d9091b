//! Asset persistence.
//!
//! Writes every variant of a finished run to the store. Runs only after all
//! variants exist, so a failed derivation never touches storage.
//!
//! ## Naming
//!
//! `orig` is stored under an identifier derived from the run timestamp:
//! 8 hex digits of the big-endian epoch seconds followed by 16 hex digits
//! of the SHA-256 of the millisecond timestamp. Re-running with the same
//! timestamp yields the same identifier. Every other variant is stored
//! under the filename `{orig_id}_{key}`.
//!
//! Writes are independent and run on the ambient rayon pool, at most
//! `store.concurrency` at a time. The first failure is returned and no
//! further batch is started; writes that already completed are left in
//! place.

use crate::planner::Previews;
use crate::store::{AssetId, AssetName, AssetStore, PutParams, StoreError};
use crate::types::{ORIG_KEY, PersistedAsset, Variant};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("no `orig` variant to persist")]
    MissingOrig,
    #[error("failed to store variant `{key}`: {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },
}

/// Identifier for the `orig` asset of a run started at `date`.
///
/// Timestamps before the epoch clamp to zero; seconds past `u32::MAX` wrap.
pub fn orig_asset_id(date: SystemTime) -> AssetId {
    let since_epoch = date.duration_since(UNIX_EPOCH).unwrap_or_default();
    let seconds = since_epoch.as_secs() as u32;
    let millis = since_epoch.as_millis() as u64;

    let digest = Sha256::digest(millis.to_be_bytes());
    let tail: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    AssetId::new(format!("{seconds:08x}{tail}"))
}

/// Filename of a non-`orig` variant.
pub fn variant_filename(orig_id: &AssetId, key: &str) -> String {
    format!("{orig_id}_{key}")
}

/// What a successful save produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedAssets {
    pub orig_id: AssetId,
    /// One entry per variant, in variant order.
    pub assets: Vec<PersistedAsset>,
}

fn put_variant(
    store: &impl AssetStore,
    orig_id: &AssetId,
    variant: &Variant,
) -> Result<PersistedAsset, PersistError> {
    let name = if variant.key == ORIG_KEY {
        AssetName::Id(orig_id.clone())
    } else {
        AssetName::Filename(variant_filename(orig_id, &variant.key))
    };
    let content_type = variant.kind.tagged.content_type();
    let params = PutParams { content_type, name };

    let id = store
        .put(&variant.image.buffer, &params)
        .map_err(|source| PersistError::Store {
            key: variant.key.clone(),
            source,
        })?;
    debug!(key = variant.key.as_str(), %id, content_type, "stored variant");

    Ok(PersistedAsset {
        key: variant.key.clone(),
        id,
        content_type,
        width: variant.image.width,
        height: variant.image.height,
        length: variant.image.length,
    })
}

/// Store every variant and return the `orig` identifier with per-variant records.
pub fn save_images(
    store: &impl AssetStore,
    previews: &Previews,
    date: SystemTime,
    concurrency: usize,
) -> Result<SavedAssets, PersistError> {
    if previews.orig().is_none() {
        return Err(PersistError::MissingOrig);
    }
    let orig_id = orig_asset_id(date);
    let variants: Vec<&Variant> = previews.iter().collect();

    let mut assets = Vec::with_capacity(variants.len());
    if concurrency <= 1 {
        for variant in &variants {
            assets.push(put_variant(store, &orig_id, variant)?);
        }
    } else {
        for batch in variants.chunks(concurrency) {
            let stored = batch
                .par_iter()
                .map(|variant| put_variant(store, &orig_id, variant))
                .collect::<Result<Vec<_>, _>>()?;
            assets.extend(stored);
        }
    }

    Ok(SavedAssets { orig_id, assets })
}
