//! End-to-end preview derivation.
//!
//! ```text
//! read_image ──▶ build_previews ──▶ save_images ──▶ AssetDescriptor
//!   (loader)       (planner)          (persist)
//! ```
//!
//! Each stage runs to completion before the next starts and any error
//! aborts the run. Because persistence is last, a decode or transform
//! failure never reaches the store.

use crate::config::{ConfigError, PipelineConfig};
use crate::imaging::{FilterEngine, RustBackend, TransformError};
use crate::loader::{DecodeError, read_image};
use crate::persist::{PersistError, save_images};
use crate::planner::{Previews, build_previews};
use crate::store::AssetStore;
use crate::types::AssetDescriptor;
use std::io::Read;
use std::time::SystemTime;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Derive and store every configured variant of `source`.
///
/// `date` seeds the `orig` identifier, so the same source and date always
/// land under the same names.
pub fn derive_previews(
    source: impl Read,
    config: &PipelineConfig,
    date: SystemTime,
    store: &impl AssetStore,
) -> Result<AssetDescriptor, PipelineError> {
    derive_previews_with_engine(&RustBackend::new(), source, config, date, store)
}

/// [`derive_previews`] with an explicit filter engine (allows testing with mock).
pub fn derive_previews_with_engine(
    engine: &impl FilterEngine,
    source: impl Read,
    config: &PipelineConfig,
    date: SystemTime,
    store: &impl AssetStore,
) -> Result<AssetDescriptor, PipelineError> {
    config.validate()?;

    let previews = derive_in_memory(engine, source, config)?;
    let saved = save_images(store, &previews, date, config.store.concurrency)?;
    let descriptor = AssetDescriptor::from_assets(saved.orig_id, &saved.assets);

    info!(
        id = %descriptor.id,
        size = descriptor.size,
        variants = descriptor.images.len(),
        "stored previews"
    );
    Ok(descriptor)
}

/// Load and derive without persisting.
pub fn derive_in_memory(
    engine: &impl FilterEngine,
    source: impl Read,
    config: &PipelineConfig,
) -> Result<Previews, PipelineError> {
    let loaded = read_image(engine, source, config.ext, &config.limits)?;
    Ok(build_previews(engine, loaded, config)?)
}
