//! # Previewer
//!
//! Derives a configurable set of preview images from one uploaded source
//! image and writes them to an asset store.
//!
//! # Architecture: Single Forward Pipeline
//!
//! ```text
//! 1. Load      Read    →  RawImage          (buffer, sniff format, probe dimensions)
//! 2. Plan      config  →  base per variant  (from → orig → source)
//! 3. Transform base    →  Variant           (skip / resize / crop / encode)
//! 4. Persist   Variant →  PersistedAsset    (orig id + `{id}_{key}` filenames)
//! ```
//!
//! Stages run strictly in order and any error aborts the run. Persistence
//! starts only after every variant exists, so a failed run never leaves
//! partial output behind. Within a run, variant derivation is sequential;
//! only the final store writes run concurrently.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`loader`] | Buffers the source stream and identifies it |
//! | [`planner`] | Resolves each variant's base and drives the transforms |
//! | [`imaging`] | Geometry, render parameters and the pure-Rust filter engine |
//! | [`persist`] | Asset naming and concurrent store writes |
//! | [`pipeline`] | `derive_previews`, the end-to-end entry point |
//! | [`store`] | The [`store::AssetStore`] seam and the directory-backed store |
//! | [`config`] | `previewer.toml` loading and validation |
//! | [`format`] | Supported image formats and their content types |
//! | [`types`] | Images and results passed between stages |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Resize to Cover, Then Crop
//!
//! A variant with both `width` and `height` set always comes out at exactly
//! that size (when the base is large enough). The base is scaled down until
//! it covers the target box, then center-cropped. Images are never scaled
//! up; a base smaller than the target is only cropped.
//!
//! ## Passthrough Keeps Bytes
//!
//! Skipped and already-sized variants reuse the base bytes untouched and
//! keep the base format, even when a different `type` is configured.
//!
//! ## Explicit Store
//!
//! The store is a parameter of [`pipeline::derive_previews`]; there is no
//! global handle. Anything implementing [`store::AssetStore`] (and `Sync`)
//! can be used.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate for every codec and
//! Lanczos3 resampling, so there are no system dependencies to install.

pub mod config;
pub mod format;
pub mod imaging;
pub mod loader;
pub mod output;
pub mod persist;
pub mod pipeline;
pub mod planner;
pub mod store;
pub mod types;

pub use config::{PipelineConfig, VariantSpec};
pub use pipeline::{PipelineError, derive_previews};
pub use store::{AssetStore, FsStore};
pub use types::AssetDescriptor;
