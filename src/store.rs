//! Asset store seam.
//!
//! The pipeline only ever calls [`AssetStore::put`]. Stores must accept
//! concurrent writes to independent names without external locking; the
//! persister writes the variants of one run in parallel and batch mode runs
//! many pipelines against the same store.
//!
//! [`FsStore`] is the directory-backed implementation used by the CLI: each
//! asset becomes `<root>/<name>` plus a `<name>.json` sidecar recording its
//! content type and length. Rewriting the same name overwrites, so a re-run
//! with the same timestamp is idempotent.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid asset name `{0}`")]
    InvalidName(String),
}

/// Identifier of a stored asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a written asset is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetName {
    /// Store under this exact identifier.
    Id(AssetId),
    /// Let the store assign an identifier, recording this filename.
    Filename(String),
}

/// Metadata accompanying one write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutParams {
    pub content_type: &'static str,
    pub name: AssetName,
}

pub trait AssetStore: Sync {
    /// Durably write `bytes` and return the asset's identifier.
    fn put(&self, bytes: &[u8], params: &PutParams) -> Result<AssetId, StoreError>;
}

/// Sidecar written next to every asset by [`FsStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMeta {
    pub content_type: String,
    pub length: u64,
}

/// Directory-backed asset store.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read back the sidecar of a stored asset.
    pub fn meta(&self, id: &AssetId) -> Result<AssetMeta, StoreError> {
        let content = fs::read_to_string(self.sidecar_path(id.as_str()))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn sidecar_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }
}

/// Names become file names, so they must stay inside the store root.
fn validate_name(name: &str) -> Result<(), StoreError> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if bad {
        Err(StoreError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

impl AssetStore for FsStore {
    fn put(&self, bytes: &[u8], params: &PutParams) -> Result<AssetId, StoreError> {
        let name = match &params.name {
            AssetName::Id(id) => id.as_str(),
            AssetName::Filename(filename) => filename.as_str(),
        };
        validate_name(name)?;

        fs::create_dir_all(&self.root)?;
        fs::write(self.root.join(name), bytes)?;
        let meta = AssetMeta {
            content_type: params.content_type.to_string(),
            length: bytes.len() as u64,
        };
        fs::write(self.sidecar_path(name), serde_json::to_string_pretty(&meta)?)?;

        Ok(AssetId::new(name))
    }
}
