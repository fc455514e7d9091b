//! Variant planning.
//!
//! Walks the configured variants in order and decides, for each one, which
//! image it is derived from:
//!
//! 1. the variant named by `from`, if it was already produced this run;
//! 2. otherwise `orig`, if it was already produced;
//! 3. otherwise the raw source, tagged with `ext` when one is configured.
//!
//! Nothing is reordered and cycles are not detected: a `from` that points
//! at a later or unknown key simply falls through to the next rule.
//!
//! When the configuration has no `orig` entry the raw source is registered
//! as `orig` before the first variant, so rule 2 always applies.
//!
//! [`build_previews`] runs the real derivation; [`plan_run`] replays the
//! same decisions on dimensions alone for the `plan` command.

use crate::config::{PipelineConfig, VariantSpec};
use crate::format::ImageKind;
use crate::imaging::{
    BaseKind, FilterEngine, PreviewAction, PreviewPlan, TransformError, create_preview,
    plan_preview, predict_output_dimensions,
};
use crate::loader::LoadedSource;
use crate::types::{ORIG_KEY, RawImage, Variant};
use indexmap::IndexMap;
use std::fmt;
use tracing::{debug, warn};

/// Where a variant's base image came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseSource {
    /// The variant named by `from`.
    Named(String),
    /// The `orig` variant.
    Orig,
    /// The buffered source itself.
    Raw,
}

impl fmt::Display for BaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseSource::Named(key) => f.write_str(key),
            BaseSource::Orig => f.write_str(ORIG_KEY),
            BaseSource::Raw => f.write_str("source"),
        }
    }
}

/// Lookup-with-fallback over the variants produced so far.
///
/// Returns `None` when the raw source should be used.
fn fallback<'a, T>(
    produced: &'a IndexMap<String, T>,
    key: &str,
    from: Option<&str>,
) -> Option<(BaseSource, &'a T)> {
    if let Some(from) = from {
        if let Some(base) = produced.get(from) {
            return Some((BaseSource::Named(from.to_string()), base));
        }
        warn!(key, from, "`from` names no earlier variant, falling back");
    }
    produced
        .get(ORIG_KEY)
        .map(|orig| (BaseSource::Orig, orig))
}

/// Variants produced during one run, in production order.
#[derive(Debug, Clone)]
pub struct Previews {
    raw: RawImage,
    raw_kind: BaseKind,
    variants: IndexMap<String, Variant>,
}

/// The raw source decodes as its sniffed format but is tagged with `ext`.
fn raw_kind(sniffed: ImageKind, config: &PipelineConfig) -> BaseKind {
    BaseKind::new(sniffed, config.ext.unwrap_or(sniffed))
}

impl Previews {
    /// Start a run from a loaded source.
    ///
    /// Seeds an implicit `orig` unless one is configured.
    pub fn new(source: LoadedSource, config: &PipelineConfig) -> Self {
        let raw_kind = raw_kind(source.kind, config);
        let mut variants = IndexMap::new();
        if !config.resize.contains_key(ORIG_KEY) {
            variants.insert(
                ORIG_KEY.to_string(),
                Variant {
                    key: ORIG_KEY.to_string(),
                    image: source.image.clone(),
                    kind: raw_kind,
                },
            );
        }
        Self {
            raw: source.image,
            raw_kind,
            variants,
        }
    }

    /// Pick the base image for `spec`.
    pub fn pick_base(&self, key: &str, spec: &VariantSpec) -> (BaseSource, &RawImage, BaseKind) {
        match fallback(&self.variants, key, spec.from.as_deref()) {
            Some((source, variant)) => (source, &variant.image, variant.kind),
            None => (BaseSource::Raw, &self.raw, self.raw_kind),
        }
    }

    pub fn insert(&mut self, variant: Variant) {
        self.variants.insert(variant.key.clone(), variant);
    }

    pub fn get(&self, key: &str) -> Option<&Variant> {
        self.variants.get(key)
    }

    pub fn orig(&self) -> Option<&Variant> {
        self.get(ORIG_KEY)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Variants in production order (implicit `orig` first).
    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.variants.values()
    }
}

/// Derive every configured variant, sequentially and in order.
///
/// Stops at the first engine failure; the partial set is dropped.
pub fn build_previews(
    engine: &impl FilterEngine,
    source: LoadedSource,
    config: &PipelineConfig,
) -> Result<Previews, TransformError> {
    let mut previews = Previews::new(source, config);

    for (key, spec) in &config.resize {
        let (base, base_image, base_kind) = previews.pick_base(key, spec);
        let preview = create_preview(engine, key, base_image, base_kind, spec)?;
        debug!(
            key = key.as_str(),
            %base,
            width = preview.image.width,
            height = preview.image.height,
            kind = %preview.kind.tagged,
            action = ?preview.action,
            "derived variant"
        );
        previews.insert(Variant {
            key: key.clone(),
            image: preview.image,
            kind: preview.kind,
        });
    }

    Ok(previews)
}

/// One row of a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedVariant {
    pub key: String,
    pub base: BaseSource,
    pub kind: ImageKind,
    pub width: u32,
    pub height: u32,
    /// `None` for the implicit `orig`, which is never planned.
    pub action: Option<PreviewAction>,
}

/// Replay the planning decisions for a source of known size without
/// touching pixels.
///
/// Derived variants have no known byte length before rendering, so
/// `skip_size` is evaluated against the source only.
pub fn plan_run(
    config: &PipelineConfig,
    kind: ImageKind,
    dimensions: (u32, u32),
    source_length: u64,
) -> Vec<PlannedVariant> {
    let raw = RawImage {
        buffer: Vec::new(),
        length: source_length,
        width: dimensions.0,
        height: dimensions.1,
    };
    let raw_kind = raw_kind(kind, config);
    let mut produced: IndexMap<String, (RawImage, BaseKind)> = IndexMap::new();
    let mut rows = Vec::new();

    if !config.resize.contains_key(ORIG_KEY) {
        produced.insert(ORIG_KEY.to_string(), (raw.clone(), raw_kind));
        rows.push(PlannedVariant {
            key: ORIG_KEY.to_string(),
            base: BaseSource::Raw,
            kind: raw_kind.tagged,
            width: raw.width,
            height: raw.height,
            action: None,
        });
    }

    for (key, spec) in &config.resize {
        let (base, (base_image, base_kind)) =
            match fallback(&produced, key, spec.from.as_deref()) {
                Some((source, entry)) => (source, entry.clone()),
                None => (BaseSource::Raw, (raw.clone(), raw_kind)),
            };

        let (action, out_kind, (width, height)) =
            match plan_preview(&base_image, base_kind, spec) {
                PreviewPlan::Passthrough(action) => {
                    (action, base_kind, base_image.dimensions())
                }
                PreviewPlan::Render(params) => (
                    PreviewAction::Rendered,
                    BaseKind::from(params.output_kind),
                    predict_output_dimensions(
                        params.source_dimensions.as_tuple(),
                        params.target.as_tuple(),
                    ),
                ),
            };

        let length = match action {
            PreviewAction::Rendered => u64::MAX,
            _ => base_image.length,
        };
        produced.insert(
            key.clone(),
            (
                RawImage {
                    buffer: Vec::new(),
                    length,
                    width,
                    height,
                },
                out_kind,
            ),
        );
        rows.push(PlannedVariant {
            key: key.clone(),
            base,
            kind: out_kind.tagged,
            width,
            height,
            action: Some(action),
        });
    }

    rows
}
