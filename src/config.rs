//! Pipeline configuration module.
//!
//! Handles loading and validating `previewer.toml`. Every key is optional;
//! missing sections fall back to stock defaults.
//!
//! ## Configuration Options
//!
//! ```toml
//! ext = "jpeg"              # Sniffing fallback; also the raw source's output type
//! strict_from = false       # Reject `from` keys that name no earlier variant
//!
//! [limits]
//! max_source_bytes = 52428800
//!
//! [store]
//! concurrency = 4           # Parallel asset writes per run
//!
//! [processing]
//! max_processes = 4         # Parallel runs in batch mode (omit for auto = CPU cores)
//!
//! [resize.orig]
//! width = 1280
//! skip_size = 1048576
//! type = "jpeg"
//!
//! [resize.md]
//! width = 640
//! max_height = 640
//!
//! [resize.sm]
//! from = "md"
//! width = 170
//! height = 150
//! jpeg_quality = 80
//! unsharp = true
//! ```
//!
//! ## Variant Order
//!
//! `[resize.*]` tables are processed in document order. A `from` may only
//! point at a key declared above it; anything else falls back to `orig`
//! (with a warning) or, with `strict_from = true`, fails validation.
//!
//! Declaring `[resize]` replaces the stock variants entirely rather than
//! merging with them. Unknown keys are rejected to catch typos early.

use crate::format::ImageKind;
use crate::imaging::Geometry;
use crate::types::ORIG_KEY;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `previewer.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Default source format, used when sniffing fails and as the type of
    /// the raw source for variants derived directly from it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<ImageKind>,
    /// Reject forward and unknown `from` references at load time.
    pub strict_from: bool,
    pub limits: LimitsConfig,
    pub store: StoreConfig,
    pub processing: ProcessingConfig,
    /// Variants to derive, in document order.
    pub resize: IndexMap<String, VariantSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ext: None,
            strict_from: false,
            limits: LimitsConfig::default(),
            store: StoreConfig::default(),
            processing: ProcessingConfig::default(),
            resize: default_resize(),
        }
    }
}

fn default_resize() -> IndexMap<String, VariantSpec> {
    let mut resize = IndexMap::new();
    resize.insert(
        ORIG_KEY.to_string(),
        VariantSpec {
            width: Some(1280),
            skip_size: Some(1024 * 1024),
            kind: Some(ImageKind::Jpeg),
            ..VariantSpec::default()
        },
    );
    resize.insert(
        "md".to_string(),
        VariantSpec {
            width: Some(640),
            max_height: Some(640),
            ..VariantSpec::default()
        },
    );
    resize.insert(
        "sm".to_string(),
        VariantSpec {
            from: Some("md".to_string()),
            width: Some(170),
            height: Some(150),
            jpeg_quality: Some(80),
            unsharp: true,
            ..VariantSpec::default()
        },
    );
    resize
}

/// How one variant is derived from its base image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VariantSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Upper bound on the computed width for height-only specs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    /// Upper bound on the computed height for width-only specs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    /// Output format. Defaults to the base image's format.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ImageKind>,
    /// Key of an earlier variant to use as the base image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Bases smaller than this many bytes are passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_size: Option<u64>,
    /// `false` keeps only the first frame of an animated GIF.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gif_animation: Option<bool>,
    /// JPEG quality, 1-100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jpeg_quality: Option<u32>,
    /// Apply a light unsharp mask before JPEG encoding.
    pub unsharp: bool,
}

impl VariantSpec {
    pub fn geometry(&self) -> Geometry {
        Geometry {
            width: self.width,
            height: self.height,
            max_width: self.max_width,
            max_height: self.max_height,
        }
    }

    fn validate(&self, key: &str) -> Result<(), ConfigError> {
        let dims = [
            ("width", self.width),
            ("height", self.height),
            ("max_width", self.max_width),
            ("max_height", self.max_height),
        ];
        for (name, value) in dims {
            if value == Some(0) {
                return Err(ConfigError::Validation(format!(
                    "resize.{key}.{name} must be non-zero"
                )));
            }
        }
        if let Some(q) = self.jpeg_quality
            && !(1..=100).contains(&q)
        {
            return Err(ConfigError::Validation(format!(
                "resize.{key}.jpeg_quality must be 1-100"
            )));
        }
        Ok(())
    }
}

/// Source size limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Sources larger than this are rejected before identification.
    pub max_source_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_source_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Asset store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Maximum number of concurrent writes within one run.
    pub concurrency: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of sources processed in parallel in batch mode.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Variant keys end up in asset filenames.
fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.concurrency == 0 {
            return Err(ConfigError::Validation(
                "store.concurrency must be non-zero".into(),
            ));
        }
        if self.limits.max_source_bytes == 0 {
            return Err(ConfigError::Validation(
                "limits.max_source_bytes must be non-zero".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be non-zero".into(),
            ));
        }
        for (key, spec) in &self.resize {
            if !valid_key(key) {
                return Err(ConfigError::Validation(format!(
                    "resize key `{key}` may only contain letters, digits, `_` and `-`"
                )));
            }
            spec.validate(key)?;
        }
        if self.strict_from {
            self.validate_from_references()?;
        }
        Ok(())
    }

    /// Every `from` must name a key declared earlier. The implicit `orig`
    /// counts as declared before everything when it is not configured.
    fn validate_from_references(&self) -> Result<(), ConfigError> {
        let implicit_orig = !self.resize.contains_key(ORIG_KEY);
        for (index, (key, spec)) in self.resize.iter().enumerate() {
            let Some(from) = &spec.from else { continue };
            if implicit_orig && from == ORIG_KEY {
                continue;
            }
            match self.resize.get_index_of(from.as_str()) {
                Some(target) if target < index => {}
                Some(_) => {
                    return Err(ConfigError::Validation(format!(
                        "resize.{key}.from refers to `{from}`, which is not declared before it"
                    )));
                }
                None => {
                    return Err(ConfigError::Validation(format!(
                        "resize.{key}.from refers to unknown variant `{from}`"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Parse and validate a config document.
pub fn parse_config(content: &str) -> Result<PipelineConfig, ConfigError> {
    let config: PipelineConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Returns a fully-commented stock `previewer.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Previewer Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# Source format to assume when magic bytes are inconclusive. Variants
# derived straight from the source with no `type` are written in this
# format. One of: jpeg, png, gif, webp, tiff, bmp. Omit to require
# sniffing and keep the sniffed format.
# ext = "jpeg"

# Reject `from` keys that name a variant not declared above them.
# When false, such variants fall back to `orig` and a warning is logged.
strict_from = false

# ---------------------------------------------------------------------------
# Limits
# ---------------------------------------------------------------------------
[limits]
# Sources larger than this many bytes are rejected.
max_source_bytes = 52428800

# ---------------------------------------------------------------------------
# Asset store
# ---------------------------------------------------------------------------
[store]
# Parallel asset writes within one run.
concurrency = 4

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum sources processed in parallel by `derive <dir>`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Variants, derived in the order they appear.
#
#   width / height      target box; both set = exact size, center crop
#   max_width           cap on computed width when only height is set
#   max_height          cap on computed height when only width is set
#   type                output format (default: same as base)
#   from                earlier variant to derive from (default: orig)
#   skip_size           pass bases smaller than this many bytes through
#   gif_animation       false = keep only the first GIF frame
#   jpeg_quality        1-100, JPEG output only (default 90)
#   unsharp             light sharpening, JPEG output only
# ---------------------------------------------------------------------------
[resize.orig]
width = 1280
skip_size = 1048576
type = "jpeg"

[resize.md]
width = 640
max_height = 640

[resize.sm]
from = "md"
width = 170
height = 150
jpeg_quality = 80
unsharp = true
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_has_stock_variants_in_order() {
        let config = PipelineConfig::default();
        let keys: Vec<&str> = config.resize.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["orig", "md", "sm"]);
        assert_eq!(config.resize["sm"].from.as_deref(), Some("md"));
        assert_eq!(config.store.concurrency, 4);
    }

    #[test]
    fn validate_default_config_passes() {
        PipelineConfig::default().validate().unwrap();
        PipelineConfig {
            strict_from: true,
            ..PipelineConfig::default()
        }
        .validate()
        .unwrap();
    }

    #[test]
    fn resize_keeps_document_order() {
        let config = parse_config(
            r#"
            [resize.zeta]
            width = 10

            [resize.alpha]
            width = 20

            [resize.mid]
            from = "zeta"
            height = 5
            "#,
        )
        .unwrap();
        let keys: Vec<&str> = config.resize.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn resize_section_replaces_defaults() {
        let config = parse_config("[resize.thumb]\nwidth = 100\n").unwrap();
        assert_eq!(config.resize.len(), 1);
        assert!(!config.resize.contains_key("orig"));
    }

    #[test]
    fn parse_all_variant_fields() {
        let config = parse_config(
            r#"
            ext = "png"
            [resize.a]
            width = 100
            height = 90
            max_width = 300
            max_height = 200
            type = "webp"
            from = "orig"
            skip_size = 4096
            gif_animation = false
            jpeg_quality = 60
            unsharp = true
            "#,
        )
        .unwrap();
        assert_eq!(config.ext, Some(ImageKind::Png));
        let spec = &config.resize["a"];
        assert_eq!(spec.kind, Some(ImageKind::Webp));
        assert_eq!(spec.gif_animation, Some(false));
        assert_eq!(spec.skip_size, Some(4096));
        assert_eq!(
            spec.geometry(),
            Geometry {
                width: Some(100),
                height: Some(90),
                max_width: Some(300),
                max_height: Some(200),
            }
        );
    }

    #[test]
    fn type_alias_jpg_accepted() {
        let config = parse_config("[resize.a]\nwidth = 1\ntype = \"jpg\"\n").unwrap();
        assert_eq!(config.resize["a"].kind, Some(ImageKind::Jpeg));
    }

    #[test]
    fn unknown_key_rejected() {
        let result = parse_config("[resize.a]\nwidht = 100\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_section_rejected() {
        let result = parse_config("[colors]\nbackground = \"#fff\"\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_type_rejected() {
        let result = parse_config("[resize.a]\ntype = \"svg\"\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn validate_zero_dimension() {
        let result = parse_config("[resize.a]\nheight = 0\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_quality_bounds() {
        assert!(parse_config("[resize.a]\njpeg_quality = 100\n").is_ok());
        assert!(parse_config("[resize.a]\njpeg_quality = 1\n").is_ok());
        assert!(matches!(
            parse_config("[resize.a]\njpeg_quality = 101\n"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            parse_config("[resize.a]\njpeg_quality = 0\n"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_concurrency_zero() {
        let result = parse_config("[store]\nconcurrency = 0\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_key_charset() {
        let result = parse_config("[resize.\"../x\"]\nwidth = 1\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn lenient_from_allows_forward_reference() {
        let content = "[resize.a]\nfrom = \"b\"\nwidth = 1\n[resize.b]\nwidth = 2\n";
        assert!(parse_config(content).is_ok());
    }

    #[test]
    fn strict_from_rejects_forward_reference() {
        let content =
            "strict_from = true\n[resize.a]\nfrom = \"b\"\nwidth = 1\n[resize.b]\nwidth = 2\n";
        let err = parse_config(content).unwrap_err();
        assert!(err.to_string().contains("not declared before"));
    }

    #[test]
    fn strict_from_rejects_self_reference() {
        let content = "strict_from = true\n[resize.a]\nfrom = \"a\"\nwidth = 1\n";
        assert!(matches!(
            parse_config(content),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn strict_from_rejects_unknown_reference() {
        let content = "strict_from = true\n[resize.a]\nfrom = \"nope\"\nwidth = 1\n";
        let err = parse_config(content).unwrap_err();
        assert!(err.to_string().contains("unknown variant `nope`"));
    }

    #[test]
    fn strict_from_accepts_implicit_orig() {
        let content = "strict_from = true\n[resize.a]\nfrom = \"orig\"\nwidth = 1\n";
        assert!(parse_config(content).is_ok());
    }

    #[test]
    fn load_config_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[store]\nconcurrency = 2").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.store.concurrency, 2);
        assert_eq!(config.resize.len(), 3);
    }

    #[test]
    fn load_config_missing_file_is_io_error() {
        let result = load_config(Path::new("/nonexistent/previewer.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn default_processing_config() {
        let config = ProcessingConfig::default();
        assert_eq!(config.max_processes, None);
    }

    #[test]
    fn effective_threads_auto() {
        let config = ProcessingConfig {
            max_processes: None,
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(100_000),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config = parse_config(stock_config_toml()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn default_config_serializes_and_parses_back() {
        let rendered = toml::to_string(&PipelineConfig::default()).unwrap();
        assert_eq!(parse_config(&rendered).unwrap(), PipelineConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in [
            "[limits]",
            "[store]",
            "[processing]",
            "[resize.orig]",
            "[resize.md]",
            "[resize.sm]",
        ] {
            assert!(content.contains(section), "{section}");
        }
    }
}
