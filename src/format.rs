//! Image formats understood by the pipeline.
//!
//! [`ImageKind`] is the format vocabulary used in configuration (`ext`,
//! `type`), in variant tagging, and for the content type attached to each
//! stored asset. It maps one-to-one onto the subset of
//! [`image::ImageFormat`] whose codecs are compiled in.

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
    Gif,
    Webp,
    #[serde(alias = "tif")]
    Tiff,
    Bmp,
    Avif,
}

impl ImageKind {
    pub const ALL: [ImageKind; 7] = [
        ImageKind::Jpeg,
        ImageKind::Png,
        ImageKind::Gif,
        ImageKind::Webp,
        ImageKind::Tiff,
        ImageKind::Bmp,
        ImageKind::Avif,
    ];

    /// Canonical lowercase name, as written in config files.
    pub fn name(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpeg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::Webp => "webp",
            ImageKind::Tiff => "tiff",
            ImageKind::Bmp => "bmp",
            ImageKind::Avif => "avif",
        }
    }

    /// MIME type stored alongside each asset.
    pub fn content_type(self) -> &'static str {
        self.to_image_format().to_mime_type()
    }

    pub fn to_image_format(self) -> ImageFormat {
        match self {
            ImageKind::Jpeg => ImageFormat::Jpeg,
            ImageKind::Png => ImageFormat::Png,
            ImageKind::Gif => ImageFormat::Gif,
            ImageKind::Webp => ImageFormat::WebP,
            ImageKind::Tiff => ImageFormat::Tiff,
            ImageKind::Bmp => ImageFormat::Bmp,
            ImageKind::Avif => ImageFormat::Avif,
        }
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            ImageFormat::Png => Some(ImageKind::Png),
            ImageFormat::Gif => Some(ImageKind::Gif),
            ImageFormat::WebP => Some(ImageKind::Webp),
            ImageFormat::Tiff => Some(ImageKind::Tiff),
            ImageFormat::Bmp => Some(ImageKind::Bmp),
            ImageFormat::Avif => Some(ImageKind::Avif),
            _ => None,
        }
    }

    /// Formats that may carry more than one frame.
    pub fn is_animated(self) -> bool {
        matches!(self, ImageKind::Gif)
    }

    /// The lossy photographic format: the only one that honours
    /// `jpeg_quality`, `unsharp` and EXIF auto-orientation.
    pub fn is_lossy_photo(self) -> bool {
        matches!(self, ImageKind::Jpeg)
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown image format `{0}`")]
pub struct UnknownKind(pub String);

impl FromStr for ImageKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(ImageKind::Jpeg),
            "png" => Ok(ImageKind::Png),
            "gif" => Ok(ImageKind::Gif),
            "webp" => Ok(ImageKind::Webp),
            "tiff" | "tif" => Ok(ImageKind::Tiff),
            "bmp" => Ok(ImageKind::Bmp),
            "avif" => Ok(ImageKind::Avif),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}
