//! Pure Rust filter engine built on the `image` crate.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageReader::with_guessed_format` + `into_dimensions` (header only) |
//! | Decode (JPEG, PNG, GIF, WebP, TIFF, BMP) | `image` crate decoders |
//! | Auto-orient | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Animated GIF | `GifDecoder::into_frames` → per-frame fit → `GifEncoder::encode_frames` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Crop | `DynamicImage::crop_imm` (center gravity) |
//! | Sharpening | `DynamicImage::unsharpen` |
//! | Encode → AVIF | `AvifEncoder` (rav1e, speed 6, one worker thread) |
//!
//! Every step runs on the calling thread. The only encoder with its own
//! worker pool (rav1e) is pinned to a single thread, so concurrent pipeline
//! runs do not oversubscribe the CPU.

use super::backend::{BackendError, Dimensions, FilterEngine, Identified, Rendered};
use super::calculations::{center_crop, fill_down_dimensions, target_dimensions};
use super::params::{FrameSelection, Quality, RenderParams};
use crate::format::ImageKind;
use image::codecs::avif::AvifEncoder;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{AnimationDecoder, DynamicImage, Frame, ImageDecoder, ImageReader};
use std::io::Cursor;

/// rav1e speed preset: 6 trades a little size for reasonable throughput.
const AVIF_SPEED: u8 = 6;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a decoder for `kind` is compiled in.
///
/// AVIF is excluded: the `image` crate's `"avif"` feature only enables the
/// **encoder** (rav1e), yet `ImageFormat::reading_enabled()` reports `true`
/// for it, so that API cannot be relied on alone.
fn decodable(kind: ImageKind) -> bool {
    kind != ImageKind::Avif && kind.to_image_format().reading_enabled()
}

fn failed(context: &str, err: impl std::fmt::Display) -> BackendError {
    BackendError::ProcessingFailed(format!("{context}: {err}"))
}

fn reader_for(bytes: &[u8], kind: ImageKind) -> ImageReader<Cursor<&[u8]>> {
    let mut reader = ImageReader::new(Cursor::new(bytes));
    reader.set_format(kind.to_image_format());
    reader
}

/// Decode a single image, optionally applying its EXIF orientation.
///
/// For GIF sources this yields the first frame.
fn decode(bytes: &[u8], kind: ImageKind, auto_orient: bool) -> Result<DynamicImage, BackendError> {
    let mut decoder = reader_for(bytes, kind)
        .into_decoder()
        .map_err(|e| failed("Failed to open decoder", e))?;
    let orientation = if auto_orient {
        decoder.orientation().unwrap_or(Orientation::NoTransforms)
    } else {
        Orientation::NoTransforms
    };
    let mut img = DynamicImage::from_decoder(decoder)
        .map_err(|e| failed(&format!("Failed to decode {kind}"), e))?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// The crop box for a decoded image.
///
/// Planning sees header dimensions. When EXIF orientation turned the image
/// on its side, the box is recomputed from the upright dimensions.
fn oriented_target(img: &DynamicImage, params: &RenderParams) -> Dimensions {
    let decoded = (img.width(), img.height());
    if decoded == params.source_dimensions.as_tuple() {
        return params.target;
    }
    Dimensions::from(target_dimensions(decoded, &params.geometry).unwrap_or(decoded))
}

/// Downscale to fill `target` (never upscale), then center-crop to it.
fn fit(img: DynamicImage, target: Dimensions) -> DynamicImage {
    let img = match fill_down_dimensions((img.width(), img.height()), target.as_tuple()) {
        Some((w, h)) => img.resize_exact(w, h, FilterType::Lanczos3),
        None => img,
    };
    let crop = center_crop((img.width(), img.height()), target.as_tuple());
    if crop.width == img.width() && crop.height == img.height() {
        img
    } else {
        img.crop_imm(crop.x, crop.y, crop.width, crop.height)
    }
}

/// Encode a single frame in `kind`.
///
/// `quality` is honoured by JPEG only; AVIF uses the default quality.
fn encode(
    img: &DynamicImage,
    kind: ImageKind,
    quality: Option<Quality>,
) -> Result<Vec<u8>, BackendError> {
    let mut out = Cursor::new(Vec::new());
    let result = match kind {
        ImageKind::Jpeg => {
            let q = quality.unwrap_or_default().value() as u8;
            // JPEG has no alpha channel
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(JpegEncoder::new_with_quality(&mut out, q))
        }
        ImageKind::Webp => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_with_encoder(WebPEncoder::new_lossless(&mut out)),
        ImageKind::Gif => {
            let mut encoder = GifEncoder::new(&mut out);
            encoder.encode_frame(Frame::new(img.to_rgba8()))
        }
        ImageKind::Avif => {
            let encoder = AvifEncoder::new_with_speed_quality(
                &mut out,
                AVIF_SPEED,
                Quality::default().value() as u8,
            )
            .with_num_threads(Some(1));
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)
        }
        ImageKind::Bmp => {
            DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut out, kind.to_image_format())
        }
        ImageKind::Png | ImageKind::Tiff => img.write_to(&mut out, kind.to_image_format()),
    };
    result.map_err(|e| failed(&format!("{kind} encode failed"), e))?;
    Ok(out.into_inner())
}

/// Fit every frame of an animated GIF and re-encode it looping forever.
fn render_animation(bytes: &[u8], params: &RenderParams) -> Result<Rendered, BackendError> {
    let decoder =
        GifDecoder::new(Cursor::new(bytes)).map_err(|e| failed("Failed to open GIF", e))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| failed("Failed to decode GIF frames", e))?;

    let mut out = Vec::new();
    let mut dimensions = params.target;
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| failed("GIF encode failed", e))?;
        for frame in frames {
            let delay = frame.delay();
            let fitted = fit(DynamicImage::ImageRgba8(frame.into_buffer()), params.target);
            dimensions = Dimensions::new(fitted.width(), fitted.height());
            encoder
                .encode_frame(Frame::from_parts(fitted.to_rgba8(), 0, 0, delay))
                .map_err(|e| failed("GIF encode failed", e))?;
        }
    }

    Ok(Rendered {
        bytes: out,
        dimensions,
    })
}

impl FilterEngine for RustBackend {
    fn identify(&self, bytes: &[u8], hint: Option<ImageKind>) -> Result<Identified, BackendError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| failed("Failed to sniff format", e))?;
        let kind = reader
            .format()
            .and_then(ImageKind::from_image_format)
            .or(hint)
            .ok_or(BackendError::UnknownFormat)?;
        if !decodable(kind) {
            return Err(BackendError::Unsupported(kind));
        }

        let (width, height) = reader_for(bytes, kind)
            .into_dimensions()
            .map_err(|e| failed("Failed to read dimensions", e))?;
        Ok(Identified {
            kind,
            dimensions: Dimensions::new(width, height),
        })
    }

    fn render(&self, bytes: &[u8], params: &RenderParams) -> Result<Rendered, BackendError> {
        if !decodable(params.source_kind) {
            return Err(BackendError::Unsupported(params.source_kind));
        }

        let keep_animation = params.source_kind.is_animated()
            && params.output_kind == ImageKind::Gif
            && params.frames == FrameSelection::All;
        if keep_animation {
            return render_animation(bytes, params);
        }

        let img = decode(bytes, params.source_kind, params.auto_orient)?;
        let target = oriented_target(&img, params);
        let img = fit(img, target);
        let img = match params.sharpening {
            Some(s) => img.unsharpen(s.sigma, s.threshold),
            None => img,
        };

        Ok(Rendered {
            bytes: encode(&img, params.output_kind, params.quality)?,
            dimensions: Dimensions::new(img.width(), img.height()),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::imaging::calculations::Geometry;
    use crate::imaging::params::Sharpening;
    use image::{Delay, ImageFormat, Rgba, RgbaImage};

    /// Encode a gradient image of the given size in `kind`.
    pub(crate) fn synthetic(kind: ImageKind, width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        });
        encode(&DynamicImage::ImageRgba8(img), kind, Some(Quality::new(90))).unwrap()
    }

    /// Encode an animated GIF with `frames` solid-colour frames.
    pub(crate) fn animated_gif(width: u32, height: u32, frames: u8) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut out);
            encoder.set_repeat(Repeat::Infinite).unwrap();
            for i in 0..frames {
                let colour = Rgba([i * 60, 0, 255 - i * 60, 255]);
                let buffer = RgbaImage::from_pixel(width, height, colour);
                encoder
                    .encode_frame(Frame::from_parts(
                        buffer,
                        0,
                        0,
                        Delay::from_numer_denom_ms(100, 1),
                    ))
                    .unwrap();
            }
        }
        out
    }

    fn frame_count(gif: &[u8]) -> usize {
        GifDecoder::new(Cursor::new(gif))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap()
            .len()
    }

    fn params(
        source_kind: ImageKind,
        source: (u32, u32),
        output_kind: ImageKind,
        target: (u32, u32),
    ) -> RenderParams {
        RenderParams {
            source_kind,
            source_dimensions: source.into(),
            output_kind,
            target: target.into(),
            geometry: Geometry {
                width: Some(target.0),
                height: Some(target.1),
                ..Geometry::default()
            },
            frames: FrameSelection::All,
            quality: None,
            sharpening: None,
            auto_orient: false,
        }
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let bytes = synthetic(ImageKind::Jpeg, 200, 150);
        let identified = RustBackend::new().identify(&bytes, None).unwrap();
        assert_eq!(identified.kind, ImageKind::Jpeg);
        assert_eq!(identified.dimensions, Dimensions::new(200, 150));
    }

    #[test]
    fn identify_sniffs_content_over_hint() {
        let bytes = synthetic(ImageKind::Png, 64, 32);
        let identified = RustBackend::new()
            .identify(&bytes, Some(ImageKind::Jpeg))
            .unwrap();
        assert_eq!(identified.kind, ImageKind::Png);
    }

    #[test]
    fn identify_garbage_without_hint_is_unknown() {
        let result = RustBackend::new().identify(b"definitely not an image", None);
        assert!(matches!(result, Err(BackendError::UnknownFormat)));
    }

    #[test]
    fn identify_garbage_with_hint_fails_probe() {
        let result =
            RustBackend::new().identify(b"definitely not an image", Some(ImageKind::Png));
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }

    #[test]
    fn identify_avif_is_unsupported() {
        let bytes = synthetic(ImageKind::Avif, 16, 16);
        let result = RustBackend::new().identify(&bytes, None);
        assert!(matches!(result, Err(BackendError::Unsupported(ImageKind::Avif))));
    }

    #[test]
    fn render_fill_and_crop_exact_dimensions() {
        let bytes = synthetic(ImageKind::Png, 800, 600);
        let rendered = RustBackend::new()
            .render(&bytes, &params(ImageKind::Png, (800, 600), ImageKind::Png, (400, 500)))
            .unwrap();
        assert_eq!(rendered.dimensions, Dimensions::new(400, 500));

        let (w, h) = image::load_from_memory(&rendered.bytes).unwrap().into_rgba8().dimensions();
        assert_eq!((w, h), (400, 500));
    }

    #[test]
    fn render_portrait_source_exact_dimensions() {
        let bytes = synthetic(ImageKind::Jpeg, 600, 800);
        let rendered = RustBackend::new()
            .render(&bytes, &params(ImageKind::Jpeg, (600, 800), ImageKind::Jpeg, (170, 150)))
            .unwrap();
        assert_eq!(rendered.dimensions, Dimensions::new(170, 150));
    }

    #[test]
    fn render_never_upscales() {
        let bytes = synthetic(ImageKind::Png, 100, 80);
        let rendered = RustBackend::new()
            .render(&bytes, &params(ImageKind::Png, (100, 80), ImageKind::Png, (300, 300)))
            .unwrap();
        assert_eq!(rendered.dimensions, Dimensions::new(100, 80));
    }

    #[test]
    fn render_converts_format() {
        let bytes = synthetic(ImageKind::Png, 120, 90);
        let rendered = RustBackend::new()
            .render(&bytes, &params(ImageKind::Png, (120, 90), ImageKind::Webp, (120, 90)))
            .unwrap();
        // WebP files start with "RIFF"
        assert_eq!(&rendered.bytes[0..4], b"RIFF");
        assert_eq!(image::guess_format(&rendered.bytes).unwrap(), ImageFormat::WebP);
    }

    #[test]
    fn render_jpeg_quality_changes_size() {
        let bytes = synthetic(ImageKind::Png, 256, 256);
        let engine = RustBackend::new();
        let mut low = params(ImageKind::Png, (256, 256), ImageKind::Jpeg, (200, 200));
        low.quality = Some(Quality::new(10));
        let mut high = low.clone();
        high.quality = Some(Quality::new(95));

        let low = engine.render(&bytes, &low).unwrap();
        let high = engine.render(&bytes, &high).unwrap();
        assert!(low.bytes.len() < high.bytes.len());
    }

    #[test]
    fn render_with_sharpening_keeps_dimensions() {
        let bytes = synthetic(ImageKind::Jpeg, 400, 300);
        let mut p = params(ImageKind::Jpeg, (400, 300), ImageKind::Jpeg, (200, 200));
        p.sharpening = Some(Sharpening::light());
        let rendered = RustBackend::new().render(&bytes, &p).unwrap();
        assert_eq!(rendered.dimensions, Dimensions::new(200, 200));
    }

    #[test]
    fn render_animated_gif_keeps_frames() {
        let bytes = animated_gif(80, 60, 3);
        let rendered = RustBackend::new()
            .render(&bytes, &params(ImageKind::Gif, (80, 60), ImageKind::Gif, (40, 40)))
            .unwrap();
        assert_eq!(rendered.dimensions, Dimensions::new(40, 40));
        assert_eq!(frame_count(&rendered.bytes), 3);
    }

    #[test]
    fn render_animated_gif_first_frame_only() {
        let bytes = animated_gif(80, 60, 3);
        let mut p = params(ImageKind::Gif, (80, 60), ImageKind::Gif, (40, 40));
        p.frames = FrameSelection::First;
        let rendered = RustBackend::new().render(&bytes, &p).unwrap();
        assert_eq!(frame_count(&rendered.bytes), 1);
    }

    #[test]
    fn render_animated_gif_to_png_is_single_frame() {
        let bytes = animated_gif(80, 60, 3);
        let rendered = RustBackend::new()
            .render(&bytes, &params(ImageKind::Gif, (80, 60), ImageKind::Png, (40, 40)))
            .unwrap();
        assert_eq!(image::guess_format(&rendered.bytes).unwrap(), ImageFormat::Png);
        assert_eq!(rendered.dimensions, Dimensions::new(40, 40));
    }

    #[test]
    fn render_avif_output() {
        let bytes = synthetic(ImageKind::Png, 64, 48);
        let rendered = RustBackend::new()
            .render(&bytes, &params(ImageKind::Png, (64, 48), ImageKind::Avif, (32, 32)))
            .unwrap();
        assert!(!rendered.bytes.is_empty());
        assert_eq!(rendered.dimensions, Dimensions::new(32, 32));
    }

    /// Baseline JPEG with an APP1 EXIF segment carrying `orientation`.
    fn jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
        let plain = synthetic(ImageKind::Jpeg, width, height);
        // Big-endian TIFF header, one IFD0 entry: 0x0112 SHORT count 1.
        let mut tiff = vec![
            b'M', b'M', 0x00, 0x2a, 0x00, 0x00, 0x00, 0x08, // header, IFD0 at 8
            0x00, 0x01, // one entry
            0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01,
        ];
        tiff.extend_from_slice(&orientation.to_be_bytes());
        tiff.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        let mut app1 = b"Exif\x00\x00".to_vec();
        app1.extend_from_slice(&tiff);
        let segment_len = (app1.len() + 2) as u16;

        let mut out = plain[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&segment_len.to_be_bytes());
        out.extend_from_slice(&app1);
        out.extend_from_slice(&plain[2..]);
        out
    }

    #[test]
    fn rotated_jpeg_width_only_keeps_aspect() {
        // Stored 400x300, displayed 300x400.
        let bytes = jpeg_with_orientation(400, 300, 6);
        let mut p = params(ImageKind::Jpeg, (400, 300), ImageKind::Jpeg, (200, 150));
        p.geometry = Geometry {
            width: Some(200),
            ..Geometry::default()
        };
        p.auto_orient = true;

        let rendered = RustBackend::new().render(&bytes, &p).unwrap();
        assert_eq!(rendered.dimensions, Dimensions::new(200, 266));
    }

    #[test]
    fn rotated_jpeg_box_is_exact() {
        let bytes = jpeg_with_orientation(400, 300, 6);
        let mut p = params(ImageKind::Jpeg, (400, 300), ImageKind::Jpeg, (120, 100));
        p.auto_orient = true;

        let rendered = RustBackend::new().render(&bytes, &p).unwrap();
        assert_eq!(rendered.dimensions, Dimensions::new(120, 100));
    }

    #[test]
    fn orientation_ignored_without_auto_orient() {
        let bytes = jpeg_with_orientation(400, 300, 6);
        let mut p = params(ImageKind::Jpeg, (400, 300), ImageKind::Png, (200, 150));
        p.geometry = Geometry {
            width: Some(200),
            ..Geometry::default()
        };

        let rendered = RustBackend::new().render(&bytes, &p).unwrap();
        assert_eq!(rendered.dimensions, Dimensions::new(200, 150));
    }

    #[test]
    fn render_corrupt_source_errors() {
        let result = RustBackend::new().render(
            b"\x89PNG\r\n\x1a\ntruncated",
            &params(ImageKind::Png, (10, 10), ImageKind::Png, (5, 5)),
        );
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }
}
