//! Rendition generation: resample the prepared original and encode it.
//!
//! The resampling filter adapts to the scale factor. Mild downscales keep
//! Lanczos for sharpness; aggressive downscales (below 0.3x) switch to
//! cheaper kernels since the detail is going away regardless, with Hamming
//! reserved for lossless sources where box averaging would band. Upscales
//! only happen for required specs wider than the original and use Catmull-Rom.
//!
//! Generation never raises: any failure is logged and reported as `None`,
//! and the committer records the slot as failed.

use crate::catalog::{Codec, Container, VariantSpec};
use crate::paths::{VariantBasePath, variant_relative_path};
use crate::probe::probe;
use crate::types::{OriginalImage, VariantReport};
use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use jpeg_encoder::{ColorType, Encoder as JpegEncoder};
use log::{debug, warn};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleFilter {
    Bicubic,
    Lanczos,
    Hamming,
    Box,
}

impl ResampleFilter {
    fn convolution(self) -> FilterType {
        match self {
            ResampleFilter::Bicubic => FilterType::CatmullRom,
            ResampleFilter::Lanczos => FilterType::Lanczos3,
            ResampleFilter::Hamming => FilterType::Hamming,
            ResampleFilter::Box => FilterType::Box,
        }
    }
}

/// Pick the resampling filter for a given scale. `source_lossless` is the
/// original file's losslessness, not the target format's.
pub fn select_resample(
    target_width: u32,
    original_width: u32,
    source_lossless: bool,
) -> ResampleFilter {
    let ratio = f64::from(target_width) / f64::from(original_width);
    if ratio > 1.0 {
        ResampleFilter::Bicubic
    } else if ratio >= 0.3 {
        ResampleFilter::Lanczos
    } else if source_lossless {
        ResampleFilter::Hamming
    } else {
        ResampleFilter::Box
    }
}

/// Target height preserving aspect ratio, never below one pixel.
fn scaled_height(target_width: u32, width: u32, height: u32) -> u32 {
    let scaled = (f64::from(target_width) * f64::from(height) / f64::from(width)).round() as u32;
    scaled.max(1)
}

/// Resample and encode one rendition, writing it under the media root.
///
/// Returns the re-probed report of the written file, or `None` when any
/// step fails. The destination directory must already exist.
pub fn generate(
    spec: &VariantSpec,
    original: &OriginalImage,
    media_root: &Path,
    base: &VariantBasePath,
) -> Option<VariantReport> {
    let relative_path = variant_relative_path(base, &spec.slot.label(), spec.format.extension);
    let destination = media_root.join(&relative_path);

    let encoded = match render(spec, original) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("failed to render {}: {e}", relative_path.display());
            return None;
        }
    };

    if let Err(e) = std::fs::write(&destination, &encoded) {
        warn!("failed to write {}: {e}", destination.display());
        return None;
    }

    // Re-probe rather than trusting the encoder: the report must describe
    // what is actually on disk.
    let info = probe(&destination)?;
    debug!(
        "generated {} ({} bytes)",
        relative_path.display(),
        info.bytes
    );
    Some(VariantReport {
        spec: spec.clone(),
        relative_path,
        info,
    })
}

#[derive(Debug, thiserror::Error)]
enum RenderError {
    #[error("resize failed: {0}")]
    Resize(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("unsupported target container: {0}")]
    Unsupported(Container),
}

fn render(spec: &VariantSpec, original: &OriginalImage) -> Result<Vec<u8>, RenderError> {
    let rgb = original.image.to_rgb8();
    let (src_width, src_height) = rgb.dimensions();
    let target_width = spec.slot.width;
    let target_height = scaled_height(target_width, src_width, src_height);
    let filter = select_resample(target_width, src_width, original.info.lossless);

    let src = Image::from_vec_u8(src_width, src_height, rgb.into_raw(), PixelType::U8x3)
        .map_err(|e| RenderError::Resize(e.to_string()))?;
    let mut dst = Image::new(target_width, target_height, PixelType::U8x3);
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(filter.convolution()));
    Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .map_err(|e| RenderError::Resize(e.to_string()))?;

    encode(spec, dst.buffer(), target_width, target_height)
}

fn encode(
    spec: &VariantSpec,
    pixels: &[u8],
    width: u32,
    height: u32,
) -> Result<Vec<u8>, RenderError> {
    let quality = spec.effective_quality().unwrap_or(80);
    match spec.format.container {
        Container::Jpeg => {
            let (w, h) = (u16::try_from(width), u16::try_from(height));
            let (Ok(w), Ok(h)) = (w, h) else {
                return Err(RenderError::Encode(format!(
                    "{width}x{height} exceeds the JPEG dimension limit"
                )));
            };
            let mut out = Vec::new();
            let mut encoder = JpegEncoder::new(&mut out, quality);
            encoder.set_progressive(true);
            encoder.set_optimized_huffman_tables(true);
            encoder
                .encode(pixels, w, h, ColorType::Rgb)
                .map_err(|e| RenderError::Encode(e.to_string()))?;
            Ok(out)
        }
        Container::Webp => {
            let mut config =
                webp::WebPConfig::new().map_err(|()| RenderError::Encode("config".to_string()))?;
            config.method = 6;
            config.quality = f32::from(quality);
            config.lossless = i32::from(spec.format.codec == Some(Codec::Vp8l));
            let encoder = webp::Encoder::from_rgb(pixels, width, height);
            let memory = encoder
                .encode_advanced(&config)
                .map_err(|e| RenderError::Encode(format!("{e:?}")))?;
            Ok(memory.to_vec())
        }
        other => Err(RenderError::Unsupported(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{VariantFormat, VariantSlot};
    use crate::paths::variant_base_path;
    use crate::probe::probe_original;
    use crate::test_helpers::write_png;
    use std::fs;
    use tempfile::TempDir;

    fn spec(width: u32, format: VariantFormat) -> VariantSpec {
        VariantSpec {
            slot: VariantSlot::new(1, width),
            format,
            quality: Some(75),
            required: true,
        }
    }

    fn prepared(path: &Path) -> OriginalImage {
        let info = probe_original(path).unwrap();
        OriginalImage {
            image: image::open(path).unwrap(),
            info,
        }
    }

    #[test]
    fn filter_tracks_scale_ratio() {
        // Upscale.
        assert_eq!(select_resample(1280, 1000, false), ResampleFilter::Bicubic);
        // Identity and mild downscale keep Lanczos.
        assert_eq!(select_resample(1000, 1000, false), ResampleFilter::Lanczos);
        assert_eq!(select_resample(300, 1000, false), ResampleFilter::Lanczos);
        // Below 0.3x the cheap kernels take over.
        assert_eq!(select_resample(299, 1000, false), ResampleFilter::Box);
        assert_eq!(select_resample(299, 1000, true), ResampleFilter::Hamming);
    }

    #[test]
    fn height_preserves_aspect_and_floors_at_one() {
        assert_eq!(scaled_height(320, 640, 480), 240);
        assert_eq!(scaled_height(320, 641, 480), 240); // rounds
        assert_eq!(scaled_height(100, 10_000, 20), 1); // would be 0.2
    }

    #[test]
    fn generates_webp_at_target_width() {
        let tmp = TempDir::new().unwrap();
        let origin = tmp.path().join("dawn.png");
        write_png(&origin, 640, 480);
        let base = variant_base_path(Path::new("l0orig/dawn.png")).unwrap();
        fs::create_dir_all(tmp.path().join("l1w320")).unwrap();

        let report = generate(
            &spec(320, VariantFormat::WEBP),
            &prepared(&origin),
            tmp.path(),
            &base,
        )
        .unwrap();

        assert_eq!(report.relative_path, Path::new("l1w320/dawn.webp"));
        assert_eq!((report.info.width, report.info.height), (320, 240));
        assert_eq!(report.info.container, Container::Webp);
        assert_eq!(report.info.codec, Some(Codec::Vp8));
        assert!(report.info.bytes > 0);
    }

    #[test]
    fn generates_lossless_webp_as_vp8l() {
        let tmp = TempDir::new().unwrap();
        let origin = tmp.path().join("art.png");
        write_png(&origin, 64, 64);
        let base = variant_base_path(Path::new("l0orig/art.png")).unwrap();
        fs::create_dir_all(tmp.path().join("l1w32")).unwrap();

        let report = generate(
            &spec(32, VariantFormat::WEBP_LOSSLESS),
            &prepared(&origin),
            tmp.path(),
            &base,
        )
        .unwrap();

        assert_eq!(report.info.codec, Some(Codec::Vp8l));
        assert!(report.info.lossless);
    }

    #[test]
    fn generates_jpeg_fallback() {
        let tmp = TempDir::new().unwrap();
        let origin = tmp.path().join("dawn.png");
        write_png(&origin, 640, 480);
        let base = variant_base_path(Path::new("l0orig/dawn.png")).unwrap();
        fs::create_dir_all(tmp.path().join("l1w320")).unwrap();

        let report = generate(
            &spec(320, VariantFormat::JPEG),
            &prepared(&origin),
            tmp.path(),
            &base,
        )
        .unwrap();

        assert_eq!(report.relative_path, Path::new("l1w320/dawn.jpg"));
        assert_eq!(report.info.container, Container::Jpeg);
    }

    #[test]
    fn jpeg_output_is_progressive() {
        let tmp = TempDir::new().unwrap();
        let origin = tmp.path().join("dawn.png");
        write_png(&origin, 640, 480);
        let base = variant_base_path(Path::new("l0orig/dawn.png")).unwrap();
        fs::create_dir_all(tmp.path().join("l1w320")).unwrap();

        generate(
            &spec(320, VariantFormat::JPEG),
            &prepared(&origin),
            tmp.path(),
            &base,
        )
        .unwrap();

        // A progressive stream carries an SOF2 frame header; entropy data
        // cannot produce a bare 0xFFC2 (0xFF bytes are stuffed).
        let bytes = fs::read(tmp.path().join("l1w320/dawn.jpg")).unwrap();
        assert!(
            bytes.windows(2).any(|w| w == [0xFF, 0xC2]),
            "expected a progressive scan header"
        );
    }

    #[test]
    fn upscales_required_spec_beyond_original() {
        let tmp = TempDir::new().unwrap();
        let origin = tmp.path().join("tiny.png");
        write_png(&origin, 100, 80);
        let base = variant_base_path(Path::new("l0orig/tiny.png")).unwrap();
        fs::create_dir_all(tmp.path().join("l1w320")).unwrap();

        let report = generate(
            &spec(320, VariantFormat::WEBP),
            &prepared(&origin),
            tmp.path(),
            &base,
        )
        .unwrap();
        assert_eq!(report.info.width, 320);
        assert_eq!(report.info.height, 256);
    }

    #[test]
    fn missing_destination_directory_yields_none() {
        let tmp = TempDir::new().unwrap();
        let origin = tmp.path().join("dawn.png");
        write_png(&origin, 640, 480);
        let base = variant_base_path(Path::new("l0orig/dawn.png")).unwrap();
        // l1w320/ deliberately absent.

        assert!(
            generate(
                &spec(320, VariantFormat::WEBP),
                &prepared(&origin),
                tmp.path(),
                &base,
            )
            .is_none()
        );
    }
}
