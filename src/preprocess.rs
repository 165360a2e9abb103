//! Original preparation: one decode shared by every rendition.
//!
//! Ordering is significant: orientation is applied before any color work so
//! later dimension math sees the display geometry, alpha is flattened before
//! the ICC transform so the matte is composited in the source space, and the
//! sRGB conversion runs last. Orientation and ICC handling are lenient — an
//! unreadable EXIF block or a malformed profile keeps the pixels as decoded.

use crate::catalog::Container;
use crate::pipeline::PipelineError;
use crate::types::{OriginalFile, OriginalImage};
use image::{DynamicImage, ImageBuffer, ImageDecoder, ImageReader, Luma, Rgb};
use log::{debug, warn};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Decompression-bomb ceiling, in pixels. Decoding is refused above this
/// regardless of how small the file claims to be on disk.
pub const DECODE_PIXEL_LIMIT: u64 = 178_956_970;

/// Decode and prepare the original for resampling: orientation applied,
/// alpha flattened onto white, pixels converted to sRGB when the file
/// embeds an ICC profile.
pub fn prepare(original: &OriginalFile) -> Result<OriginalImage, PipelineError> {
    let info = &original.info;
    let pixels = u64::from(info.width) * u64::from(info.height);
    if pixels > DECODE_PIXEL_LIMIT {
        return Err(PipelineError::ImageTooLarge {
            width: info.width,
            height: info.height,
            limit: DECODE_PIXEL_LIMIT,
        });
    }

    let reader = ImageReader::open(&info.path)?.with_guessed_format()?;
    let mut decoder = reader.into_decoder()?;
    let icc = decoder.icc_profile().ok().flatten();
    let mut image = DynamicImage::from_decoder(decoder)?;

    if matches!(
        info.container,
        Container::Jpeg | Container::Tiff | Container::Webp
    ) {
        if let Some(orientation) = read_exif_orientation(&info.path) {
            image = orient(image, orientation);
        }
    }

    image = flatten_alpha(image);

    if let Some(profile) = icc {
        image = apply_icc(image, &profile, &info.path);
    }

    Ok(OriginalImage {
        image,
        info: info.clone(),
    })
}

/// Read the EXIF orientation tag, if any. Values outside 2..=8 (including
/// the identity value 1) yield `None`.
fn read_exif_orientation(path: &Path) -> Option<u32> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;
    let orientation = exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)?
        .value
        .get_uint(0)?;
    (2..=8).contains(&orientation).then_some(orientation)
}

/// Bake an EXIF orientation into the pixel data.
fn orient(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Composite any alpha channel onto an opaque white matte.
///
/// Renditions are always opaque; compositing here keeps the output of a
/// transparent PNG predictable instead of letting the encoder pick a matte.
fn flatten_alpha(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLumaA8(buf) => {
            let (w, h) = buf.dimensions();
            let out = ImageBuffer::from_fn(w, h, |x, y| {
                let p = buf.get_pixel(x, y).0;
                Luma([over_white_u8(p[0], p[1])])
            });
            DynamicImage::ImageLuma8(out)
        }
        DynamicImage::ImageLumaA16(buf) => {
            let (w, h) = buf.dimensions();
            let out = ImageBuffer::from_fn(w, h, |x, y| {
                let p = buf.get_pixel(x, y).0;
                Luma([over_white_u16(p[0], p[1])])
            });
            DynamicImage::ImageLuma16(out)
        }
        DynamicImage::ImageRgba8(buf) => {
            let (w, h) = buf.dimensions();
            let out = ImageBuffer::from_fn(w, h, |x, y| {
                let p = buf.get_pixel(x, y).0;
                Rgb([
                    over_white_u8(p[0], p[3]),
                    over_white_u8(p[1], p[3]),
                    over_white_u8(p[2], p[3]),
                ])
            });
            DynamicImage::ImageRgb8(out)
        }
        DynamicImage::ImageRgba16(buf) => {
            let (w, h) = buf.dimensions();
            let out = ImageBuffer::from_fn(w, h, |x, y| {
                let p = buf.get_pixel(x, y).0;
                Rgb([
                    over_white_u16(p[0], p[3]),
                    over_white_u16(p[1], p[3]),
                    over_white_u16(p[2], p[3]),
                ])
            });
            DynamicImage::ImageRgb16(out)
        }
        DynamicImage::ImageRgba32F(buf) => {
            let (w, h) = buf.dimensions();
            let out = ImageBuffer::from_fn(w, h, |x, y| {
                let p = buf.get_pixel(x, y).0;
                Rgb([
                    p[0] * p[3] + (1.0 - p[3]),
                    p[1] * p[3] + (1.0 - p[3]),
                    p[2] * p[3] + (1.0 - p[3]),
                ])
            });
            DynamicImage::ImageRgb32F(out)
        }
        opaque => opaque,
    }
}

fn over_white_u8(value: u8, alpha: u8) -> u8 {
    let v = u16::from(value);
    let a = u16::from(alpha);
    ((v * a + 255 * (255 - a) + 127) / 255) as u8
}

fn over_white_u16(value: u16, alpha: u16) -> u16 {
    let v = u32::from(value);
    let a = u32::from(alpha);
    ((v * a + 65535 * (65535 - a) + 32767) / 65535) as u16
}

/// Convert embedded-profile pixels to sRGB with a perceptual intent.
///
/// Only 8-bit RGB is transformed; other layouts pass through untouched, as
/// does anything with a profile qcms cannot parse.
fn apply_icc(image: DynamicImage, profile: &[u8], path: &Path) -> DynamicImage {
    let DynamicImage::ImageRgb8(mut buf) = image else {
        return image;
    };

    let transform = qcms::Profile::new_from_slice(profile, false)
        .map(|source| (source, qcms::Profile::new_sRGB()))
        .and_then(|(source, srgb)| {
            qcms::Transform::new(
                &source,
                &srgb,
                qcms::DataType::RGB8,
                qcms::Intent::Perceptual,
            )
        });
    match transform {
        Some(transform) => {
            transform.apply(&mut buf);
            debug!("converted {} to sRGB", path.display());
        }
        None => {
            warn!(
                "unusable ICC profile in {}, keeping pixels as decoded",
                path.display()
            );
        }
    }
    DynamicImage::ImageRgb8(buf)
}
