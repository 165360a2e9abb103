//! Header-level image file inspection.
//!
//! Recovers just enough from a file to drive planning — dimensions,
//! container, codec, byte size, losslessness — without decoding pixels.
//! Dimensions come from the `image` reader's header pass; the WebP codec is
//! sniffed from the RIFF chunk layout; TIFF losslessness comes from the
//! compression tag.
//!
//! Two entry points with different failure postures:
//! - [`probe`] is lenient: collection treats an unreadable or unrecognized
//!   file as absent, logging and returning `None`.
//! - [`probe_original`] is strict: the pipeline's inspect phase must fail
//!   loudly when the canonical original cannot be read.

use crate::catalog::{Codec, Container};
use image::{ImageFormat, ImageReader};
use log::warn;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("unrecognized image file: {0}")]
    Unrecognized(PathBuf),
    #[error("failed to read image header: {0}")]
    Image(#[from] image::ImageError),
}

/// TIFF compression schemes that preserve pixel data exactly:
/// none, LZW, Deflate, PackBits.
const TIFF_LOSSLESS_COMPRESSIONS: &[u32] = &[1, 5, 8, 32773];

/// Everything planning needs to know about one image file on disk.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ImageFileInfo {
    /// Absolute path of the probed file.
    pub path: PathBuf,
    pub container: Container,
    pub codec: Option<Codec>,
    pub bytes: u64,
    pub width: u32,
    pub height: u32,
    pub lossless: bool,
}

/// Strictly probe a file, failing on anything unreadable.
pub fn probe_original(path: &Path) -> Result<ImageFileInfo, ProbeError> {
    let stat = std::fs::symlink_metadata(path)?;

    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader
        .format()
        .and_then(container_for_format)
        .ok_or_else(|| ProbeError::Unrecognized(path.to_path_buf()))?;
    let (width, height) = reader.into_dimensions()?;

    let (codec, lossless) = match format {
        Container::Png | Container::Gif | Container::Bmp => (None, true),
        Container::Jpeg => (None, false),
        Container::Webp => {
            let codec = sniff_webp_codec(path)?;
            (codec, codec == Some(Codec::Vp8l))
        }
        Container::Tiff => (None, tiff_is_lossless(path)),
    };

    Ok(ImageFileInfo {
        path: path.to_path_buf(),
        container: format,
        codec,
        bytes: stat.len(),
        width,
        height,
        lossless,
    })
}

/// Leniently probe a file: a missing or unrecognized file yields `None`.
///
/// A partial listing is acceptable for collection — the planner treats an
/// absent file as missing, and the next run re-examines the disk anyway.
pub fn probe(path: &Path) -> Option<ImageFileInfo> {
    match probe_original(path) {
        Ok(info) => Some(info),
        Err(e) => {
            warn!("skipping unreadable image {}: {e}", path.display());
            None
        }
    }
}

fn container_for_format(format: ImageFormat) -> Option<Container> {
    match format {
        ImageFormat::Jpeg => Some(Container::Jpeg),
        ImageFormat::Png => Some(Container::Png),
        ImageFormat::Gif => Some(Container::Gif),
        ImageFormat::WebP => Some(Container::Webp),
        ImageFormat::Tiff => Some(Container::Tiff),
        ImageFormat::Bmp => Some(Container::Bmp),
        _ => None,
    }
}

/// Walk the RIFF chunk list until the bitstream chunk identifies the codec.
///
/// Simple files start with a `VP8 `/`VP8L` chunk directly; extended files
/// open with `VP8X` followed by metadata chunks (ICCP, EXIF, ...) that are
/// skipped until the bitstream appears. Chunk payloads are padded to even
/// sizes.
fn sniff_webp_codec(path: &Path) -> Result<Option<Codec>, io::Error> {
    let mut file = File::open(path)?;
    let mut header = [0u8; 12];
    file.read_exact(&mut header)?;
    if &header[0..4] != b"RIFF" || &header[8..12] != b"WEBP" {
        return Ok(None);
    }

    loop {
        let mut chunk_header = [0u8; 8];
        if file.read_exact(&mut chunk_header).is_err() {
            return Ok(None);
        }
        let size = u32::from_le_bytes([
            chunk_header[4],
            chunk_header[5],
            chunk_header[6],
            chunk_header[7],
        ]) as u64;
        match &chunk_header[0..4] {
            b"VP8 " => return Ok(Some(Codec::Vp8)),
            b"VP8L" => return Ok(Some(Codec::Vp8l)),
            _ => {
                file.seek(SeekFrom::Current((size + (size & 1)) as i64))?;
            }
        }
    }
}

/// Read the TIFF compression tag. An absent tag means uncompressed.
fn tiff_is_lossless(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return true;
    };
    let mut reader = io::BufReader::new(file);
    let Ok(exif) = exif::Reader::new().read_from_container(&mut reader) else {
        return true;
    };
    match exif
        .get_field(exif::Tag::Compression, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
    {
        Some(compression) => TIFF_LOSSLESS_COMPRESSIONS.contains(&compression),
        None => true,
    }
}
