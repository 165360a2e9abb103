//! Shared test utilities for the image-variants test suite.
//!
//! Small fixture writers that put a real, probeable image of a given
//! geometry on disk. Content is a gradient so resampling and encoding have
//! actual detail to chew on. Each writer encodes its format explicitly —
//! never inferred from the extension — so tests can stage files whose name
//! and content disagree.

use image::{ImageFormat, Rgb, RgbImage};
use std::path::Path;

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    gradient(width, height)
        .save_with_format(path, ImageFormat::Jpeg)
        .unwrap();
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    gradient(width, height)
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}

pub fn write_lossy_webp(path: &Path, width: u32, height: u32) {
    let buf = gradient(width, height);
    let encoded = webp::Encoder::from_rgb(buf.as_raw(), width, height).encode(75.0);
    std::fs::write(path, &*encoded).unwrap();
}

pub fn write_lossless_webp(path: &Path, width: u32, height: u32) {
    let buf = gradient(width, height);
    let encoded = webp::Encoder::from_rgb(buf.as_raw(), width, height).encode_lossless();
    std::fs::write(path, &*encoded).unwrap();
}
