//! The rendition catalog: which sizes and formats every original should have.
//!
//! The catalog is static, read-only data shared by every pipeline invocation.
//! It is organized as ordered *layers* (e.g. `primary`, `fallback`), each
//! holding concrete [`VariantSpec`]s. A spec pins a [`VariantSlot`] — the
//! `(layer_id, width)` bucket that names an on-disk directory — to an
//! encoding contract ([`VariantFormat`]) plus an optional quality override.
//!
//! A compiled-in default catalog is provided; deployments that want a
//! different ladder load one from TOML via [`VariantCatalog::from_toml_str`]:
//!
//! ```toml
//! [[layer]]
//! name = "primary"
//! id = 1
//!
//! [[layer.spec]]
//! width = 320
//! format = "webp"
//! quality = 80
//! required = true
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unknown variant format: {0}")]
    UnknownFormat(String),
    #[error("layer {0} has no specs")]
    EmptyLayer(String),
}

/// Image container format of a file on disk or a spec target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Jpeg,
    Png,
    Gif,
    Webp,
    Tiff,
    Bmp,
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Container::Jpeg => "jpeg",
            Container::Png => "png",
            Container::Gif => "gif",
            Container::Webp => "webp",
            Container::Tiff => "tiff",
            Container::Bmp => "bmp",
        };
        f.write_str(name)
    }
}

/// Bitstream codec inside a container, where the container alone is
/// ambiguous. WebP files carry either lossy VP8 or lossless VP8L.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Vp8,
    Vp8l,
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Codec::Vp8 => "vp8",
            Codec::Vp8l => "vp8l",
        })
    }
}

/// Encoding contract for a rendition: container, optional codec hint,
/// file extension, and the default quality applied when a spec does not
/// override it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VariantFormat {
    pub container: Container,
    pub codec: Option<Codec>,
    pub extension: &'static str,
    pub lossless: bool,
    pub default_quality: Option<u8>,
}

impl VariantFormat {
    pub const WEBP: VariantFormat = VariantFormat {
        container: Container::Webp,
        codec: Some(Codec::Vp8),
        extension: "webp",
        lossless: false,
        default_quality: Some(80),
    };

    pub const WEBP_LOSSLESS: VariantFormat = VariantFormat {
        container: Container::Webp,
        codec: Some(Codec::Vp8l),
        extension: "webp",
        lossless: true,
        default_quality: Some(80),
    };

    pub const JPEG: VariantFormat = VariantFormat {
        container: Container::Jpeg,
        codec: None,
        extension: "jpg",
        lossless: false,
        default_quality: Some(85),
    };

    /// Look up a format by its catalog-file name.
    pub fn from_name(name: &str) -> Option<VariantFormat> {
        match name {
            "webp" => Some(Self::WEBP),
            "webp-lossless" => Some(Self::WEBP_LOSSLESS),
            "jpeg" => Some(Self::JPEG),
            _ => None,
        }
    }
}

/// A rendition bucket: one size within one layer.
///
/// The slot names the on-disk directory the rendition lives in, via
/// [`VariantSlot::label`] — e.g. layer 1 at width 640 is `l1w640`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantSlot {
    pub layer_id: u32,
    pub width: u32,
}

impl VariantSlot {
    pub fn new(layer_id: u32, width: u32) -> Self {
        Self { layer_id, width }
    }

    /// Directory label, `l{layer}w{width}`.
    pub fn label(&self) -> String {
        format!("l{}w{}", self.layer_id, self.width)
    }

    /// Parse a directory name against the slot grammar `l<digits>w<digits>`.
    ///
    /// Returns `None` for anything else — including names with a trailing
    /// suffix, missing digits, or numbers that overflow `u32`.
    pub fn parse(label: &str) -> Option<VariantSlot> {
        let rest = label.strip_prefix('l')?;
        let w_pos = rest.find('w')?;
        let (layer_part, width_part) = (&rest[..w_pos], &rest[w_pos + 1..]);
        if layer_part.is_empty() || width_part.is_empty() {
            return None;
        }
        if !layer_part.bytes().all(|b| b.is_ascii_digit())
            || !width_part.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        Some(VariantSlot {
            layer_id: layer_part.parse().ok()?,
            width: width_part.parse().ok()?,
        })
    }
}

/// A concrete rendition target: slot + format + quality + requiredness.
///
/// Non-required specs are skipped by the planner when the target width is
/// not strictly smaller than the original's width; required specs are
/// always planned (they anchor the fallback chain even for tiny originals).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantSpec {
    pub slot: VariantSlot,
    pub format: VariantFormat,
    pub quality: Option<u8>,
    pub required: bool,
}

impl VariantSpec {
    /// The quality to encode with: the spec override, else the format default.
    pub fn effective_quality(&self) -> Option<u8> {
        self.quality.or(self.format.default_quality)
    }
}

/// A named, ordered group of specs sharing a purpose.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantLayer {
    pub name: String,
    pub layer_id: u32,
    pub specs: Vec<VariantSpec>,
}

/// The full ordered catalog of layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantCatalog {
    pub layers: Vec<VariantLayer>,
}

impl VariantCatalog {
    /// Build a catalog from ordered layers.
    pub fn new(layers: Vec<VariantLayer>) -> Self {
        Self { layers }
    }

    /// Load a catalog from its TOML representation.
    pub fn from_toml_str(text: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = toml::from_str(text)?;
        let mut layers = Vec::with_capacity(raw.layer.len());
        for layer in raw.layer {
            if layer.spec.is_empty() {
                return Err(CatalogError::EmptyLayer(layer.name));
            }
            let mut specs = Vec::with_capacity(layer.spec.len());
            for spec in layer.spec {
                let format = VariantFormat::from_name(&spec.format)
                    .ok_or_else(|| CatalogError::UnknownFormat(spec.format.clone()))?;
                specs.push(VariantSpec {
                    slot: VariantSlot::new(layer.id, spec.width),
                    format,
                    quality: spec.quality,
                    required: spec.required,
                });
            }
            layers.push(VariantLayer {
                name: layer.name,
                layer_id: layer.id,
                specs,
            });
        }
        Ok(Self { layers })
    }
}

impl Default for VariantCatalog {
    /// The stock ladder: a lossy WebP primary layer across five widths and
    /// a single required JPEG fallback for clients without WebP support.
    fn default() -> Self {
        fn spec(
            layer_id: u32,
            width: u32,
            format: VariantFormat,
            quality: u8,
            required: bool,
        ) -> VariantSpec {
            VariantSpec {
                slot: VariantSlot::new(layer_id, width),
                format,
                quality: Some(quality),
                required,
            }
        }

        Self {
            layers: vec![
                VariantLayer {
                    name: "primary".to_string(),
                    layer_id: 1,
                    specs: vec![
                        spec(1, 320, VariantFormat::WEBP, 80, true),
                        spec(1, 480, VariantFormat::WEBP, 70, false),
                        spec(1, 640, VariantFormat::WEBP, 60, false),
                        spec(1, 960, VariantFormat::WEBP, 50, false),
                        spec(1, 1120, VariantFormat::WEBP, 40, false),
                    ],
                },
                VariantLayer {
                    name: "fallback".to_string(),
                    layer_id: 9,
                    specs: vec![spec(9, 320, VariantFormat::JPEG, 85, true)],
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    layer: Vec<RawLayer>,
}

#[derive(Debug, Deserialize)]
struct RawLayer {
    name: String,
    id: u32,
    #[serde(default)]
    spec: Vec<RawSpec>,
}

#[derive(Debug, Deserialize)]
struct RawSpec {
    width: u32,
    format: String,
    #[serde(default)]
    quality: Option<u8>,
    #[serde(default)]
    required: bool,
}
