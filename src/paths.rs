//! Relative-path validation and variant-path derivation.
//!
//! This is the sole security boundary against path traversal. Every relative
//! path entering the pipeline ultimately derives from ingestion-time
//! metadata, so [`validate_relative_path`] is deliberately strict: it
//! rejects anything that could escape the media root or produce a filename
//! some filesystem cannot represent.
//!
//! Derivation, by contrast, performs no re-validation: once a path has
//! crossed the boundary, [`variant_base_path`] and [`variant_relative_path`]
//! trust it (the caller already validated).

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("path must not be empty")]
    Empty,
    #[error("absolute path is not allowed: {0}")]
    Absolute(PathBuf),
    #[error("path traversal is not allowed: {0}")]
    Traversal(PathBuf),
    #[error("path segment contains a forbidden character: {0:?}")]
    ForbiddenCharacter(String),
    #[error("path segment ends in whitespace or a dot: {0:?}")]
    TrailingJunk(String),
    #[error("path segment is not valid UTF-8")]
    NotUtf8,
    #[error("origin path must include a bucket prefix: {0}")]
    MissingPrefix(PathBuf),
}

/// Characters that are rejected inside a path segment. The separator `/`
/// never reaches this check (segments are examined individually); the rest
/// are either Windows-reserved or shell-hostile.
const FORBIDDEN: &[char] = &['\\', ':', '?', '<', '>', '*', '|', '"'];

/// Validate a caller-supplied relative path.
///
/// Rejects: absolute paths, the empty path, `.`, any `..` segment, segments
/// containing control characters or any of `\ : ? < > * | "`, and segments
/// ending in whitespace or a dot. Accepts ordinary nested relative paths
/// and returns them re-assembled from their components.
pub fn validate_relative_path(path: &Path) -> Result<PathBuf, PathError> {
    if path.as_os_str().is_empty() {
        return Err(PathError::Empty);
    }

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::Absolute(path.to_path_buf()));
            }
            Component::ParentDir => {
                return Err(PathError::Traversal(path.to_path_buf()));
            }
            Component::CurDir => {
                // "." as a whole path carries no filename; inside a longer
                // path it is equally meaningless metadata noise.
                return Err(PathError::Empty);
            }
            Component::Normal(os) => {
                let segment = os.to_str().ok_or(PathError::NotUtf8)?;
                validate_segment(segment)?;
                normalized.push(segment);
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(PathError::Empty);
    }
    Ok(normalized)
}

fn validate_segment(segment: &str) -> Result<(), PathError> {
    if segment
        .chars()
        .any(|c| c.is_control() || FORBIDDEN.contains(&c))
    {
        return Err(PathError::ForbiddenCharacter(segment.to_string()));
    }
    if segment.ends_with(char::is_whitespace) || segment.ends_with('.') {
        return Err(PathError::TrailingJunk(segment.to_string()));
    }
    Ok(())
}

/// The origin's media-relative path with its bucket prefix and file
/// extension stripped — the sub-path every rendition mirrors under its own
/// slot directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantBasePath(PathBuf);

impl VariantBasePath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// The directory portion of the base path (empty for top-level assets).
    pub fn parent(&self) -> &Path {
        self.0.parent().unwrap_or(Path::new(""))
    }

    /// The filename stem renditions share.
    pub fn file_name(&self) -> &str {
        // A base path always has a final component: derivation requires at
        // least two components and keeps everything after the bucket.
        self.0
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Derive the shared rendition base path from the origin's relative path:
/// drop the leading bucket component (e.g. `l0orig`) and the extension.
///
/// `l0orig/2024/dawn.png` → `2024/dawn`. Errors when the path has fewer
/// than two components, i.e. carries no bucket prefix.
pub fn variant_base_path(origin_relative: &Path) -> Result<VariantBasePath, PathError> {
    let mut components = origin_relative.components();
    let _bucket = components
        .next()
        .ok_or_else(|| PathError::MissingPrefix(origin_relative.to_path_buf()))?;
    let rest = components.as_path();
    if rest.as_os_str().is_empty() {
        return Err(PathError::MissingPrefix(origin_relative.to_path_buf()));
    }
    Ok(VariantBasePath(rest.with_extension("")))
}

/// Media-relative path of one rendition slot file: the slot's directory
/// label, the mirrored base path, and the format extension. No
/// re-validation happens here (trust boundary).
pub fn variant_relative_path(base: &VariantBasePath, slot_label: &str, extension: &str) -> PathBuf {
    Path::new(slot_label)
        .join(&base.0)
        .with_extension(extension)
}
