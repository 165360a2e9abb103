//! Shared types flowing between pipeline stages.
//!
//! The commit outcome is a sum type rather than an error: a single failed
//! rendition never aborts the batch, and the caller always receives one
//! inspectable [`VariantCommitResult`] per processed item.

use crate::catalog::{VariantSlot, VariantSpec};
use crate::probe::ImageFileInfo;
use image::DynamicImage;
use serde::Serialize;
use std::path::PathBuf;

/// The resolved canonical asset: validated media-relative path plus probed
/// file metadata. This is the pipeline's per-invocation input.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginalFile {
    pub relative_path: PathBuf,
    pub info: ImageFileInfo,
}

/// The decoded, preprocessed original — oriented, flattened, sRGB.
/// Prepared once and shared by every rendition.
#[derive(Debug)]
pub struct OriginalImage {
    pub image: DynamicImage,
    pub info: ImageFileInfo,
}

/// A rendition file discovered on disk during collection.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantFile {
    /// Name of the slot directory the file was found under.
    pub dir_name: String,
    pub slot: VariantSlot,
    /// Media-relative path (slot dir + mirrored sub-path).
    pub relative_path: PathBuf,
    pub info: ImageFileInfo,
}

/// The three switches controlling which plan branches the committer
/// executes. Reuse of matched files is unconditional and has no switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VariantPolicy {
    pub generate_missing: bool,
    pub regenerate_mismatched: bool,
    pub delete_orphaned: bool,
}

impl VariantPolicy {
    /// Converge fully: generate, regenerate, and delete.
    pub fn converge() -> Self {
        Self {
            generate_missing: true,
            regenerate_mismatched: true,
            delete_orphaned: true,
        }
    }

    /// Plan but touch nothing — inspect-only repair runs.
    pub fn inspect_only() -> Self {
        Self {
            generate_missing: false,
            regenerate_mismatched: false,
            delete_orphaned: false,
        }
    }
}

/// Authoritative description of a written (or reused) rendition: the spec
/// it satisfies, its media-relative path, and the re-probed file metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantReport {
    pub spec: VariantSpec,
    pub relative_path: PathBuf,
    pub info: ImageFileInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitAction {
    Reuse,
    Generate,
    Regenerate,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitFailure {
    FileAlreadyMissing,
    PermissionDenied,
    OsError,
    SaveFailed,
}

/// Per-item outcome of applying the policy to one plan entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum VariantCommitResult {
    Success {
        action: CommitAction,
        /// `None` for deletions; generate/regenerate/reuse carry a report.
        report: Option<VariantReport>,
    },
    Failure {
        action: CommitAction,
        reason: CommitFailure,
    },
}

impl VariantCommitResult {
    pub fn success(action: CommitAction, report: Option<VariantReport>) -> Self {
        Self::Success { action, report }
    }

    pub fn failure(action: CommitAction, reason: CommitFailure) -> Self {
        Self::Failure { action, reason }
    }

    pub fn action(&self) -> CommitAction {
        match self {
            Self::Success { action, .. } | Self::Failure { action, .. } => *action,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn report(&self) -> Option<&VariantReport> {
        match self {
            Self::Success { report, .. } => report.as_ref(),
            Self::Failure { .. } => None,
        }
    }
}
