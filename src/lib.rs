//! # image-variants
//!
//! Rendition reconciliation for an image library. Every original under a
//! media root is owed a ladder of derived renditions — sizes and formats
//! described by a static catalog. This crate observes what is actually on
//! disk, diffs it against the catalog, and converges the difference:
//!
//! ```text
//! inspect → collect → plan → preprocess → commit → postprocess → store
//! ```
//!
//! The loop is level-triggered: every run re-reads the disk and re-plans
//! from scratch, so there is no incremental state to corrupt and a run that
//! dies part-way is simply repaired by the next one.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`catalog`] | The rendition ladder: layers, slots, formats, qualities |
//! | [`paths`] | Relative-path validation and rendition path derivation |
//! | [`probe`] | Header-level file inspection: dimensions, container, codec |
//! | [`collect`] | Observation — what rendition files exist on disk |
//! | [`plan`] | Diff catalog vs disk into matched / mismatched / missing / orphaned |
//! | [`preprocess`] | One shared decode: orientation, alpha flattening, sRGB |
//! | [`generate`] | Scale-aware resampling and encoding of one rendition |
//! | [`commit`] | Apply the plan under a policy, one result per action |
//! | [`executor`] | The seam between planning and doing; local implementation |
//! | [`session`] | Phase timings and the closed failure taxonomy |
//! | [`pipeline`] | Orchestration and the crate-wide error type |
//! | [`records`] | Mapping outcomes to persistence-ready records |
//!
//! # Design Decisions
//!
//! ## Plans Are Values
//!
//! Planning is pure: collection produces data, [`plan::diff`] and
//! [`plan::normalize`] are functions over that data, and only
//! [`commit`] touches the disk. Unit tests exercise every planning edge
//! case without a filesystem.
//!
//! ## Per-Item Failure Is Not An Error
//!
//! A batch of renditions should not abort because one encode failed. Commit
//! returns a [`types::VariantCommitResult`] per action — success or failure —
//! and the session classifies anything that *does* escape into a closed
//! taxonomy, swallowing recognized faults into the audit entry and
//! propagating only the unrecognized.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resampling, and encoding stay in-process: the `image` crate
//! for codecs, `fast_image_resize` for convolution kernels, `webp` for
//! lossy VP8, and `qcms` for ICC-to-sRGB conversion. No ImageMagick, no
//! shelling out, no C library to version-match.

pub mod catalog;
pub mod collect;
pub mod commit;
pub mod executor;
pub mod generate;
pub mod paths;
pub mod pipeline;
pub mod plan;
pub mod preprocess;
pub mod probe;
pub mod records;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
