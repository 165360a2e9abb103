//! The execution seam: where renditions are actually produced.
//!
//! The pipeline plans; an executor does. Keeping the trait narrow (one
//! method per dispatched phase) lets tests substitute a recording executor
//! and leaves room for a remote or queued implementation without touching
//! the planning code.

use crate::commit::{commit_plan, prepare_directories};
use crate::paths::VariantBasePath;
use crate::pipeline::PipelineError;
use crate::plan::VariantPlan;
use crate::preprocess::prepare;
use crate::types::{OriginalFile, OriginalImage, VariantCommitResult, VariantPolicy};
use std::path::Path;

pub trait VariantExecutor {
    /// Decode and prepare the original once for all renditions.
    fn preprocess(&self, file: &OriginalFile) -> Result<OriginalImage, PipelineError>;

    /// Apply the plan under the policy, returning one result per action.
    fn commit(
        &self,
        image: &OriginalImage,
        media_root: &Path,
        base: &VariantBasePath,
        plan: &VariantPlan,
        policy: VariantPolicy,
    ) -> Result<Vec<VariantCommitResult>, PipelineError>;

    /// Release per-invocation resources. Takes the image by value; the
    /// default disposition is simply to drop it.
    fn postprocess(&self, image: OriginalImage) -> Result<(), PipelineError>;
}

/// Executes everything in-process against the local filesystem.
#[derive(Debug, Default)]
pub struct LocalExecutor;

impl VariantExecutor for LocalExecutor {
    fn preprocess(&self, file: &OriginalFile) -> Result<OriginalImage, PipelineError> {
        prepare(file)
    }

    fn commit(
        &self,
        image: &OriginalImage,
        media_root: &Path,
        base: &VariantBasePath,
        plan: &VariantPlan,
        policy: VariantPolicy,
    ) -> Result<Vec<VariantCommitResult>, PipelineError> {
        prepare_directories(media_root, plan, base)?;
        Ok(commit_plan(media_root, base, plan, policy, image))
    }

    fn postprocess(&self, image: OriginalImage) -> Result<(), PipelineError> {
        drop(image);
        Ok(())
    }
}
