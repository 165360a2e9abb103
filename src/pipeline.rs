//! Pipeline orchestration and the crate-wide error type.
//!
//! One `run` is one reconcile attempt for one original: inspect, collect,
//! plan, then dispatch the preprocess/commit/postprocess triple through the
//! executor. Each attempt re-reads the disk, so a run that fails part-way
//! is simply repaired by the next one.

use crate::catalog::VariantCatalog;
use crate::collect::{collect_files, filter_valid_slots, list_variant_directories};
use crate::commit::CommitError;
use crate::executor::VariantExecutor;
use crate::paths::{PathError, validate_relative_path, variant_base_path};
use crate::plan::{VariantPlan, diff, normalize, plan_specs};
use crate::probe::{ProbeError, probe_original};
use crate::session::{ExecutionSession, ExecutionStatus, Phase};
use crate::types::{OriginalFile, VariantCommitResult, VariantPolicy};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("refusing to decode {width}x{height} image (limit {limit} pixels)")]
    ImageTooLarge { width: u32, height: u32, limit: u64 },
    #[error(transparent)]
    Commit(#[from] CommitError),
    #[error("record store failed: {0}")]
    Store(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl PipelineError {
    /// Stable machine-readable name recorded in the audit entry.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Path(_) => "path",
            PipelineError::Probe(_) => "probe",
            PipelineError::Decode(_) => "decode",
            PipelineError::ImageTooLarge { .. } => "image_too_large",
            PipelineError::Commit(_) => "commit",
            PipelineError::Store(_) => "store",
            PipelineError::Io(_) => "io",
        }
    }

    /// Place this error in the closed failure taxonomy, or `None` when it
    /// is outside it and must propagate.
    pub fn classification(&self) -> Option<ExecutionStatus> {
        match self {
            PipelineError::Decode(_)
            | PipelineError::Probe(ProbeError::Image(_) | ProbeError::Unrecognized(_)) => {
                Some(ExecutionStatus::ImageError)
            }
            PipelineError::ImageTooLarge { .. } => Some(ExecutionStatus::IoError),
            PipelineError::Store(_) => Some(ExecutionStatus::DbError),
            _ => None,
        }
    }
}

/// What a successful run produced: the probed original, the normalized
/// plan it acted on, and every commit result.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub original: OriginalFile,
    pub plan: VariantPlan,
    pub results: Vec<VariantCommitResult>,
}

pub struct VariantPipeline {
    media_root: PathBuf,
    policy: VariantPolicy,
    catalog: VariantCatalog,
}

impl VariantPipeline {
    pub fn new(media_root: impl Into<PathBuf>, policy: VariantPolicy, catalog: VariantCatalog) -> Self {
        Self {
            media_root: media_root.into(),
            policy,
            catalog,
        }
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    pub fn policy(&self) -> VariantPolicy {
        self.policy
    }

    pub fn catalog(&self) -> &VariantCatalog {
        &self.catalog
    }

    /// Reconcile one original. Classified faults land in the session's
    /// audit entry and yield `Ok(None)`; unknown faults propagate.
    pub fn run<E: VariantExecutor>(
        &self,
        origin_relative_path: &Path,
        executor: &E,
        session: &mut ExecutionSession,
    ) -> Result<Option<PipelineOutcome>, PipelineError> {
        let outcome = self.attempt(origin_relative_path, executor, session);
        session.finish(outcome)
    }

    fn attempt<E: VariantExecutor>(
        &self,
        origin_relative_path: &Path,
        executor: &E,
        session: &mut ExecutionSession,
    ) -> Result<PipelineOutcome, PipelineError> {
        let (file, base) = session.phase(Phase::Inspect, || {
            let relative = validate_relative_path(origin_relative_path)?;
            let base = variant_base_path(&relative)?;
            let info = probe_original(&self.media_root.join(&relative))?;
            Ok((
                OriginalFile {
                    relative_path: relative,
                    info,
                },
                base,
            ))
        })?;

        let files = session.phase(Phase::Collect, || {
            let dir_names = list_variant_directories(&self.media_root);
            let slots = filter_valid_slots(&dir_names);
            Ok(collect_files(&self.media_root, &slots, &base))
        })?;

        let plan = session.phase(Phase::Plan, || {
            let specs = plan_specs(&self.catalog, file.info.width);
            Ok(normalize(diff(specs, files)))
        })?;

        let results = session.execute(
            executor,
            &self.media_root,
            &base,
            &file,
            &plan,
            self.policy,
        )?;

        Ok(PipelineOutcome {
            original: file,
            plan,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_are_stable_names() {
        let err = PipelineError::Store("x".to_string());
        assert_eq!(err.kind(), "store");
        let err = PipelineError::ImageTooLarge {
            width: 1,
            height: 1,
            limit: 1,
        };
        assert_eq!(err.kind(), "image_too_large");
    }

    #[test]
    fn classification_covers_the_closed_taxonomy() {
        let decode = PipelineError::Decode(image::ImageError::IoError(io::Error::other("x")));
        assert_eq!(decode.classification(), Some(ExecutionStatus::ImageError));

        let bomb = PipelineError::ImageTooLarge {
            width: 1,
            height: 1,
            limit: 1,
        };
        assert_eq!(bomb.classification(), Some(ExecutionStatus::IoError));

        let store = PipelineError::Store("x".to_string());
        assert_eq!(store.classification(), Some(ExecutionStatus::DbError));

        let unrecognized =
            PipelineError::Probe(ProbeError::Unrecognized(PathBuf::from("a.bin")));
        assert_eq!(
            unrecognized.classification(),
            Some(ExecutionStatus::ImageError)
        );
    }

    #[test]
    fn path_and_io_faults_are_unclassified() {
        let path = PipelineError::Path(PathError::Empty);
        assert_eq!(path.classification(), None);
        let io_err = PipelineError::Io(io::Error::other("x"));
        assert_eq!(io_err.classification(), None);
    }
}
