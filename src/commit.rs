//! Commit: apply the normalized plan to disk under the policy.
//!
//! Branches execute in a fixed order — matched, missing, mismatched,
//! orphaned — so reuse is recorded before any disk mutation and deletions
//! come last. Per-item failures are captured as [`VariantCommitResult`]
//! values and never abort the batch; only directory preparation can fail
//! the commit outright.

use crate::generate::generate;
use crate::paths::VariantBasePath;
use crate::plan::VariantPlan;
use crate::types::{
    CommitAction, CommitFailure, OriginalImage, VariantCommitResult, VariantPolicy, VariantReport,
};
use log::{info, warn};
use path_clean::PathClean;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommitError {
    /// Slot roots are provisioned out of band; a missing one means the
    /// media tree itself is broken, not that this asset needs work.
    #[error("slot directory does not exist: {0}")]
    SlotRootMissing(PathBuf),
    #[error("target directory escapes the media root: {0}")]
    PathEscapesRoot(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure every directory a generate or regenerate will write into exists.
///
/// The slot root (`l1w320/`) must already be present; only the mirrored
/// sub-path beneath it is created here. Every target is re-checked for
/// containment under the media root after lexical cleaning.
pub fn prepare_directories(
    media_root: &Path,
    plan: &VariantPlan,
    base: &VariantBasePath,
) -> Result<(), CommitError> {
    let root = media_root.clean();
    let slots = plan
        .missing
        .iter()
        .chain(plan.mismatched.iter().map(|c| &c.spec))
        .map(|spec| spec.slot.label());

    for label in slots {
        let slot_root = media_root.join(&label);
        if !slot_root.is_dir() {
            return Err(CommitError::SlotRootMissing(slot_root));
        }
        let target = slot_root.join(base.parent()).clean();
        if !target.starts_with(&root) {
            return Err(CommitError::PathEscapesRoot(target));
        }
        std::fs::create_dir_all(&target)?;
    }
    Ok(())
}

/// Apply the plan. Returns one result per acted-on entry; entries the
/// policy disables are skipped without a result.
pub fn commit_plan(
    media_root: &Path,
    base: &VariantBasePath,
    plan: &VariantPlan,
    policy: VariantPolicy,
    original: &OriginalImage,
) -> Vec<VariantCommitResult> {
    let mut results = Vec::new();

    for comparison in &plan.matched {
        results.push(VariantCommitResult::success(
            CommitAction::Reuse,
            Some(VariantReport {
                spec: comparison.spec.clone(),
                relative_path: comparison.file.relative_path.clone(),
                info: comparison.file.info.clone(),
            }),
        ));
    }

    if policy.generate_missing {
        for spec in &plan.missing {
            results.push(match generate(spec, original, media_root, base) {
                Some(report) => {
                    VariantCommitResult::success(CommitAction::Generate, Some(report))
                }
                None => VariantCommitResult::failure(CommitAction::Generate, CommitFailure::SaveFailed),
            });
        }
    }

    if policy.regenerate_mismatched {
        for comparison in &plan.mismatched {
            // The stale file goes first; if it cannot be removed the slot is
            // left alone rather than risking two files claiming it.
            if let Err(reason) = delete_file(&comparison.file.info.path) {
                results.push(VariantCommitResult::failure(CommitAction::Delete, reason));
                continue;
            }
            results.push(
                match generate(&comparison.spec, original, media_root, base) {
                    Some(report) => {
                        VariantCommitResult::success(CommitAction::Regenerate, Some(report))
                    }
                    None => VariantCommitResult::failure(
                        CommitAction::Regenerate,
                        CommitFailure::SaveFailed,
                    ),
                },
            );
        }
    }

    if policy.delete_orphaned {
        for file in &plan.orphaned {
            results.push(match delete_file(&file.info.path) {
                Ok(()) => {
                    info!("deleted orphaned {}", file.relative_path.display());
                    VariantCommitResult::success(CommitAction::Delete, None)
                }
                Err(reason) => VariantCommitResult::failure(CommitAction::Delete, reason),
            });
        }
    }

    results
}

fn delete_file(path: &Path) -> Result<(), CommitFailure> {
    std::fs::remove_file(path).map_err(|e| {
        warn!("failed to delete {}: {e}", path.display());
        match e.kind() {
            io::ErrorKind::NotFound => CommitFailure::FileAlreadyMissing,
            io::ErrorKind::PermissionDenied => CommitFailure::PermissionDenied,
            _ => CommitFailure::OsError,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::VariantCatalog;
    use crate::collect::{collect_files, filter_valid_slots, list_variant_directories};
    use crate::paths::variant_base_path;
    use crate::plan::{diff, normalize, plan_specs};
    use crate::probe::probe_original;
    use crate::test_helpers::{write_jpeg, write_png};
    use std::fs;
    use tempfile::TempDir;

    fn ladder() -> VariantCatalog {
        VariantCatalog::from_toml_str(
            r#"
            [[layer]]
            name = "primary"
            id = 1

            [[layer.spec]]
            width = 320
            format = "webp"
            required = true

            [[layer.spec]]
            width = 640
            format = "webp"
        "#,
        )
        .unwrap()
    }

    fn setup(tmp: &TempDir) -> (VariantBasePath, OriginalImage) {
        let origin_dir = tmp.path().join("l0orig");
        fs::create_dir_all(&origin_dir).unwrap();
        let origin = origin_dir.join("dawn.png");
        write_png(&origin, 1200, 900);
        for slot in ["l1w320", "l1w640"] {
            fs::create_dir(tmp.path().join(slot)).unwrap();
        }
        let base = variant_base_path(Path::new("l0orig/dawn.png")).unwrap();
        let image = OriginalImage {
            image: image::open(&origin).unwrap(),
            info: probe_original(&origin).unwrap(),
        };
        (base, image)
    }

    fn plan_for(tmp: &TempDir, base: &VariantBasePath, width: u32) -> VariantPlan {
        let dirs = list_variant_directories(tmp.path());
        let slots = filter_valid_slots(&dirs);
        let files = collect_files(tmp.path(), &slots, base);
        normalize(diff(plan_specs(&ladder(), width), files))
    }

    #[test]
    fn generates_missing_specs() {
        let tmp = TempDir::new().unwrap();
        let (base, image) = setup(&tmp);
        let plan = plan_for(&tmp, &base, image.info.width);
        assert_eq!(plan.missing.len(), 2);

        prepare_directories(tmp.path(), &plan, &base).unwrap();
        let results = commit_plan(tmp.path(), &base, &plan, VariantPolicy::converge(), &image);

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_success()));
        assert!(tmp.path().join("l1w320/dawn.webp").is_file());
        assert!(tmp.path().join("l1w640/dawn.webp").is_file());
    }

    #[test]
    fn second_run_reuses_everything() {
        let tmp = TempDir::new().unwrap();
        let (base, image) = setup(&tmp);

        let first = plan_for(&tmp, &base, image.info.width);
        prepare_directories(tmp.path(), &first, &base).unwrap();
        commit_plan(tmp.path(), &base, &first, VariantPolicy::converge(), &image);

        let second = plan_for(&tmp, &base, image.info.width);
        assert!(second.is_converged());
        let results = commit_plan(tmp.path(), &base, &second, VariantPolicy::converge(), &image);
        assert_eq!(results.len(), 2);
        assert!(
            results
                .iter()
                .all(|r| r.action() == CommitAction::Reuse && r.is_success())
        );
    }

    #[test]
    fn inspect_only_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        let (base, image) = setup(&tmp);
        let plan = plan_for(&tmp, &base, image.info.width);

        let results = commit_plan(
            tmp.path(),
            &base,
            &plan,
            VariantPolicy::inspect_only(),
            &image,
        );
        assert!(results.is_empty());
        assert!(!tmp.path().join("l1w320/dawn.webp").exists());
    }

    #[test]
    fn foreign_format_is_deleted_and_regenerated() {
        let tmp = TempDir::new().unwrap();
        let (base, image) = setup(&tmp);
        // A JPEG squatting in a WebP slot.
        write_jpeg(&tmp.path().join("l1w640/dawn.jpg"), 640, 480);

        let plan = plan_for(&tmp, &base, image.info.width);
        assert_eq!(plan.orphaned.len(), 1);
        assert!(plan.missing.iter().any(|s| s.slot.width == 640));

        prepare_directories(tmp.path(), &plan, &base).unwrap();
        let results = commit_plan(tmp.path(), &base, &plan, VariantPolicy::converge(), &image);

        assert!(results.iter().all(|r| r.is_success()));
        assert!(!tmp.path().join("l1w640/dawn.jpg").exists());
        assert!(tmp.path().join("l1w640/dawn.webp").is_file());
    }

    #[test]
    fn missing_slot_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let (base, image) = setup(&tmp);
        fs::remove_dir(tmp.path().join("l1w640")).unwrap();

        let mut plan = plan_for(&tmp, &base, image.info.width);
        // Collection no longer sees l1w640 but planning still wants it.
        assert!(plan.missing.iter().any(|s| s.slot.width == 640));
        plan.missing.retain(|s| s.slot.width == 640);

        let err = prepare_directories(tmp.path(), &plan, &base).unwrap_err();
        assert!(matches!(err, CommitError::SlotRootMissing(_)));
    }

    #[test]
    fn delete_of_vanished_file_reports_already_missing() {
        let tmp = TempDir::new().unwrap();
        let (base, image) = setup(&tmp);
        write_jpeg(&tmp.path().join("l1w640/dawn.jpg"), 640, 480);

        let mut plan = plan_for(&tmp, &base, image.info.width);
        plan.missing.clear();
        plan.mismatched.clear();
        fs::remove_file(tmp.path().join("l1w640/dawn.jpg")).unwrap();

        let results = commit_plan(tmp.path(), &base, &plan, VariantPolicy::converge(), &image);
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0],
            VariantCommitResult::failure(CommitAction::Delete, CommitFailure::FileAlreadyMissing)
        );
    }
}
