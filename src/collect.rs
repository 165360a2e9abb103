//! Filesystem collection: what renditions exist on disk right now.
//!
//! Collection is the observation half of the reconcile loop. It lists the
//! slot directories under the media root, keeps only those whose names parse
//! as slots, and gathers every file sharing the origin's base stem inside
//! each — regardless of extension, since a stale rendition may carry the
//! wrong format entirely. All listings are sorted so planning is
//! deterministic run to run.

use crate::catalog::VariantSlot;
use crate::paths::VariantBasePath;
use crate::probe::probe;
use crate::types::VariantFile;
use log::debug;
use std::path::Path;
use walkdir::WalkDir;

/// List the names of first-level directories under the media root, skipping
/// symlinks and any directory whose name ends in `orig` (origin buckets are
/// never rendition slots). A missing root yields an empty list.
pub fn list_variant_directories(media_root: &Path) -> Vec<String> {
    if !media_root.is_dir() {
        return Vec::new();
    }

    let mut names: Vec<String> = WalkDir::new(media_root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir() && !entry.path_is_symlink())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| !name.ends_with("orig"))
        .collect();
    names.sort();
    names
}

/// Keep only directory names that parse as slots, in order.
///
/// Foreign directories next to the slot tree (exports, scratch dirs) are
/// silently ignored; they are outside the reconciler's jurisdiction.
pub fn filter_valid_slots(dir_names: &[String]) -> Vec<(String, VariantSlot)> {
    dir_names
        .iter()
        .filter_map(|name| VariantSlot::parse(name).map(|slot| (name.clone(), slot)))
        .collect()
}

/// Gather every probeable file sharing the origin's stem across the given
/// slot directories.
///
/// Each slot directory mirrors the origin's sub-path, so the search is a
/// flat listing of one directory per slot — no recursion. Files that fail
/// to probe are dropped (the planner will treat their slot as missing).
pub fn collect_files(
    media_root: &Path,
    slots: &[(String, VariantSlot)],
    base: &VariantBasePath,
) -> Vec<VariantFile> {
    let mut found = Vec::new();
    for (dir_name, slot) in slots {
        let dir = media_root.join(dir_name).join(base.parent());
        if !dir.is_dir() {
            continue;
        }

        let mut entries: Vec<_> = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .collect();
        entries.sort_by(|a, b| a.file_name().cmp(b.file_name()));

        for entry in entries {
            let stem_matches = entry
                .path()
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| stem == base.file_name());
            if !stem_matches {
                continue;
            }
            let Some(info) = probe(entry.path()) else {
                continue;
            };
            debug!(
                "collected {} ({}x{} {})",
                entry.path().display(),
                info.width,
                info.height,
                info.container
            );
            found.push(VariantFile {
                dir_name: dir_name.clone(),
                slot: *slot,
                relative_path: Path::new(dir_name)
                    .join(base.parent())
                    .join(entry.file_name()),
                info,
            });
        }
    }
    found
}
