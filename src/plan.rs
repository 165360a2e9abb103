//! Planning: diff the catalog's targets against the collected files.
//!
//! The plan is a pure value partitioning everything into four branches:
//!
//! | branch       | meaning                                        | commit action |
//! |--------------|------------------------------------------------|---------------|
//! | `matched`    | file satisfies its spec's content contract     | reuse         |
//! | `mismatched` | right slot, wrong content                      | regenerate    |
//! | `missing`    | spec has no usable file                        | generate      |
//! | `orphaned`   | file claims no planned spec                    | delete        |
//!
//! [`diff`] produces the raw partition; [`normalize`] then demotes files
//! whose format literally disagrees with their spec (wrong container or
//! codec) to `orphaned`, re-adding the spec to `missing` when nothing
//! usable survives for it. Normalization is idempotent.

use crate::catalog::{VariantCatalog, VariantSpec};
use crate::probe::ImageFileInfo;
use crate::types::VariantFile;

/// One spec paired with a file occupying its slot.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantComparison {
    pub spec: VariantSpec,
    pub file: VariantFile,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariantPlan {
    pub matched: Vec<VariantComparison>,
    pub mismatched: Vec<VariantComparison>,
    pub missing: Vec<VariantSpec>,
    pub orphaned: Vec<VariantFile>,
}

impl VariantPlan {
    /// True when the commit phase would have nothing to do.
    pub fn is_converged(&self) -> bool {
        self.mismatched.is_empty() && self.missing.is_empty() && self.orphaned.is_empty()
    }
}

/// Select which specs apply to an original of the given width.
///
/// Upscaling is never planned: a spec is skipped unless it is required or
/// its target width is strictly smaller than the original's. Required specs
/// are always planned so the fallback chain exists even for tiny originals.
///
/// `original_width` is the probed header width, before any EXIF orientation
/// is baked in. Planning and preprocessing stay consistent that way: slot
/// names are stable whether or not the file carries an orientation tag, at
/// the cost of a 90-degree-rotated original being measured on its stored
/// axis.
pub fn plan_specs(catalog: &VariantCatalog, original_width: u32) -> Vec<VariantSpec> {
    catalog
        .layers
        .iter()
        .flat_map(|layer| layer.specs.iter())
        .filter(|spec| spec.required || spec.slot.width < original_width)
        .cloned()
        .collect()
}

/// Does this file satisfy the spec's content contract?
///
/// Width and container must agree; the codec is checked only when the spec
/// declares one (a JPEG spec has no codec hint and accepts any).
fn content_matches(spec: &VariantSpec, info: &ImageFileInfo) -> bool {
    if info.width != spec.slot.width || info.container != spec.format.container {
        return false;
    }
    match spec.format.codec {
        Some(codec) => info.codec == Some(codec),
        None => true,
    }
}

/// Literal format agreement used by [`normalize`]: container and codec must
/// both be equal, `None` included. A file whose codec is unknown does not
/// satisfy a spec that pins one.
fn format_matches(spec: &VariantSpec, info: &ImageFileInfo) -> bool {
    info.container == spec.format.container && info.codec == spec.format.codec
}

/// Partition planned specs and collected files into the four plan branches.
///
/// Files are claimed by the spec owning their slot. At most one file per
/// spec is matched: the first content match in collection order wins, and
/// every other claimed file becomes mismatched. Files whose slot no planned
/// spec owns are orphaned.
pub fn diff(specs: Vec<VariantSpec>, files: Vec<VariantFile>) -> VariantPlan {
    let mut plan = VariantPlan::default();
    let mut claimed: Vec<Vec<VariantFile>> = specs.iter().map(|_| Vec::new()).collect();

    'files: for file in files {
        for (i, spec) in specs.iter().enumerate() {
            if spec.slot == file.slot {
                claimed[i].push(file);
                continue 'files;
            }
        }
        plan.orphaned.push(file);
    }

    for (spec, candidates) in specs.into_iter().zip(claimed) {
        if candidates.is_empty() {
            plan.missing.push(spec);
            continue;
        }
        let mut matched = false;
        for file in candidates {
            if !matched && content_matches(&spec, &file.info) {
                matched = true;
                plan.matched.push(VariantComparison {
                    spec: spec.clone(),
                    file,
                });
            } else {
                plan.mismatched.push(VariantComparison {
                    spec: spec.clone(),
                    file,
                });
            }
        }
    }

    plan
}

/// Demote format-foreign mismatched files to orphaned.
///
/// A mismatched file in the right container is worth regenerating in place;
/// one in the wrong container or codec is a leftover from a catalog change
/// and must be deleted, not overwritten (its extension differs, so a
/// regenerate would strand it). Matched entries already satisfy their format
/// and pass through. Specs that lose their last comparison are re-added to
/// `missing` so the slot still converges.
pub fn normalize(plan: VariantPlan) -> VariantPlan {
    let mut out = VariantPlan {
        matched: plan.matched,
        missing: plan.missing,
        orphaned: plan.orphaned,
        ..VariantPlan::default()
    };
    let mut demoted: Vec<VariantSpec> = Vec::new();

    for comparison in plan.mismatched {
        if format_matches(&comparison.spec, &comparison.file.info) {
            out.mismatched.push(comparison);
        } else {
            if !demoted.contains(&comparison.spec) {
                demoted.push(comparison.spec.clone());
            }
            out.orphaned.push(comparison.file);
        }
    }

    for spec in demoted {
        let survives = out
            .matched
            .iter()
            .chain(out.mismatched.iter())
            .any(|c| c.spec.slot == spec.slot);
        if !survives && !out.missing.iter().any(|s| s.slot == spec.slot) {
            out.missing.push(spec);
        }
    }

    out
}
