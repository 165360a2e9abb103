//! Mapping commit outcomes to persistence-ready records.
//!
//! Records are what a caller stores after a run — typically in the `store`
//! phase. The original itself gets a record too (quality `None`), so the
//! stored shape is uniform: every row names a file, its encoding, and its
//! display geometry.

use crate::catalog::{Codec, Container, VariantCatalog};
use crate::types::{CommitAction, OriginalFile, VariantCommitResult, VariantReport};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantRecord {
    pub relative_path: PathBuf,
    pub layer_id: u32,
    pub container: Container,
    pub codec: Option<Codec>,
    pub bytes: u64,
    pub width: u32,
    pub height: u32,
    pub quality: Option<u8>,
}

/// The original's own record, straight from its probe. The original lives
/// in layer 0, outside every catalog layer.
pub fn original_record(file: &OriginalFile) -> VariantRecord {
    VariantRecord {
        relative_path: file.relative_path.clone(),
        layer_id: 0,
        container: file.info.container,
        codec: file.info.codec,
        bytes: file.info.bytes,
        width: file.info.width,
        height: file.info.height,
        quality: None,
    }
}

/// A freshly written rendition's record. The encoding comes from the spec
/// (that is the contract the file was written under); geometry and size
/// come from the re-probe of the file itself.
fn report_record(report: &VariantReport) -> VariantRecord {
    VariantRecord {
        relative_path: report.relative_path.clone(),
        layer_id: report.spec.slot.layer_id,
        container: report.spec.format.container,
        codec: report.spec.format.codec,
        bytes: report.info.bytes,
        width: report.info.width,
        height: report.info.height,
        quality: report.spec.quality,
    }
}

/// Group successful generate/regenerate reports into catalog layer order.
/// Layers with nothing written are dropped.
pub fn commit_results_to_layers(
    results: &[VariantCommitResult],
    catalog: &VariantCatalog,
) -> Vec<Vec<VariantRecord>> {
    catalog
        .layers
        .iter()
        .map(|layer| {
            results
                .iter()
                .filter(|result| {
                    result.is_success()
                        && matches!(
                            result.action(),
                            CommitAction::Generate | CommitAction::Regenerate
                        )
                })
                .filter_map(VariantCommitResult::report)
                .filter(|report| report.spec.slot.layer_id == layer.layer_id)
                .map(report_record)
                .collect::<Vec<_>>()
        })
        .filter(|records| !records.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{VariantFormat, VariantSlot, VariantSpec};
    use crate::probe::ImageFileInfo;
    use crate::types::CommitFailure;
    use std::path::Path;

    fn info(width: u32) -> ImageFileInfo {
        ImageFileInfo {
            path: PathBuf::from("/media/x"),
            container: Container::Webp,
            codec: Some(Codec::Vp8),
            bytes: 2048,
            width,
            height: width * 3 / 4,
            lossless: false,
        }
    }

    fn report(layer_id: u32, width: u32) -> VariantReport {
        VariantReport {
            spec: VariantSpec {
                slot: VariantSlot::new(layer_id, width),
                format: VariantFormat::WEBP,
                quality: Some(70),
                required: false,
            },
            relative_path: PathBuf::from(format!("l{layer_id}w{width}/dawn.webp")),
            info: info(width),
        }
    }

    #[test]
    fn original_record_has_no_quality() {
        let file = OriginalFile {
            relative_path: PathBuf::from("l0orig/dawn.png"),
            info: ImageFileInfo {
                container: Container::Png,
                codec: None,
                lossless: true,
                ..info(1200)
            },
        };
        let record = original_record(&file);
        assert_eq!(record.relative_path, Path::new("l0orig/dawn.png"));
        assert_eq!(record.layer_id, 0);
        assert_eq!(record.container, Container::Png);
        assert_eq!(record.quality, None);
        assert_eq!(record.width, 1200);
    }

    #[test]
    fn groups_generated_reports_by_layer_and_drops_empty() {
        let catalog = VariantCatalog::default(); // layers 1 and 9
        let results = vec![
            VariantCommitResult::success(CommitAction::Generate, Some(report(1, 320))),
            VariantCommitResult::success(CommitAction::Regenerate, Some(report(1, 640))),
            // Reuse and failures never become records.
            VariantCommitResult::success(CommitAction::Reuse, Some(report(9, 320))),
            VariantCommitResult::failure(CommitAction::Generate, CommitFailure::SaveFailed),
        ];

        let layers = commit_results_to_layers(&results, &catalog);
        assert_eq!(layers.len(), 1); // fallback layer dropped
        assert_eq!(layers[0].len(), 2);
        assert_eq!(layers[0][0].width, 320);
        assert_eq!(layers[0][1].width, 640);
        assert_eq!(layers[0][0].quality, Some(70));
    }
}
