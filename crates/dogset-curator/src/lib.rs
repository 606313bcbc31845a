//! Dataset curation for per-subject dog image folders.
//!
//! This crate provides:
//! - Sorting of subject folders into valid and invalid trees
//! - Pruning of folders below a minimum image count
//! - Dense renumbering of the curated tree
//! - Batch video ingest and train/test splitting
//! - Single-video and full-dataset pipelines
//! - Environment configuration and structured run logging

pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod normalizer;
pub mod pipeline;
pub mod sorter;
pub mod split;

pub use config::CurationConfig;
pub use error::{CuratorError, CuratorResult};
pub use ingest::{extract_dataset_from_videos, ingest_new_videos, IngestReport};
pub use logging::{init_tracing, RunLogger};
pub use normalizer::{rename_folders_by_count, DatasetNormalizer, NormalizeReport};
pub use pipeline::{CurationPipeline, DatasetPipelineReport, VideoPipelineReport};
pub use sorter::{DatasetSorter, PartitionReport, PruneReport, RoutedImage, SkippedImage};
pub use split::{split_dataset, SplitReport};

use dogset_media::{MediaResult, SubjectDetector};

/// Build the detector for this build.
///
/// With the `onnx` feature this loads the YOLOv8 model named by the config.
/// Without it, a marker detector that reports pure red regions as dogs is
/// used, which is only meaningful for synthetic fixtures and dry runs.
pub fn build_detector(config: &CurationConfig) -> MediaResult<Box<dyn SubjectDetector>> {
    #[cfg(feature = "onnx")]
    {
        let detector = dogset_media::YoloDetector::new(config.detector.clone())?;
        Ok(Box::new(detector))
    }

    #[cfg(not(feature = "onnx"))]
    {
        tracing::warn!(
            model_path = %config.detector.model_path,
            "Built without the onnx feature; using the marker detector"
        );
        Ok(Box::new(dogset_media::MarkerDetector::new(vec![
            dogset_media::ColorMarker::new([255, 0, 0], config.thresholds.target_class, 0.99),
        ])))
    }
}
