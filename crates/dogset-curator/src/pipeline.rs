//! End-to-end curation pipelines.
//!
//! - Single video: extract, partition the new folder, crop survivors in place.
//! - Dataset: ingest a directory of videos, prune, crop every folder in
//!   place, normalize.
//!
//! Steps run one after another; each step only sees the tree the previous
//! step left behind.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::Instrument;

use dogset_media::fs_utils::{list_subdirs, same_path};
use dogset_media::{CropReport, ExtractionSummary, FrameExtractor, SubjectCropper, SubjectDetector, SubjectValidator};
use dogset_models::RunId;

use crate::config::CurationConfig;
use crate::error::{require_dir, CuratorError, CuratorResult};
use crate::ingest::{ingest_new_videos, IngestReport};
use crate::logging::RunLogger;
use crate::normalizer::{DatasetNormalizer, NormalizeReport};
use crate::sorter::{DatasetSorter, PartitionReport, PruneReport};

/// Outcome of the single-video pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct VideoPipelineReport {
    pub run_id: RunId,
    pub extraction: ExtractionSummary,
    pub partition: PartitionReport,
    pub crop: CropReport,
}

/// Outcome of the dataset pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetPipelineReport {
    pub run_id: RunId,
    pub ingest: IngestReport,
    pub prune: PruneReport,
    pub crop: CropReport,
    pub normalize: NormalizeReport,
}

/// Runs the curation steps with one detector and one configuration.
pub struct CurationPipeline<'a> {
    config: &'a CurationConfig,
    detector: &'a dyn SubjectDetector,
}

impl<'a> CurationPipeline<'a> {
    pub fn new(config: &'a CurationConfig, detector: &'a dyn SubjectDetector) -> Self {
        Self { config, detector }
    }

    pub fn validator(&self) -> SubjectValidator<'a> {
        SubjectValidator::new(self.detector, self.config.thresholds)
    }

    pub fn sorter(&self) -> DatasetSorter<'a> {
        DatasetSorter::new(self.validator())
    }

    pub fn cropper(&self) -> SubjectCropper<'a> {
        SubjectCropper::new(self.detector, self.config.thresholds)
    }

    pub fn normalizer(&self) -> DatasetNormalizer {
        DatasetNormalizer::new(self.config.subject_prefix.clone()).exclude(self.config.invalid_root())
    }

    /// Extract `video` into `output_dir/<stem>/`, move invalid stills to
    /// `invalid_root/<stem>/` and crop the rest in place.
    pub async fn process_video(
        &self,
        video: &Path,
        output_dir: &Path,
        invalid_root: &Path,
    ) -> CuratorResult<VideoPipelineReport> {
        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id, "video_pipeline");
        let span = logger.create_span();

        async {
            logger.log_start(&video.display().to_string());

            let extraction = FrameExtractor::new(self.config.interval_secs)
                .extract_frames(video, output_dir)
                .await?;
            logger.log_progress(&format!("extracted {} stills", extraction.images.len()));

            let partition = self
                .sorter()
                .partition_folder(&extraction.output_dir, invalid_root)
                .await?;
            logger.log_progress(&format!(
                "kept {} stills, moved {}",
                partition.kept.len(),
                partition.routed.len()
            ));

            let crop = self
                .cropper()
                .process_single_directory(&extraction.output_dir)
                .await?;
            if !crop.failures.is_empty() {
                logger.log_warning(&format!("{} stills could not be cropped", crop.failures.len()));
            }

            logger.log_completion(&format!("{} stills ready", crop.cropped.len()));
            Ok::<_, CuratorError>(VideoPipelineReport {
                run_id: run_id.clone(),
                extraction,
                partition,
                crop,
            })
        }
        .instrument(span)
        .await
        .inspect_err(|e| logger.log_error(&e.to_string()))
    }

    /// Ingest every video in the configured video directory and curate the
    /// resulting data tree.
    pub async fn process_dataset(&self) -> CuratorResult<DatasetPipelineReport> {
        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id, "dataset_pipeline");
        let span = logger.create_span();
        let config = self.config;
        let invalid_root = config.invalid_root();

        async {
            logger.log_start(&config.video_dir.display().to_string());

            let ingest = ingest_new_videos(
                &config.video_dir,
                &config.data_dir,
                config.interval_secs,
                &config.subject_prefix,
            )
            .await?;
            logger.log_progress(&format!(
                "ingested {} videos ({} failed)",
                ingest.extracted.len(),
                ingest.failed.len()
            ));

            let prune = self
                .sorter()
                .prune_dataset(&config.data_dir, &invalid_root, config.min_images)
                .await?;
            logger.log_progress(&format!("moved {} images to the invalid tree", prune.moved_count()));

            let crop = self.crop_all_in_place(&config.data_dir, &invalid_root).await?;
            logger.log_progress(&format!("cropped {} images", crop.cropped.len()));

            let normalize = self.normalizer().rename_folders_by_count(&config.data_dir).await?;

            logger.log_completion(&format!("{} subjects", normalize.renamed.len()));
            Ok::<_, CuratorError>(DatasetPipelineReport {
                run_id: run_id.clone(),
                ingest,
                prune,
                crop,
                normalize,
            })
        }
        .instrument(span)
        .await
        .inspect_err(|e| logger.log_error(&e.to_string()))
    }

    /// Crop in place every subject folder under `data_root`.
    pub async fn crop_all_in_place(
        &self,
        data_root: &Path,
        invalid_root: &Path,
    ) -> CuratorResult<CropReport> {
        require_dir(data_root)?;
        let cropper = self.cropper();
        let mut report = CropReport::default();

        for folder in subject_folders(data_root, invalid_root).await? {
            let folder_report = cropper.process_single_directory(&folder).await?;
            report.cropped.extend(folder_report.cropped);
            report.failures.extend(folder_report.failures);
        }
        Ok(report)
    }
}

/// Subject folders under `data_root`, skipping the invalid root.
pub async fn subject_folders(data_root: &Path, invalid_root: &Path) -> CuratorResult<Vec<PathBuf>> {
    Ok(list_subdirs(data_root)
        .await?
        .into_iter()
        .filter(|d| !same_path(d, invalid_root))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dogset_media::FixedDetector;
    use tempfile::TempDir;

    fn config_in(root: &Path) -> CurationConfig {
        CurationConfig {
            video_dir: root.join("videos"),
            data_dir: root.join("data"),
            ..CurationConfig::default()
        }
    }

    #[tokio::test]
    async fn test_dataset_pipeline_requires_video_dir() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let detector = FixedDetector::empty();

        let result = CurationPipeline::new(&config, &detector).process_dataset().await;
        assert!(matches!(result, Err(CuratorError::DirectoryNotFound(p)) if p == dir.path().join("videos")));
    }

    #[tokio::test]
    async fn test_video_pipeline_fails_on_missing_video() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let detector = FixedDetector::empty();

        let result = CurationPipeline::new(&config, &detector)
            .process_video(&dir.path().join("missing.mp4"), &config.data_dir, &config.invalid_root())
            .await;
        assert!(result.is_err());
        assert!(!config.data_dir.join("missing").exists());
    }

    #[tokio::test]
    async fn test_subject_folders_skip_invalid_root() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        for name in ["b", "a", "invalid_data"] {
            std::fs::create_dir_all(data.join(name)).unwrap();
        }

        let folders = subject_folders(&data, &data.join("invalid_data")).await.unwrap();
        assert_eq!(folders, vec![data.join("a"), data.join("b")]);
    }
}
