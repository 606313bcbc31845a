//! Dataset sorting.
//!
//! Splits each subject folder into images that stay and images that are moved
//! into a parallel invalid tree (`invalid_root/<folder>/<file>`), then empties
//! folders left with too few images. Images are moved, never copied or
//! deleted.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use dogset_media::fs_utils::{list_files, list_subdirs, move_file, same_path};
use dogset_media::metrics;
use dogset_media::SubjectValidator;
use dogset_models::naming::is_image_file;
use dogset_models::{RoutingReason, SubjectStatus};

use crate::error::CuratorResult;

/// An image moved into the invalid tree.
#[derive(Debug, Clone, Serialize)]
pub struct RoutedImage {
    pub from: PathBuf,
    pub to: PathBuf,
    pub reason: RoutingReason,
}

/// An image left in place because it could not be judged or moved.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedImage {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of partitioning one folder.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionReport {
    pub folder: PathBuf,
    /// Valid images left in the folder
    pub kept: Vec<PathBuf>,
    pub routed: Vec<RoutedImage>,
    pub skipped: Vec<SkippedImage>,
}

impl PartitionReport {
    fn new(folder: &Path) -> Self {
        Self {
            folder: folder.to_path_buf(),
            kept: Vec::new(),
            routed: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// Outcome of sorting a whole dataset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneReport {
    pub partitions: Vec<PartitionReport>,
    /// Folders emptied for holding fewer than the minimum images
    pub pruned_folders: Vec<PathBuf>,
    /// Files moved out of pruned folders
    pub pruned_files: Vec<RoutedImage>,
    pub skipped: Vec<SkippedImage>,
}

impl PruneReport {
    /// Total files moved into the invalid tree.
    pub fn moved_count(&self) -> usize {
        self.partitions.iter().map(|p| p.routed.len()).sum::<usize>() + self.pruned_files.len()
    }
}

/// Moves images that fail validation into the invalid tree.
pub struct DatasetSorter<'a> {
    validator: SubjectValidator<'a>,
}

impl<'a> DatasetSorter<'a> {
    pub fn new(validator: SubjectValidator<'a>) -> Self {
        Self { validator }
    }

    /// Evaluate every image directly inside `folder` and move each non-valid
    /// one to `invalid_root/<folder_name>/<file_name>`.
    ///
    /// Unreadable images are moved with reason `unreadable`. Detector failures
    /// and refused moves leave the image in place and are reported.
    pub async fn partition_folder(
        &self,
        folder: &Path,
        invalid_root: &Path,
    ) -> CuratorResult<PartitionReport> {
        let mut report = PartitionReport::new(folder);
        let invalid_dir = invalid_subdir(folder, invalid_root);

        for path in list_files(folder).await? {
            if !is_image_file(&path) {
                continue;
            }

            let reason = match self.validator.evaluate(&path) {
                Ok(status) => {
                    log_status(&path, &status);
                    match RoutingReason::from_status(&status) {
                        None => {
                            report.kept.push(path);
                            continue;
                        }
                        Some(reason) => reason,
                    }
                }
                Err(e) if e.is_unreadable_image() => {
                    warn!(path = %path.display(), error = %e, "Quarantining unreadable image");
                    RoutingReason::Unreadable
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not evaluate image");
                    report.skipped.push(SkippedImage {
                        path,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            match route(&path, &invalid_dir, reason).await {
                Ok(routed) => report.routed.push(routed),
                Err(skipped) => report.skipped.push(skipped),
            }
        }

        info!(
            folder = %folder.display(),
            kept = report.kept.len(),
            routed = report.routed.len(),
            skipped = report.skipped.len(),
            "Partitioned folder"
        );
        Ok(report)
    }

    /// Partition every subject folder under `data_root`, then empty every
    /// folder left with fewer than `minimum_count` images.
    ///
    /// The invalid root is never treated as a subject folder. Emptied folders
    /// stay in place.
    pub async fn prune_dataset(
        &self,
        data_root: &Path,
        invalid_root: &Path,
        minimum_count: usize,
    ) -> CuratorResult<PruneReport> {
        let mut report = PruneReport::default();

        for folder in list_subdirs(data_root).await? {
            if same_path(&folder, invalid_root) {
                continue;
            }

            let partition = self.partition_folder(&folder, invalid_root).await?;
            report.partitions.push(partition);

            let remaining = list_files(&folder).await?;
            let image_count = remaining.iter().filter(|p| is_image_file(p)).count();
            if image_count >= minimum_count {
                continue;
            }

            if remaining.is_empty() {
                debug!(folder = %folder.display(), "Folder already empty");
                continue;
            }

            info!(
                folder = %folder.display(),
                images = image_count,
                minimum = minimum_count,
                "Folder below minimum image count"
            );

            let invalid_dir = invalid_subdir(&folder, invalid_root);
            for path in remaining {
                match route(&path, &invalid_dir, RoutingReason::BelowMinimumCount).await {
                    Ok(routed) => report.pruned_files.push(routed),
                    Err(skipped) => report.skipped.push(skipped),
                }
            }
            metrics::record_folder_pruned();
            report.pruned_folders.push(folder);
        }

        info!(
            data_root = %data_root.display(),
            folders = report.partitions.len(),
            pruned = report.pruned_folders.len(),
            moved = report.moved_count(),
            "Dataset sorted"
        );
        Ok(report)
    }
}

/// `invalid_root/<folder_name>`.
fn invalid_subdir(folder: &Path, invalid_root: &Path) -> PathBuf {
    match folder.file_name() {
        Some(name) => invalid_root.join(name),
        None => invalid_root.to_path_buf(),
    }
}

fn log_status(path: &Path, status: &SubjectStatus) {
    match status {
        SubjectStatus::Valid { area_percent } => {
            debug!(path = %path.display(), area_percent, "Image valid")
        }
        SubjectStatus::Invalid { area_percent } => {
            info!(path = %path.display(), area_percent, "Subject too small")
        }
        SubjectStatus::TooManySubjects { count } => {
            info!(path = %path.display(), count, "Too many subjects")
        }
        SubjectStatus::NoSubject => info!(path = %path.display(), "No subject found"),
    }
}

/// Move `path` into `invalid_dir`, keeping its file name.
async fn route(
    path: &Path,
    invalid_dir: &Path,
    reason: RoutingReason,
) -> Result<RoutedImage, SkippedImage> {
    let Some(file_name) = path.file_name() else {
        return Err(SkippedImage {
            path: path.to_path_buf(),
            error: "path has no file name".to_string(),
        });
    };
    let destination = invalid_dir.join(file_name);

    match move_file(path, &destination).await {
        Ok(()) => {
            metrics::record_routed(reason.as_str());
            info!(
                from = %path.display(),
                to = %destination.display(),
                reason = %reason,
                "Moved image to invalid tree"
            );
            Ok(RoutedImage {
                from: path.to_path_buf(),
                to: destination,
                reason,
            })
        }
        Err(e) => {
            metrics::record_move_failed();
            warn!(
                from = %path.display(),
                to = %destination.display(),
                error = %e,
                "Could not move image"
            );
            Err(SkippedImage {
                path: path.to_path_buf(),
                error: e.to_string(),
            })
        }
    }
}
