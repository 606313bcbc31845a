//! Crop images to their subject.
//!
//! Detection is rerun on every image rather than reusing the validator's
//! result. Only images that already passed validation should reach the
//! cropper, so a missing subject here is an error, not a routing decision.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use tracing::{debug, info, warn};

use dogset_models::naming::is_image_file;
use dogset_models::{Detection, SubjectThresholds};

use crate::detection::SubjectDetector;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{list_files, list_subdirs, replace_image, save_image};
use crate::metrics;
use crate::validator::load_image;

/// An image that could not be cropped.
#[derive(Debug, Clone, Serialize)]
pub struct CropFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a cropping pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CropReport {
    /// Images written (in place or into the output tree)
    pub cropped: Vec<PathBuf>,
    pub failures: Vec<CropFailure>,
}

impl CropReport {
    fn merge(&mut self, other: CropReport) {
        self.cropped.extend(other.cropped);
        self.failures.extend(other.failures);
    }
}

/// Crops images to the highest-confidence qualifying detection.
#[derive(Clone, Copy)]
pub struct SubjectCropper<'a> {
    detector: &'a dyn SubjectDetector,
    thresholds: SubjectThresholds,
}

impl<'a> SubjectCropper<'a> {
    pub fn new(detector: &'a dyn SubjectDetector, thresholds: SubjectThresholds) -> Self {
        Self {
            detector,
            thresholds,
        }
    }

    /// Crop the image stored at `path`. Nothing is written.
    pub fn crop(&self, path: &Path) -> MediaResult<DynamicImage> {
        let image = load_image(path)?;
        self.crop_image(path, &image)
    }

    /// Crop an already decoded image; `path` only labels errors.
    pub fn crop_image(&self, path: &Path, image: &DynamicImage) -> MediaResult<DynamicImage> {
        let (width, height) = image.dimensions();
        let detections = self.detector.detect(image)?;

        let subject = best_subject(&detections, &self.thresholds)
            .ok_or_else(|| MediaError::NoSubjectDetected(path.to_path_buf()))?;

        let (x, y, w, h) = subject
            .bbox
            .pixel_rect(width, height)
            .ok_or_else(|| MediaError::InvalidCrop(path.to_path_buf()))?;

        debug!(
            path = %path.display(),
            x, y, w, h,
            confidence = subject.confidence,
            "Cropping to subject"
        );
        Ok(image.crop_imm(x, y, w, h))
    }

    /// Crop every image directly inside `folder`, overwriting each source.
    pub async fn process_single_directory(&self, folder: &Path) -> MediaResult<CropReport> {
        let mut report = CropReport::default();

        for path in list_files(folder).await? {
            if !is_image_file(&path) {
                continue;
            }
            match self.crop(&path).and_then(|cropped| replace_image(&path, &cropped)) {
                Ok(()) => {
                    metrics::record_cropped(true);
                    report.cropped.push(path);
                }
                Err(e) => record_failure(&mut report, path, e),
            }
        }

        info!(
            folder = %folder.display(),
            cropped = report.cropped.len(),
            failed = report.failures.len(),
            "Cropped folder in place"
        );
        Ok(report)
    }

    /// Crop every image in every immediate subdirectory of `input_root` into
    /// `output_root/<subdir>/<filename>`. Sources are left untouched.
    pub async fn process_directories(
        &self,
        input_root: &Path,
        output_root: &Path,
    ) -> MediaResult<CropReport> {
        let mut report = CropReport::default();

        for folder in list_subdirs(input_root).await? {
            let Some(folder_name) = folder.file_name() else {
                continue;
            };
            let target_dir = output_root.join(folder_name);

            let mut folder_report = CropReport::default();
            for path in list_files(&folder).await? {
                if !is_image_file(&path) {
                    continue;
                }
                let Some(file_name) = path.file_name() else {
                    continue;
                };
                let target = target_dir.join(file_name);
                match self.crop(&path).and_then(|cropped| save_image(&target, &cropped)) {
                    Ok(()) => {
                        metrics::record_cropped(false);
                        folder_report.cropped.push(target);
                    }
                    Err(e) => record_failure(&mut folder_report, path, e),
                }
            }

            info!(
                folder = %folder.display(),
                output = %target_dir.display(),
                cropped = folder_report.cropped.len(),
                failed = folder_report.failures.len(),
                "Cropped folder"
            );
            report.merge(folder_report);
        }

        Ok(report)
    }
}

/// Highest-confidence detection that counts as the subject.
///
/// Ties keep the earliest detection.
pub fn best_subject<'d>(
    detections: &'d [Detection],
    thresholds: &SubjectThresholds,
) -> Option<&'d Detection> {
    detections
        .iter()
        .filter(|d| d.qualifies(thresholds.target_class, thresholds.confidence))
        .fold(None, |best: Option<&Detection>, d| match best {
            Some(b) if b.confidence >= d.confidence => Some(b),
            _ => Some(d),
        })
}

fn failure_reason(error: &MediaError) -> &'static str {
    match error {
        MediaError::NoSubjectDetected(_) => "no_subject_detected",
        MediaError::InvalidCrop(_) => "invalid_crop",
        e if e.is_unreadable_image() => "unreadable",
        MediaError::ImageEncode { .. } => "encode",
        _ => "other",
    }
}

fn record_failure(report: &mut CropReport, path: PathBuf, error: MediaError) {
    let reason = failure_reason(&error);
    warn!(path = %path.display(), reason, error = %error, "Crop failed");
    metrics::record_crop_failed(reason);
    report.failures.push(CropFailure {
        path,
        reason: error.to_string(),
    });
}
