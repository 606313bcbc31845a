//! Subject validation.
//!
//! An image is valid when the detector finds exactly one qualifying subject
//! (target class, confidence strictly above the threshold) whose box covers
//! strictly more than the area threshold of the frame.

use std::path::Path;

use image::{DynamicImage, GenericImageView};
use tracing::debug;

use dogset_models::{Detection, SubjectStatus, SubjectThresholds};

use crate::detection::SubjectDetector;
use crate::error::{MediaError, MediaResult};
use crate::metrics;

/// Decode an image from disk.
pub fn load_image(path: &Path) -> MediaResult<DynamicImage> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    image::open(path).map_err(|e| MediaError::image_decode(path, e))
}

/// Percentage of a `width` x `height` image covered by `detection`'s box,
/// after clipping the box to the image.
pub fn area_percent(detection: &Detection, width: u32, height: u32) -> f64 {
    let image_area = width as f64 * height as f64;
    if image_area <= 0.0 {
        return 0.0;
    }
    let clipped = detection.bbox.clip(width, height);
    clipped.width() as f64 * clipped.height() as f64 / image_area * 100.0
}

/// Classify an image from its detections.
pub fn classify(
    detections: &[Detection],
    width: u32,
    height: u32,
    thresholds: &SubjectThresholds,
) -> SubjectStatus {
    let mut qualifying = detections
        .iter()
        .filter(|d| d.qualifies(thresholds.target_class, thresholds.confidence));

    let Some(subject) = qualifying.next() else {
        return SubjectStatus::NoSubject;
    };

    let extra = qualifying.count();
    if extra > 0 {
        return SubjectStatus::TooManySubjects { count: extra + 1 };
    }

    let area_percent = area_percent(subject, width, height);
    if area_percent > thresholds.area_percent {
        SubjectStatus::Valid { area_percent }
    } else {
        SubjectStatus::Invalid { area_percent }
    }
}

/// Runs a detector over images and classifies them.
#[derive(Clone, Copy)]
pub struct SubjectValidator<'a> {
    detector: &'a dyn SubjectDetector,
    thresholds: SubjectThresholds,
}

impl<'a> SubjectValidator<'a> {
    pub fn new(detector: &'a dyn SubjectDetector, thresholds: SubjectThresholds) -> Self {
        Self {
            detector,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &SubjectThresholds {
        &self.thresholds
    }

    /// Evaluate the image stored at `path`.
    ///
    /// Unreadable images are an error, never a verdict.
    pub fn evaluate(&self, path: &Path) -> MediaResult<SubjectStatus> {
        let image = load_image(path)?;
        let status = self.evaluate_image(&image)?;
        debug!(path = %path.display(), status = %status, "Evaluated image");
        Ok(status)
    }

    /// Evaluate an already decoded image.
    pub fn evaluate_image(&self, image: &DynamicImage) -> MediaResult<SubjectStatus> {
        let (width, height) = image.dimensions();
        let detections = self.detector.detect(image)?;
        let status = classify(&detections, width, height, &self.thresholds);
        metrics::record_evaluation(status.as_str());
        Ok(status)
    }
}

/// Evaluate one image with the given detector and thresholds.
pub fn evaluate(
    path: &Path,
    detector: &dyn SubjectDetector,
    thresholds: &SubjectThresholds,
) -> MediaResult<SubjectStatus> {
    SubjectValidator::new(detector, *thresholds).evaluate(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::FixedDetector;
    use dogset_models::{BoundingBox, DOG_CLASS_ID};
    use image::{Rgb, RgbImage};

    fn dog(confidence: f32, bbox: BoundingBox) -> Detection {
        Detection::new(DOG_CLASS_ID, confidence, bbox)
    }

    #[test]
    fn test_full_frame_subject_is_valid() {
        let thresholds = SubjectThresholds::default();
        let detections = [dog(0.9, BoundingBox::full_frame(640, 480))];

        let status = classify(&detections, 640, 480, &thresholds);
        assert_eq!(status, SubjectStatus::Valid { area_percent: 100.0 });
    }

    #[test]
    fn test_no_qualifying_subject() {
        let thresholds = SubjectThresholds {
            area_percent: 0.0,
            confidence: 0.0,
            ..Default::default()
        };
        let detections = [Detection::new(0, 0.99, BoundingBox::full_frame(100, 100))];

        assert_eq!(classify(&detections, 100, 100, &thresholds), SubjectStatus::NoSubject);
        assert_eq!(classify(&[], 100, 100, &thresholds), SubjectStatus::NoSubject);
    }

    #[test]
    fn test_confidence_must_exceed_threshold() {
        let thresholds = SubjectThresholds::default();
        let detections = [dog(0.5, BoundingBox::full_frame(100, 100))];
        assert_eq!(classify(&detections, 100, 100, &thresholds), SubjectStatus::NoSubject);
    }

    #[test]
    fn test_too_many_subjects() {
        let thresholds = SubjectThresholds::default();
        let detections = [
            dog(0.9, BoundingBox::new(0.0, 0.0, 50.0, 50.0)),
            dog(0.8, BoundingBox::new(50.0, 50.0, 100.0, 100.0)),
            dog(0.3, BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
        ];

        let status = classify(&detections, 100, 100, &thresholds);
        assert_eq!(status, SubjectStatus::TooManySubjects { count: 2 });
        assert_eq!(status.area_percent(), None);
    }

    #[test]
    fn test_small_subject_is_invalid() {
        let thresholds = SubjectThresholds::default();
        // 40x40 in 100x100 = 16%
        let detections = [dog(0.9, BoundingBox::new(10.0, 10.0, 50.0, 50.0))];

        match classify(&detections, 100, 100, &thresholds) {
            SubjectStatus::Invalid { area_percent } => assert!((area_percent - 16.0).abs() < 1e-6),
            other => panic!("expected invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_area_threshold_is_strict() {
        let thresholds = SubjectThresholds::default();
        // 20x100 in 100x100 = exactly 20%
        let detections = [dog(0.9, BoundingBox::new(0.0, 0.0, 20.0, 100.0))];
        assert!(!classify(&detections, 100, 100, &thresholds).is_valid());
    }

    #[test]
    fn test_box_is_clipped_before_area() {
        let detection = dog(0.9, BoundingBox::new(-50.0, -50.0, 150.0, 150.0));
        assert!((area_percent(&detection, 100, 100) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_evaluate_unreadable_image() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not a jpeg").unwrap();

        let detector = FixedDetector::empty();
        let err = evaluate(&path, &detector, &SubjectThresholds::default()).unwrap_err();
        assert!(err.is_unreadable_image());
    }

    #[test]
    fn test_evaluate_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rex_1.jpg");
        RgbImage::from_pixel(64, 48, Rgb([10, 10, 10])).save(&path).unwrap();

        let detector = FixedDetector::new(vec![dog(0.9, BoundingBox::new(0.0, 0.0, 32.0, 48.0))]);
        let validator = SubjectValidator::new(&detector, SubjectThresholds::default());

        let status = validator.evaluate(&path).unwrap();
        assert_eq!(status, SubjectStatus::Valid { area_percent: 50.0 });
    }
}
