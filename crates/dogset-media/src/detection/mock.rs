//! Deterministic detectors for fixtures and dry runs.

use image::{DynamicImage, Rgb};

use dogset_models::{BoundingBox, Detection};

use super::SubjectDetector;
use crate::error::MediaResult;

/// Returns the same detections for every image.
#[derive(Debug, Clone, Default)]
pub struct FixedDetector {
    detections: Vec<Detection>,
}

impl FixedDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    /// Detector that never finds anything.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl SubjectDetector for FixedDetector {
    fn detect(&self, _image: &DynamicImage) -> MediaResult<Vec<Detection>> {
        Ok(self.detections.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// A solid colour that the [`MarkerDetector`] reports as an object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMarker {
    pub color: Rgb<u8>,
    pub class_id: usize,
    pub confidence: f32,
}

impl ColorMarker {
    pub fn new(color: [u8; 3], class_id: usize, confidence: f32) -> Self {
        Self {
            color: Rgb(color),
            class_id,
            confidence,
        }
    }
}

/// Reports one detection per marker colour present in the image.
///
/// The box is the bounding rectangle of every pixel within `tolerance` of the
/// marker colour on each channel. Tolerance absorbs JPEG round-trips.
#[derive(Debug, Clone)]
pub struct MarkerDetector {
    markers: Vec<ColorMarker>,
    tolerance: u8,
}

impl MarkerDetector {
    pub const DEFAULT_TOLERANCE: u8 = 48;

    pub fn new(markers: Vec<ColorMarker>) -> Self {
        Self {
            markers,
            tolerance: Self::DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: u8) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn matches(&self, pixel: &Rgb<u8>, marker: &Rgb<u8>) -> bool {
        pixel
            .0
            .iter()
            .zip(marker.0.iter())
            .all(|(p, m)| p.abs_diff(*m) <= self.tolerance)
    }
}

impl SubjectDetector for MarkerDetector {
    fn detect(&self, image: &DynamicImage) -> MediaResult<Vec<Detection>> {
        let rgb = image.to_rgb8();

        // (xmin, ymin, xmax, ymax) per marker, inclusive
        let mut extents: Vec<Option<(u32, u32, u32, u32)>> = vec![None; self.markers.len()];

        for (x, y, pixel) in rgb.enumerate_pixels() {
            for (marker, extent) in self.markers.iter().zip(extents.iter_mut()) {
                if !self.matches(pixel, &marker.color) {
                    continue;
                }
                *extent = Some(match *extent {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }

        Ok(self
            .markers
            .iter()
            .zip(extents)
            .filter_map(|(marker, extent)| {
                extent.map(|(x0, y0, x1, y1)| {
                    let bbox =
                        BoundingBox::new(x0 as f32, y0 as f32, (x1 + 1) as f32, (y1 + 1) as f32);
                    Detection::new(marker.class_id, marker.confidence, bbox)
                })
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "marker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dogset_models::DOG_CLASS_ID;
    use image::RgbImage;

    fn canvas_with_block(x0: u32, y0: u32, w: u32, h: u32, color: [u8; 3]) -> DynamicImage {
        let mut img = RgbImage::from_pixel(100, 80, Rgb([128, 128, 128]));
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Rgb(color));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_fixed_detector() {
        let det = Detection::new(DOG_CLASS_ID, 0.9, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        let detector = FixedDetector::new(vec![det.clone()]);
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        assert_eq!(detector.detect(&img).unwrap(), vec![det]);
        assert!(FixedDetector::empty().detect(&img).unwrap().is_empty());
    }

    #[test]
    fn test_marker_detector_finds_block() {
        let img = canvas_with_block(10, 20, 30, 15, [255, 0, 0]);
        let detector = MarkerDetector::new(vec![ColorMarker::new([255, 0, 0], DOG_CLASS_ID, 0.9)]);

        let detections = detector.detect(&img).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bbox, BoundingBox::new(10.0, 20.0, 40.0, 35.0));
        assert_eq!(detections[0].class_id, DOG_CLASS_ID);
    }

    #[test]
    fn test_marker_detector_absent_colour() {
        let img = canvas_with_block(10, 20, 30, 15, [255, 0, 0]);
        let detector = MarkerDetector::new(vec![ColorMarker::new([0, 0, 255], DOG_CLASS_ID, 0.9)]);
        assert!(detector.detect(&img).unwrap().is_empty());
    }
}
