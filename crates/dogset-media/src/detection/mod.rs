//! Subject detection.
//!
//! Detectors turn a decoded image into COCO-labelled boxes in pixel
//! coordinates. The validator and cropper only see the [`SubjectDetector`]
//! trait; which backend runs is decided once at startup.
//!
//! Backends:
//! - [`YoloDetector`]: YOLOv8 ONNX model via ONNX Runtime (`onnx` feature)
//! - [`FixedDetector`]: returns a fixed list of detections
//! - [`MarkerDetector`]: finds solid colour markers, for fixtures and dry runs

mod mock;
mod yolo;

use image::DynamicImage;

use dogset_models::Detection;

use crate::error::MediaResult;

pub use mock::{ColorMarker, FixedDetector, MarkerDetector};
#[cfg(feature = "onnx")]
pub use yolo::YoloDetector;
pub use yolo::{
    decode_yolov8_output, is_model_available_at, non_maximum_suppression, YoloDetectorConfig,
    DEFAULT_MODEL_PATH, YOLO_NUM_CLASSES,
};

/// Image to detections.
///
/// Implementations are immutable after construction and shared by reference
/// across a whole run.
pub trait SubjectDetector: Send + Sync {
    /// Detect objects in a decoded image.
    fn detect(&self, image: &DynamicImage) -> MediaResult<Vec<Detection>>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

impl<T: SubjectDetector + ?Sized> SubjectDetector for Box<T> {
    fn detect(&self, image: &DynamicImage) -> MediaResult<Vec<Detection>> {
        (**self).detect(image)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
