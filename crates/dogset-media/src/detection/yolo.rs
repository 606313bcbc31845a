//! YOLOv8 object detection.
//!
//! Output decoding and NMS are plain functions over the raw output tensor so
//! they build and test without ONNX Runtime. The session-backed detector is
//! behind the `onnx` feature and selects an execution provider at startup:
//! - CUDA on Linux with NVIDIA GPU (when `cuda` feature enabled)
//! - CoreML on macOS
//! - CPU fallback on all platforms

use std::path::Path;

use ndarray::ArrayView2;

use dogset_models::{BoundingBox, Detection};

use crate::error::{MediaError, MediaResult};

/// Default location of the YOLOv8 model.
pub const DEFAULT_MODEL_PATH: &str = "models/object_detection/yolov8m.onnx";

/// Number of COCO classes in a stock YOLOv8 head.
pub const YOLO_NUM_CLASSES: usize = 80;

/// Rows per candidate: 4 box values (cx, cy, w, h) followed by class scores.
const YOLO_FEATURES: usize = 4 + YOLO_NUM_CLASSES;

/// Configuration for the YOLOv8 detector.
#[derive(Debug, Clone)]
pub struct YoloDetectorConfig {
    /// Path to ONNX model file
    pub model_path: String,
    /// Minimum score for a candidate to survive decoding
    pub confidence_threshold: f32,
    /// IoU threshold for NMS
    pub nms_threshold: f32,
    /// Input image size (model expects square input)
    pub input_size: u32,
}

impl Default for YoloDetectorConfig {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL_PATH.to_string(),
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

/// Decode a raw YOLOv8 output tensor into detections in original image pixels.
///
/// `outputs` is the flattened `[1, 84, N]` tensor. Each candidate keeps its
/// best-scoring class; candidates below the configured confidence are dropped
/// and the rest go through per-class NMS. Boxes are scaled back from the
/// square model input to `orig_width` x `orig_height` and are not clipped.
pub fn decode_yolov8_output(
    outputs: &[f32],
    orig_width: u32,
    orig_height: u32,
    config: &YoloDetectorConfig,
) -> MediaResult<Vec<Detection>> {
    if outputs.is_empty() || outputs.len() % YOLO_FEATURES != 0 {
        return Err(MediaError::detection_failed(format!(
            "Unexpected output size: {} is not a multiple of {}",
            outputs.len(),
            YOLO_FEATURES
        )));
    }
    let num_boxes = outputs.len() / YOLO_FEATURES;

    // Output is [84, N]; transpose to one row per candidate
    let output_array = ArrayView2::from_shape((YOLO_FEATURES, num_boxes), outputs)
        .map_err(|e| MediaError::detection_failed(format!("Failed to reshape output: {}", e)))?;
    let candidates_view = output_array.t();

    let input_size = config.input_size as f32;
    let scale_w = orig_width as f32 / input_size;
    let scale_h = orig_height as f32 / input_size;

    let mut candidates = Vec::new();
    for row in candidates_view.outer_iter() {
        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);

        let mut best_class = 0;
        let mut best_score = 0.0f32;
        for c in 0..YOLO_NUM_CLASSES {
            let score = row[4 + c];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }

        if best_score < config.confidence_threshold {
            continue;
        }

        let bbox = BoundingBox::new(
            (cx - w / 2.0) * scale_w,
            (cy - h / 2.0) * scale_h,
            (cx + w / 2.0) * scale_w,
            (cy + h / 2.0) * scale_h,
        );
        candidates.push(Detection::new(best_class, best_score, bbox));
    }

    Ok(non_maximum_suppression(candidates, config.nms_threshold))
}

/// Remove overlapping same-class detections, keeping the most confident.
pub fn non_maximum_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = keep.iter().any(|kept| {
            kept.class_id == candidate.class_id && kept.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}

/// Check if model is available at a custom path.
pub fn is_model_available_at(path: &str) -> bool {
    Path::new(path).exists()
}

#[cfg(feature = "onnx")]
pub use session::YoloDetector;

#[cfg(feature = "onnx")]
mod session {
    use std::path::Path;
    use std::sync::Mutex;

    use image::{DynamicImage, GenericImageView};
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::{Tensor, Value};
    use tracing::{debug, info};

    use dogset_models::Detection;

    use super::{decode_yolov8_output, YoloDetectorConfig};
    use crate::detection::SubjectDetector;
    use crate::error::{MediaError, MediaResult};

    /// Object detector using a YOLOv8 ONNX model.
    pub struct YoloDetector {
        session: Mutex<Session>,
        config: YoloDetectorConfig,
    }

    impl YoloDetector {
        /// Load the model named by `config`.
        ///
        /// Returns error if model file doesn't exist or cannot be loaded.
        pub fn new(config: YoloDetectorConfig) -> MediaResult<Self> {
            let model_path = Path::new(&config.model_path);
            if !model_path.exists() {
                return Err(MediaError::model_not_found(&config.model_path));
            }

            let session = Mutex::new(create_session(model_path)?);
            info!(
                model_path = %config.model_path,
                input_size = config.input_size,
                "YOLOv8 detector initialized"
            );

            Ok(Self { session, config })
        }

        pub fn config(&self) -> &YoloDetectorConfig {
            &self.config
        }

        /// Preprocess image for YOLOv8 inference.
        ///
        /// - Resize to model input size
        /// - Normalize pixel values to [0, 1]
        /// - Convert to NCHW format (batch, channels, height, width)
        fn preprocess(&self, img: &DynamicImage) -> MediaResult<Value> {
            let input_size = self.config.input_size;

            let resized = img.resize_exact(
                input_size,
                input_size,
                image::imageops::FilterType::Triangle,
            );

            let rgb = resized.to_rgb8();
            let (w, h) = (input_size as usize, input_size as usize);

            let mut chw_data: Vec<f32> = Vec::with_capacity(3 * h * w);
            for c in 0..3 {
                for y in 0..h {
                    for x in 0..w {
                        let pixel = rgb.get_pixel(x as u32, y as u32);
                        chw_data.push(pixel[c] as f32 / 255.0);
                    }
                }
            }

            let shape = vec![1usize, 3, h, w];
            Tensor::from_array((shape, chw_data.into_boxed_slice()))
                .map(Value::from)
                .map_err(|e| MediaError::detection_failed(format!("Failed to create tensor: {}", e)))
        }

        /// Run ONNX inference and return the flattened `output0` tensor.
        fn run_inference(&self, input: Value) -> MediaResult<Vec<f32>> {
            let mut session = self
                .session
                .lock()
                .map_err(|_| MediaError::internal("Session lock poisoned"))?;

            let outputs = session
                .run(ort::inputs![input])
                .map_err(|e| MediaError::detection_failed(format!("ONNX inference failed: {}", e)))?;

            let output = outputs
                .get("output0")
                .ok_or_else(|| MediaError::detection_failed("Missing output0 tensor"))?;

            let tensor = output
                .try_extract_tensor::<f32>()
                .map_err(|e| MediaError::detection_failed(format!("Failed to extract tensor: {}", e)))?;

            Ok(tensor.1.to_vec())
        }
    }

    impl SubjectDetector for YoloDetector {
        fn detect(&self, image: &DynamicImage) -> MediaResult<Vec<Detection>> {
            let (width, height) = image.dimensions();
            let input = self.preprocess(image)?;
            let outputs = self.run_inference(input)?;
            let detections = decode_yolov8_output(&outputs, width, height, &self.config)?;

            debug!(count = detections.len(), "Object detection completed");
            Ok(detections)
        }

        fn name(&self) -> &'static str {
            "yolov8"
        }
    }

    /// Create ONNX Runtime session with automatic execution provider selection.
    fn create_session(model_path: &Path) -> MediaResult<Session> {
        let model_bytes = std::fs::read(model_path)
            .map_err(|e| MediaError::detection_failed(format!("Failed to read model file: {}", e)))?;

        let builder = Session::builder()
            .map_err(|e| MediaError::detection_failed(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| MediaError::detection_failed(format!("Failed to set optimization level: {}", e)))?;

        #[cfg(all(target_os = "linux", feature = "cuda"))]
        {
            use ort::execution_providers::CUDAExecutionProvider;
            if let Ok(cuda_builder) = builder
                .clone()
                .with_execution_providers([CUDAExecutionProvider::default().build()])
            {
                if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                    info!("Using CUDA execution provider for subject detection");
                    return Ok(session);
                }
            }
            debug!("CUDA execution provider not available, trying alternatives");
        }

        #[cfg(target_os = "macos")]
        {
            use ort::execution_providers::CoreMLExecutionProvider;
            if let Ok(coreml_builder) = builder
                .clone()
                .with_execution_providers([CoreMLExecutionProvider::default().build()])
            {
                if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                    info!("Using CoreML execution provider for subject detection");
                    return Ok(session);
                }
            }
            debug!("CoreML execution provider not available, using CPU");
        }

        info!("Using CPU execution provider for subject detection");
        builder
            .commit_from_memory(&model_bytes)
            .map_err(|e| MediaError::detection_failed(format!("Failed to load ONNX model: {}", e)))
    }
}
