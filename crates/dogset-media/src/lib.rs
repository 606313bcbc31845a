#![deny(unreachable_patterns)]
//! Media processing for dataset curation.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and FFprobe probing
//! - Sharpest-frame extraction per time window
//! - Pluggable subject detection (YOLOv8 ONNX, deterministic test detectors)
//! - Subject validation and cropping
//! - Atomic filesystem moves for routing images

pub mod command;
pub mod cropper;
pub mod detection;
pub mod error;
pub mod extractor;
pub mod focus;
pub mod fs_utils;
pub mod metrics;
pub mod probe;
pub mod validator;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand};
pub use cropper::{best_subject, CropFailure, CropReport, SubjectCropper};
#[cfg(feature = "onnx")]
pub use detection::YoloDetector;
pub use detection::{ColorMarker, FixedDetector, MarkerDetector, SubjectDetector, YoloDetectorConfig};
pub use error::{MediaError, MediaResult};
pub use extractor::{video_stem, ExtractionSummary, FrameExtractor, WindowSelector};
pub use focus::laplacian_variance;
pub use fs_utils::move_file;
pub use probe::{probe_video, VideoInfo};
pub use validator::{classify, evaluate, load_image, SubjectValidator};
