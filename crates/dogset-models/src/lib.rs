//! Shared data models for the dogset curation pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Detector output (bounding boxes, detections, COCO labels)
//! - Subject verdicts and thresholds
//! - Dataset naming conventions
//! - Run identifiers for structured logging

pub mod detection;
pub mod naming;
pub mod run;
pub mod status;

// Re-export common types
pub use detection::{class_name, BoundingBox, Detection, COCO_CLASSES, DOG_CLASS_ID};
pub use run::RunId;
pub use status::{RoutingReason, SubjectStatus, SubjectThresholds};
