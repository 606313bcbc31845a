//! Curation configuration.

use std::path::PathBuf;
use std::str::FromStr;

use dogset_media::YoloDetectorConfig;
use dogset_models::naming::{DEFAULT_INVALID_DIR_NAME, DEFAULT_SUBJECT_PREFIX};
use dogset_models::SubjectThresholds;

use crate::error::{CuratorError, CuratorResult};

/// Default seconds of video per extracted still.
pub const DEFAULT_INTERVAL_SECS: f64 = 0.5;
/// Default minimum images a subject folder needs to survive pruning.
pub const DEFAULT_MIN_IMAGES: usize = 10;
/// Default share of each class copied into `train/`.
pub const DEFAULT_SPLIT_RATIO: f64 = 0.8;
/// Default minimum images for a class to be split.
pub const DEFAULT_SPLIT_MIN_IMAGES: usize = 5;

/// Curation configuration.
#[derive(Debug, Clone)]
pub struct CurationConfig {
    /// Directory holding source `.mp4` videos
    pub video_dir: PathBuf,
    /// Root of the per-subject image tree
    pub data_dir: PathBuf,
    /// Root of the invalid tree; `None` means `data_dir/invalid_data`
    pub invalid_dir: Option<PathBuf>,
    /// Destination of the train/test split
    pub output_dir: PathBuf,
    /// Seconds of video per extracted still
    pub interval_secs: f64,
    /// Subject validation thresholds
    pub thresholds: SubjectThresholds,
    /// Minimum images per subject folder after sorting
    pub min_images: usize,
    /// Prefix for normalized folder and ingested video names
    pub subject_prefix: String,
    /// Share of each class copied into `train/`
    pub split_ratio: f64,
    /// Classes with fewer images are not split
    pub split_min_images: usize,
    /// YOLOv8 detector settings
    pub detector: YoloDetectorConfig,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            video_dir: PathBuf::from("videos"),
            data_dir: PathBuf::from("data"),
            invalid_dir: None,
            output_dir: PathBuf::from("dataset"),
            interval_secs: DEFAULT_INTERVAL_SECS,
            thresholds: SubjectThresholds::default(),
            min_images: DEFAULT_MIN_IMAGES,
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
            split_ratio: DEFAULT_SPLIT_RATIO,
            split_min_images: DEFAULT_SPLIT_MIN_IMAGES,
            detector: YoloDetectorConfig::default(),
        }
    }
}

impl CurationConfig {
    /// Create config from environment variables.
    ///
    /// Unset or unparsable variables fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        fn parse_var<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            lookup(key).and_then(|s| s.trim().parse().ok())
        }
        let path = |key: &str| lookup(key).filter(|s| !s.trim().is_empty()).map(PathBuf::from);

        let detector_defaults = YoloDetectorConfig::default();

        Self {
            video_dir: path("DOGSET_VIDEO_DIR").unwrap_or(defaults.video_dir),
            data_dir: path("DOGSET_DATA_DIR").unwrap_or(defaults.data_dir),
            invalid_dir: path("DOGSET_INVALID_DIR"),
            output_dir: path("DOGSET_OUTPUT_DIR").unwrap_or(defaults.output_dir),
            interval_secs: parse_var(&lookup, "DOGSET_INTERVAL_SECS").unwrap_or(defaults.interval_secs),
            thresholds: SubjectThresholds {
                target_class: parse_var(&lookup, "DOGSET_TARGET_CLASS")
                    .unwrap_or(defaults.thresholds.target_class),
                confidence: parse_var(&lookup, "DOGSET_CONFIDENCE").unwrap_or(defaults.thresholds.confidence),
                area_percent: parse_var(&lookup, "DOGSET_AREA_PERCENT")
                    .unwrap_or(defaults.thresholds.area_percent),
            },
            min_images: parse_var(&lookup, "DOGSET_MIN_IMAGES").unwrap_or(defaults.min_images),
            subject_prefix: lookup("DOGSET_SUBJECT_PREFIX")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.subject_prefix),
            split_ratio: parse_var(&lookup, "DOGSET_SPLIT_RATIO").unwrap_or(defaults.split_ratio),
            split_min_images: parse_var(&lookup, "DOGSET_SPLIT_MIN_IMAGES")
                .unwrap_or(defaults.split_min_images),
            detector: YoloDetectorConfig {
                model_path: lookup("DOGSET_MODEL_PATH")
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(detector_defaults.model_path),
                input_size: parse_var(&lookup, "DOGSET_INPUT_SIZE").unwrap_or(detector_defaults.input_size),
                nms_threshold: parse_var(&lookup, "DOGSET_NMS").unwrap_or(detector_defaults.nms_threshold),
                ..detector_defaults
            },
        }
    }

    /// Root of the invalid tree.
    pub fn invalid_root(&self) -> PathBuf {
        self.invalid_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_INVALID_DIR_NAME))
    }

    /// Reject values no step can work with.
    pub fn validate(&self) -> CuratorResult<()> {
        if !(self.interval_secs.is_finite() && self.interval_secs > 0.0) {
            return Err(CuratorError::config_error(format!(
                "DOGSET_INTERVAL_SECS must be positive, got {}",
                self.interval_secs
            )));
        }
        if !(0.0..=1.0).contains(&self.thresholds.confidence) {
            return Err(CuratorError::config_error(format!(
                "DOGSET_CONFIDENCE must be within [0, 1], got {}",
                self.thresholds.confidence
            )));
        }
        if !(0.0..=100.0).contains(&self.thresholds.area_percent) {
            return Err(CuratorError::config_error(format!(
                "DOGSET_AREA_PERCENT must be within [0, 100], got {}",
                self.thresholds.area_percent
            )));
        }
        if !(0.0..=1.0).contains(&self.split_ratio) {
            return Err(CuratorError::InvalidSplitRatio(self.split_ratio));
        }
        if self.detector.input_size == 0 {
            return Err(CuratorError::config_error("DOGSET_INPUT_SIZE must be non-zero"));
        }
        Ok(())
    }
}

/// Parse a variable, distinguishing "unset" from "set but malformed".
pub fn parse_var<T: FromStr>(key: &str, value: Option<&str>) -> CuratorResult<Option<T>> {
    match value {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CuratorError::config_error(format!("{} has invalid value {:?}", key, raw))),
    }
}
