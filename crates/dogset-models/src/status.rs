//! Subject verdicts and the thresholds that produce them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::detection::DOG_CLASS_ID;

/// Default minimum detector confidence (exclusive).
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
/// Default minimum subject area, as a percentage of the frame (exclusive).
pub const DEFAULT_AREA_PERCENT: f64 = 20.0;

/// Thresholds used to judge a single image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubjectThresholds {
    /// Detector class that counts as the subject
    pub target_class: usize,
    /// Detections must score strictly above this
    pub confidence: f32,
    /// Subject must cover strictly more than this percentage of the frame
    pub area_percent: f64,
}

impl Default for SubjectThresholds {
    fn default() -> Self {
        Self {
            target_class: DOG_CLASS_ID,
            confidence: DEFAULT_CONFIDENCE_THRESHOLD,
            area_percent: DEFAULT_AREA_PERCENT,
        }
    }
}

/// Verdict over one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubjectStatus {
    /// Exactly one subject, large enough
    Valid { area_percent: f64 },
    /// No qualifying detection
    NoSubject,
    /// More than one qualifying detection; area is ambiguous
    TooManySubjects { count: usize },
    /// Exactly one subject, too small
    Invalid { area_percent: f64 },
}

impl SubjectStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, SubjectStatus::Valid { .. })
    }

    /// Subject area as a percentage, when a single subject was found.
    pub fn area_percent(&self) -> Option<f64> {
        match self {
            SubjectStatus::Valid { area_percent } | SubjectStatus::Invalid { area_percent } => {
                Some(*area_percent)
            }
            SubjectStatus::NoSubject | SubjectStatus::TooManySubjects { .. } => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectStatus::Valid { .. } => "valid",
            SubjectStatus::NoSubject => "no_subject",
            SubjectStatus::TooManySubjects { .. } => "too_many_subjects",
            SubjectStatus::Invalid { .. } => "invalid",
        }
    }
}

impl fmt::Display for SubjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectStatus::Valid { area_percent } | SubjectStatus::Invalid { area_percent } => {
                write!(f, "{} ({:.2}%)", self.as_str(), area_percent)
            }
            SubjectStatus::TooManySubjects { count } => {
                write!(f, "{} ({})", self.as_str(), count)
            }
            SubjectStatus::NoSubject => f.write_str(self.as_str()),
        }
    }
}

/// Why an image was moved to the invalid tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingReason {
    NoSubject,
    TooManySubjects,
    SubjectTooSmall,
    /// Image could not be read or decoded
    Unreadable,
    /// Folder held fewer images than the minimum
    BelowMinimumCount,
}

impl RoutingReason {
    /// Reason for a non-valid status, `None` for a valid one.
    pub fn from_status(status: &SubjectStatus) -> Option<Self> {
        match status {
            SubjectStatus::Valid { .. } => None,
            SubjectStatus::NoSubject => Some(RoutingReason::NoSubject),
            SubjectStatus::TooManySubjects { .. } => Some(RoutingReason::TooManySubjects),
            SubjectStatus::Invalid { .. } => Some(RoutingReason::SubjectTooSmall),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingReason::NoSubject => "no_subject",
            RoutingReason::TooManySubjects => "too_many_subjects",
            RoutingReason::SubjectTooSmall => "subject_too_small",
            RoutingReason::Unreadable => "unreadable",
            RoutingReason::BelowMinimumCount => "below_minimum_count",
        }
    }
}

impl fmt::Display for RoutingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
