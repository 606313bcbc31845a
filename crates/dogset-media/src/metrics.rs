//! Curation counters recorded through the `metrics` facade.
//!
//! No recorder is installed by the library; a binary that wants the numbers
//! installs one, otherwise the calls are no-ops.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    // Extraction metrics
    pub const FRAMES_DECODED_TOTAL: &str = "dogset_frames_decoded_total";
    pub const FRAMES_EXTRACTED_TOTAL: &str = "dogset_frames_extracted_total";
    pub const EXTRACTION_DURATION_SECONDS: &str = "dogset_extraction_duration_seconds";
    pub const VIDEOS_FAILED_TOTAL: &str = "dogset_videos_failed_total";

    // Sorting metrics
    pub const IMAGES_EVALUATED_TOTAL: &str = "dogset_images_evaluated_total";
    pub const IMAGES_ROUTED_TOTAL: &str = "dogset_images_routed_total";
    pub const MOVES_FAILED_TOTAL: &str = "dogset_moves_failed_total";
    pub const FOLDERS_PRUNED_TOTAL: &str = "dogset_folders_pruned_total";

    // Cropping metrics
    pub const IMAGES_CROPPED_TOTAL: &str = "dogset_images_cropped_total";
    pub const CROP_FAILURES_TOTAL: &str = "dogset_crop_failures_total";

    // Normalization metrics
    pub const FOLDERS_RENAMED_TOTAL: &str = "dogset_folders_renamed_total";
    pub const FOLDERS_DELETED_TOTAL: &str = "dogset_folders_deleted_total";
}

/// Record one finished video extraction.
pub fn record_extraction(frames_decoded: u64, images_written: usize, duration_secs: f64) {
    counter!(names::FRAMES_DECODED_TOTAL).increment(frames_decoded);
    counter!(names::FRAMES_EXTRACTED_TOTAL).increment(images_written as u64);
    histogram!(names::EXTRACTION_DURATION_SECONDS).record(duration_secs);
}

/// Record a video that could not be extracted.
pub fn record_video_failed() {
    counter!(names::VIDEOS_FAILED_TOTAL).increment(1);
}

/// Record a validator verdict.
pub fn record_evaluation(status: &str) {
    let labels = [("status", status.to_string())];
    counter!(names::IMAGES_EVALUATED_TOTAL, &labels).increment(1);
}

/// Record an image moved into the invalid tree.
pub fn record_routed(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::IMAGES_ROUTED_TOTAL, &labels).increment(1);
}

/// Record a move that was refused or failed.
pub fn record_move_failed() {
    counter!(names::MOVES_FAILED_TOTAL).increment(1);
}

/// Record a folder emptied for falling below the minimum count.
pub fn record_folder_pruned() {
    counter!(names::FOLDERS_PRUNED_TOTAL).increment(1);
}

/// Record a successful crop.
pub fn record_cropped(in_place: bool) {
    let labels = [("mode", if in_place { "in_place" } else { "tree" }.to_string())];
    counter!(names::IMAGES_CROPPED_TOTAL, &labels).increment(1);
}

/// Record a crop that could not be produced.
pub fn record_crop_failed(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::CROP_FAILURES_TOTAL, &labels).increment(1);
}

/// Record normalizer folder operations.
pub fn record_normalized(renamed: usize, deleted: usize) {
    counter!(names::FOLDERS_RENAMED_TOTAL).increment(renamed as u64);
    counter!(names::FOLDERS_DELETED_TOTAL).increment(deleted as u64);
}
