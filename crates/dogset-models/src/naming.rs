//! File and folder naming conventions for the curated dataset.

use std::path::Path;

/// Extensions accepted as dataset images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg"];
/// Extensions accepted when splitting a dataset into train/test.
pub const SPLIT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
/// Video container accepted as input.
pub const VIDEO_EXTENSION: &str = "mp4";
/// Default prefix for subject folders (`subject001`, ...).
pub const DEFAULT_SUBJECT_PREFIX: &str = "subject";
/// Default invalid tree folder name when it lives next to the data.
pub const DEFAULT_INVALID_DIR_NAME: &str = "invalid_data";
/// Extension written for every extracted or renamed image.
pub const OUTPUT_IMAGE_EXTENSION: &str = "jpg";

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| allowed.iter().any(|a| a.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Whether a path looks like a dataset image (`.jpg` / `.jpeg`, any case).
pub fn is_image_file(path: &Path) -> bool {
    has_extension(path, IMAGE_EXTENSIONS)
}

/// Whether a path is an image for train/test splitting.
pub fn is_split_image_file(path: &Path) -> bool {
    has_extension(path, SPLIT_IMAGE_EXTENSIONS)
}

/// Whether a path is an `.mp4` video.
///
/// Matches case-sensitively, as the ingest step only picks up lowercase `.mp4`.
pub fn is_video_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(VIDEO_EXTENSION)
}

/// Name of the still picked for a window: `{stem}_{window_start + 1}.jpg`.
pub fn frame_file_name(video_stem: &str, window_start: u64) -> String {
    format!("{}_{}.{}", video_stem, window_start + 1, OUTPUT_IMAGE_EXTENSION)
}

/// Subject folder name: `{prefix}{index:03}`.
pub fn subject_folder_name(prefix: &str, index: usize) -> String {
    format!("{}{:03}", prefix, index)
}

/// Image name inside a subject folder: `{folder}_{index:03}.jpg`.
pub fn subject_file_name(folder_name: &str, index: usize) -> String {
    format!("{}_{:03}.{}", folder_name, index, OUTPUT_IMAGE_EXTENSION)
}

/// Video name used when ingesting a new dataset: `{prefix}{index:03}.mp4`.
pub fn subject_video_name(prefix: &str, index: usize) -> String {
    format!("{}.{}", subject_folder_name(prefix, index), VIDEO_EXTENSION)
}
