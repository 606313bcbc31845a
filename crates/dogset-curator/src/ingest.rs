//! Batch frame extraction over a directory of videos.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use dogset_media::fs_utils::{list_files, move_file};
use dogset_media::{metrics, ExtractionSummary, FrameExtractor};
use dogset_models::naming::{is_video_file, subject_folder_name, subject_video_name};

use crate::error::{require_dir, CuratorResult};

/// A video that produced no stills.
#[derive(Debug, Clone, Serialize)]
pub struct FailedVideo {
    pub video: PathBuf,
    pub error: String,
}

/// Outcome of a batch extraction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub extracted: Vec<ExtractionSummary>,
    pub failed: Vec<FailedVideo>,
    /// Original and new names of videos renamed before extraction
    pub renamed: Vec<(PathBuf, PathBuf)>,
}

impl IngestReport {
    pub fn image_count(&self) -> usize {
        self.extracted.iter().map(|s| s.images.len()).sum()
    }

    async fn extract(&mut self, extractor: &FrameExtractor, video: &Path, output_dir: &Path) {
        match extractor.extract_frames(video, output_dir).await {
            Ok(summary) => self.extracted.push(summary),
            Err(e) => {
                warn!(video = %video.display(), error = %e, "Skipping video");
                metrics::record_video_failed();
                self.failed.push(FailedVideo {
                    video: video.to_path_buf(),
                    error: e.to_string(),
                });
            }
        }
    }
}

/// `.mp4` files directly inside `dir`, in name order.
pub async fn list_videos(dir: &Path) -> CuratorResult<Vec<PathBuf>> {
    Ok(list_files(dir)
        .await?
        .into_iter()
        .filter(|p| is_video_file(p))
        .collect())
}

/// Extract stills from every `.mp4` in `input_dir` into `output_dir/<stem>/`.
///
/// A video that fails is reported and skipped.
pub async fn extract_dataset_from_videos(
    input_dir: &Path,
    output_dir: &Path,
    interval_secs: f64,
) -> CuratorResult<IngestReport> {
    require_dir(input_dir)?;
    tokio::fs::create_dir_all(output_dir).await?;

    let extractor = FrameExtractor::new(interval_secs);
    let mut report = IngestReport::default();

    for video in list_videos(input_dir).await? {
        report.extract(&extractor, &video, output_dir).await;
    }

    info!(
        input_dir = %input_dir.display(),
        videos = report.extracted.len(),
        failed = report.failed.len(),
        images = report.image_count(),
        "Extracted dataset from videos"
    );
    Ok(report)
}

/// Rename each `.mp4` in `input_dir` to the next free subject name, then
/// extract it.
///
/// Numbering starts one past the number of entries already in `output_dir`
/// and every rename attempt uses up its number, so a video that fails to
/// extract never blocks the next one. Numbers whose folder or video already
/// exists are passed over.
pub async fn ingest_new_videos(
    input_dir: &Path,
    output_dir: &Path,
    interval_secs: f64,
    prefix: &str,
) -> CuratorResult<IngestReport> {
    require_dir(input_dir)?;
    tokio::fs::create_dir_all(output_dir).await?;

    let extractor = FrameExtractor::new(interval_secs);
    let mut report = IngestReport::default();
    let mut next = count_entries(output_dir).await? + 1;

    for video in list_videos(input_dir).await? {
        let renamed = loop {
            let candidate = input_dir.join(subject_video_name(prefix, next));
            let folder = output_dir.join(subject_folder_name(prefix, next));
            next += 1;
            if candidate == video || !(candidate.exists() || folder.exists()) {
                break candidate;
            }
        };

        if renamed != video {
            if let Err(e) = move_file(&video, &renamed).await {
                warn!(video = %video.display(), to = %renamed.display(), error = %e, "Could not rename video");
                report.failed.push(FailedVideo {
                    video,
                    error: e.to_string(),
                });
                continue;
            }
            info!(from = %video.display(), to = %renamed.display(), "Renamed video");
            report.renamed.push((video, renamed.clone()));
        }

        report.extract(&extractor, &renamed, output_dir).await;
    }

    Ok(report)
}

async fn count_entries(dir: &Path) -> CuratorResult<usize> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut count = 0;
    while entries.next_entry().await?.is_some() {
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_videos_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["b.mp4", "a.mp4", "c.MP4", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let videos = list_videos(dir.path()).await.unwrap();
        assert_eq!(videos, vec![dir.path().join("a.mp4"), dir.path().join("b.mp4")]);
    }

    #[tokio::test]
    async fn test_missing_input_dir() {
        let dir = TempDir::new().unwrap();
        let result = extract_dataset_from_videos(&dir.path().join("nope"), dir.path(), 0.5).await;
        assert!(matches!(result, Err(crate::CuratorError::DirectoryNotFound(_))));
    }

    #[tokio::test]
    async fn test_broken_videos_are_skipped() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("videos");
        let output = dir.path().join("frames");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("broken.mp4"), b"not a video").unwrap();

        let report = extract_dataset_from_videos(&input, &output, 0.5).await.unwrap();
        assert!(report.extracted.is_empty());
        assert_eq!(report.failed.len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_renames_before_extracting() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("videos");
        let output = dir.path().join("frames");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(output.join("subject001")).unwrap();
        std::fs::write(input.join("zz_walk.mp4"), b"not a video").unwrap();

        let report = ingest_new_videos(&input, &output, 0.5, "subject").await.unwrap();

        assert_eq!(
            report.renamed,
            vec![(input.join("zz_walk.mp4"), input.join("subject002.mp4"))]
        );
        assert!(input.join("subject002.mp4").exists());
        // Extraction itself fails on the fake file
        assert_eq!(report.failed.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_extraction_does_not_block_next_video() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("videos");
        let output = dir.path().join("frames");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("a.mp4"), b"broken").unwrap();
        std::fs::write(input.join("b.mp4"), b"also broken").unwrap();

        let report = ingest_new_videos(&input, &output, 0.5, "subject").await.unwrap();

        assert_eq!(
            report.renamed,
            vec![
                (input.join("a.mp4"), input.join("subject001.mp4")),
                (input.join("b.mp4"), input.join("subject002.mp4")),
            ]
        );
        // Both fail to extract, neither fails to rename
        assert_eq!(report.failed.len(), 2);
        assert!(report
            .failed
            .iter()
            .all(|f| f.video.file_name().unwrap().to_string_lossy().starts_with("subject")));
    }

    #[tokio::test]
    async fn test_ingest_skips_taken_names() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("videos");
        let output = dir.path().join("frames");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(&output).unwrap();
        // Left over from an earlier run whose extraction failed
        std::fs::write(input.join("subject001.mp4"), b"broken").unwrap();
        std::fs::write(input.join("walk.mp4"), b"broken").unwrap();

        let report = ingest_new_videos(&input, &output, 0.5, "subject").await.unwrap();

        // subject001.mp4 keeps its name; walk.mp4 takes the next free one
        assert_eq!(
            report.renamed,
            vec![(input.join("walk.mp4"), input.join("subject002.mp4"))]
        );
        assert!(input.join("subject001.mp4").exists());
    }
}
