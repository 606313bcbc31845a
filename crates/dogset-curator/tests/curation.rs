//! Integration tests for the curation steps over synthetic image trees.
//!
//! Images are grey canvases with solid red blocks; the marker detector
//! reports each red block as a dog.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use tempfile::TempDir;

use dogset_curator::{CurationConfig, CurationPipeline, DatasetSorter};
use dogset_media::{ColorMarker, MarkerDetector, SubjectCropper, SubjectDetector, SubjectValidator};
use dogset_models::{SubjectThresholds, DOG_CLASS_ID};

const RED: [u8; 3] = [255, 0, 0];
const BLUE: [u8; 3] = [0, 0, 255];

fn detector() -> MarkerDetector {
    MarkerDetector::new(vec![
        ColorMarker::new(RED, DOG_CLASS_ID, 0.9),
        ColorMarker::new(BLUE, DOG_CLASS_ID, 0.9),
    ])
}

/// 120x90 grey JPEG with square blocks `(x, y, size, colour)`.
fn write_image(path: &Path, blocks: &[(u32, u32, u32, [u8; 3])]) {
    let mut img = RgbImage::from_pixel(120, 90, Rgb([128, 128, 128]));
    for &(x0, y0, size, color) in blocks {
        for y in y0..(y0 + size).min(90) {
            for x in x0..(x0 + size).min(120) {
                img.put_pixel(x, y, Rgb(color));
            }
        }
    }
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    img.save(path).unwrap();
}

fn valid(path: &Path) {
    write_image(path, &[(20, 10, 70, RED)]);
}

fn too_small(path: &Path) {
    write_image(path, &[(5, 5, 15, RED)]);
}

fn two_dogs(path: &Path) {
    write_image(path, &[(0, 0, 50, RED), (60, 30, 50, BLUE)]);
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|d| {
            d.map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

fn config_for(data: &Path) -> CurationConfig {
    CurationConfig {
        video_dir: data.parent().unwrap().join("videos"),
        data_dir: data.to_path_buf(),
        invalid_dir: None,
        min_images: 3,
        ..CurationConfig::default()
    }
}

#[tokio::test]
async fn prune_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let invalid = data.join("invalid_data");

    for i in 1..=4 {
        valid(&data.join("rex").join(format!("rex_{i}.jpg")));
    }
    too_small(&data.join("rex").join("rex_9.jpg"));
    valid(&data.join("fido").join("fido_1.jpg"));
    two_dogs(&data.join("fido").join("fido_2.jpg"));

    let detector = detector();
    let sorter = DatasetSorter::new(SubjectValidator::new(&detector, SubjectThresholds::default()));

    let first = sorter.prune_dataset(&data, &invalid, 3).await.unwrap();
    assert_eq!(first.moved_count(), 3);
    assert_eq!(first.pruned_folders, vec![data.join("fido")]);
    assert_eq!(file_names(&invalid.join("rex")), vec!["rex_9.jpg"]);
    assert_eq!(file_names(&invalid.join("fido")), vec!["fido_1.jpg", "fido_2.jpg"]);

    let second = sorter.prune_dataset(&data, &invalid, 3).await.unwrap();
    assert_eq!(second.moved_count(), 0);
    assert!(second.skipped.is_empty());
    assert_eq!(file_names(&data.join("rex")).len(), 4);
}

#[tokio::test]
async fn every_image_stays_in_exactly_one_place() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let invalid = dir.path().join("rejects");

    valid(&data.join("rex").join("a.jpg"));
    too_small(&data.join("rex").join("b.jpg"));
    two_dogs(&data.join("rex").join("c.jpeg"));
    write_image(&data.join("rex").join("d.jpg"), &[]);

    let detector = detector();
    let sorter = DatasetSorter::new(SubjectValidator::new(&detector, SubjectThresholds::default()));
    sorter.partition_folder(&data.join("rex"), &invalid).await.unwrap();

    let kept = file_names(&data.join("rex"));
    let moved = file_names(&invalid.join("rex"));
    assert_eq!(kept, vec!["a.jpg"]);
    assert_eq!(moved, vec!["b.jpg", "c.jpeg", "d.jpg"]);
}

#[tokio::test]
async fn crop_in_place_matches_detected_box() {
    let dir = TempDir::new().unwrap();
    let folder = dir.path().join("rex");

    let fixtures = [
        ("rex_1.jpg", (20, 10, 70)),
        ("rex_16.jpg", (0, 0, 60)),
        ("rex_31.jpg", (70, 40, 80)), // runs off the right and bottom edges
    ];
    for (name, (x, y, size)) in fixtures {
        write_image(&folder.join(name), &[(x, y, size, RED)]);
    }

    let detector = detector();
    let thresholds = SubjectThresholds::default();

    let mut expected = Vec::new();
    for (name, _) in fixtures {
        let path = folder.join(name);
        let img = image::open(&path).unwrap();
        let (w, h) = img.dimensions();
        let detections = detector.detect(&img).unwrap();
        let subject = dogset_media::best_subject(&detections, &thresholds).unwrap();
        let (_, _, cw, ch) = subject.bbox.pixel_rect(w, h).unwrap();
        expected.push((path, (cw, ch), std::fs::read(folder.join(name)).unwrap()));
    }

    let report = SubjectCropper::new(&detector, thresholds)
        .process_single_directory(&folder)
        .await
        .unwrap();
    assert_eq!(report.cropped.len(), 3);
    assert!(report.failures.is_empty());

    for (path, dims, original_bytes) in expected {
        let cropped = image::open(&path).unwrap();
        assert_eq!(cropped.dimensions(), dims, "{}", path.display());
        assert_ne!(std::fs::read(&path).unwrap(), original_bytes);
    }
    assert_eq!(file_names(&folder).len(), 3, "no temporary files left behind");
}

#[tokio::test]
async fn dataset_pipeline_without_videos() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir_all(dir.path().join("videos")).unwrap();

    for i in 1..=3 {
        valid(&data.join("b_walk").join(format!("b_walk_{i}.jpg")));
    }
    too_small(&data.join("b_walk").join("b_walk_4.jpg"));
    for i in 1..=5 {
        valid(&data.join("a_park").join(format!("a_park_{i}.jpg")));
    }
    // Falls below the minimum and ends up empty
    valid(&data.join("c_yard").join("c_yard_1.jpg"));
    std::fs::create_dir_all(data.join("d_empty")).unwrap();

    let config = config_for(&data);
    let detector = detector();
    let pipeline = CurationPipeline::new(&config, &detector);
    let report = pipeline.process_dataset().await.unwrap();

    assert!(report.ingest.extracted.is_empty());
    assert_eq!(report.crop.cropped.len(), 8);
    assert_eq!(
        report.normalize.deleted,
        vec![data.join("c_yard"), data.join("d_empty")]
    );

    assert_eq!(file_names(&data), vec!["invalid_data", "subject001", "subject002"]);
    assert_eq!(file_names(&data.join("subject001")).len(), 5);
    assert_eq!(
        file_names(&data.join("subject002")),
        vec!["subject002_001.jpg", "subject002_002.jpg", "subject002_003.jpg"]
    );
    assert_eq!(file_names(&data.join("invalid_data").join("b_walk")), vec!["b_walk_4.jpg"]);
    assert_eq!(file_names(&data.join("invalid_data").join("c_yard")), vec!["c_yard_1.jpg"]);

    // Cropped to the 70x70 block, give or take JPEG edge noise
    let img = image::open(data.join("subject001").join("subject001_001.jpg")).unwrap();
    let (w, h) = img.dimensions();
    assert!((66..=74).contains(&w) && (66..=74).contains(&h), "{w}x{h}");
}

#[tokio::test]
async fn crop_into_output_tree_leaves_sources() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let output = dir.path().join("cropped");
    valid(&data.join("rex").join("rex_1.jpg"));
    write_image(&data.join("rex").join("rex_2.jpg"), &[]);

    let detector = detector();
    let report = SubjectCropper::new(&detector, SubjectThresholds::default())
        .process_directories(&data, &output)
        .await
        .unwrap();

    assert_eq!(report.cropped, vec![output.join("rex").join("rex_1.jpg")]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(file_names(&data.join("rex")).len(), 2);

    let src: DynamicImage = image::open(data.join("rex").join("rex_1.jpg")).unwrap();
    assert_eq!(src.dimensions(), (120, 90));
}

fn ffmpeg_available() -> bool {
    dogset_media::check_ffmpeg().is_ok() && dogset_media::check_ffprobe().is_ok()
}

/// Encode 300 frames at 30 fps: a large dog for the first 5 s, a small one after.
fn encode_test_video(dir: &Path) -> PathBuf {
    let frames = dir.join("frames");
    std::fs::create_dir_all(&frames).unwrap();
    for i in 0..300u32 {
        let mut img = RgbImage::from_pixel(160, 120, Rgb([128, 128, 128]));
        let (x0, y0, size) = if i < 150 { (30 + i % 20, 20, 80) } else { (10 + i % 20, 10, 20) };
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                img.put_pixel(x, y, Rgb(RED));
            }
        }
        img.save(frames.join(format!("frame_{i:04}.png"))).unwrap();
    }

    let video = dir.join("videos").join("walk.mp4");
    std::fs::create_dir_all(video.parent().unwrap()).unwrap();
    let status = std::process::Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-framerate", "30", "-i"])
        .arg(frames.join("frame_%04d.png"))
        .args(["-c:v", "mpeg4", "-q:v", "2", "-pix_fmt", "yuv420p"])
        .arg(&video)
        .status()
        .unwrap();
    assert!(status.success());
    video
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn single_video_pipeline_end_to_end() {
    if !ffmpeg_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let video = encode_test_video(dir.path());
    let data = dir.path().join("data");
    let invalid = dir.path().join("invalid");

    let config = config_for(&data);
    let detector = detector();
    let report = CurationPipeline::new(&config, &detector)
        .process_video(&video, &data, &invalid)
        .await
        .unwrap();

    assert_eq!(report.extraction.window_frames, 15);
    assert!(report.extraction.images.len() <= 21);
    assert!(report.extraction.images.len() >= 20);

    // Windows 0..10 show the large dog
    assert_eq!(report.partition.kept.len(), 10);
    assert_eq!(
        report.partition.routed.len(),
        report.extraction.images.len() - 10
    );
    for routed in &report.partition.routed {
        assert!(routed.to.starts_with(invalid.join("walk")));
    }

    assert_eq!(report.crop.cropped.len(), 10);
    assert!(file_names(&data.join("walk")).contains(&"walk_1.jpg".to_string()));
    assert!(file_names(&invalid.join("walk")).contains(&"walk_286.jpg".to_string()));
}
