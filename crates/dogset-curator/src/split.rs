//! Train/test split of a curated dataset.
//!
//! Each class folder is shuffled and copied: the first `floor(ratio * n)`
//! images go to `train/<class>/`, the rest to `test/<class>/`. The source tree
//! is left intact.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use dogset_media::fs_utils::{list_files, list_subdirs, same_path};
use dogset_models::naming::is_split_image_file;

use crate::error::{require_dir, CuratorError, CuratorResult};

pub const TRAIN_DIR: &str = "train";
pub const TEST_DIR: &str = "test";

/// How one class was split.
#[derive(Debug, Clone, Serialize)]
pub struct ClassSplit {
    pub class: String,
    pub train: usize,
    pub test: usize,
}

/// A class left out of the split.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedClass {
    pub class: String,
    pub images: usize,
}

/// Outcome of a split.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SplitReport {
    pub classes: Vec<ClassSplit>,
    pub skipped: Vec<SkippedClass>,
}

/// Number of images that go to the training set.
pub fn train_count(images: usize, ratio: f64) -> usize {
    ((images as f64) * ratio).floor().clamp(0.0, images as f64) as usize
}

/// Split every class folder of `input_root` into `output_root/{train,test}`.
///
/// Classes with fewer than `min_images` images are skipped and reported.
pub async fn split_dataset<R>(
    input_root: &Path,
    output_root: &Path,
    ratio: f64,
    min_images: usize,
    rng: &mut R,
) -> CuratorResult<SplitReport>
where
    R: Rng + ?Sized,
{
    if !(0.0..=1.0).contains(&ratio) {
        return Err(CuratorError::InvalidSplitRatio(ratio));
    }
    require_dir(input_root)?;

    let train_root = output_root.join(TRAIN_DIR);
    let test_root = output_root.join(TEST_DIR);
    tokio::fs::create_dir_all(&train_root).await?;
    tokio::fs::create_dir_all(&test_root).await?;

    let mut report = SplitReport::default();

    for class_dir in list_subdirs(input_root).await? {
        if same_path(&class_dir, output_root) {
            continue;
        }
        let Some(class) = class_dir.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };

        let mut images: Vec<PathBuf> = list_files(&class_dir)
            .await?
            .into_iter()
            .filter(|p| is_split_image_file(p))
            .collect();

        if images.len() < min_images {
            info!(class = %class, images = images.len(), "Skipping class - not enough images");
            report.skipped.push(SkippedClass {
                class,
                images: images.len(),
            });
            continue;
        }

        images.shuffle(rng);
        let split_at = train_count(images.len(), ratio);
        let (train, test) = images.split_at(split_at);

        copy_into(train, &train_root.join(&class)).await?;
        copy_into(test, &test_root.join(&class)).await?;

        info!(class = %class, train = train.len(), test = test.len(), "Split class");
        report.classes.push(ClassSplit {
            class,
            train: train.len(),
            test: test.len(),
        });
    }

    Ok(report)
}

async fn copy_into(files: &[PathBuf], dir: &Path) -> CuratorResult<()> {
    tokio::fs::create_dir_all(dir).await?;
    for file in files {
        if let Some(name) = file.file_name() {
            tokio::fs::copy(file, dir.join(name)).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn populate(root: &Path, class: &str, count: usize) {
        let dir = root.join(class);
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..count {
            std::fs::write(dir.join(format!("{class}_{i:03}.jpg")), b"img").unwrap();
        }
        std::fs::write(dir.join("labels.csv"), b"x").unwrap();
    }

    fn count(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn test_train_count() {
        assert_eq!(train_count(10, 0.8), 8);
        assert_eq!(train_count(7, 0.8), 5);
        assert_eq!(train_count(5, 0.0), 0);
        assert_eq!(train_count(5, 1.0), 5);
    }

    #[tokio::test]
    async fn test_split_copies_and_skips_small_classes() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("data");
        let output = dir.path().join("dataset");
        populate(&input, "subject001", 10);
        populate(&input, "subject002", 3);

        let mut rng = StdRng::seed_from_u64(7);
        let report = split_dataset(&input, &output, 0.8, 5, &mut rng).await.unwrap();

        assert_eq!(report.classes.len(), 1);
        assert_eq!(report.classes[0].train, 8);
        assert_eq!(report.classes[0].test, 2);
        assert_eq!(report.skipped[0].class, "subject002");

        assert_eq!(count(&output.join("train").join("subject001")), 8);
        assert_eq!(count(&output.join("test").join("subject001")), 2);
        assert!(!output.join("train").join("subject002").exists());

        // Source untouched
        assert_eq!(count(&input.join("subject001")), 11);
    }

    #[tokio::test]
    async fn test_split_is_reproducible_with_seed() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("data");
        populate(&input, "rex", 12);

        let mut listings = Vec::new();
        for run in 0..2 {
            let output = dir.path().join(format!("out{run}"));
            let mut rng = StdRng::seed_from_u64(42);
            split_dataset(&input, &output, 0.5, 5, &mut rng).await.unwrap();

            let mut names: Vec<_> = std::fs::read_dir(output.join("test").join("rex"))
                .unwrap()
                .map(|e| e.unwrap().file_name())
                .collect();
            names.sort();
            listings.push(names);
        }
        assert_eq!(listings[0], listings[1]);
    }

    #[tokio::test]
    async fn test_split_rejects_bad_ratio() {
        let dir = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let result = split_dataset(dir.path(), dir.path(), 1.2, 5, &mut rng).await;
        assert!(matches!(result, Err(CuratorError::InvalidSplitRatio(_))));
    }
}
