//! Filesystem utilities for routing and rewriting dataset images.
//!
//! Every relocation is a single `rename`, so an image is always in exactly one
//! place: either still at its source or already at its destination.

use std::io::Write;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageOutputFormat};
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// JPEG quality used when an image is rewritten.
pub const REWRITE_JPEG_QUALITY: u8 = 95;

/// Move a file from `src` to `dst` with an atomic rename.
///
/// Parent directories of `dst` are created. An existing `dst` is never
/// overwritten. Moving across filesystems is refused rather than emulated
/// with copy and delete.
///
/// # Errors
///
/// Returns an error if:
/// - The source file doesn't exist
/// - The destination already exists
/// - Source and destination are on different filesystems
/// - The rename itself fails
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if fs::symlink_metadata(src).await.is_err() {
        return Err(MediaError::FileNotFound(src.to_path_buf()));
    }
    if fs::symlink_metadata(dst).await.is_ok() {
        return Err(MediaError::DestinationExists(dst.to_path_buf()));
    }

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => {
            tracing::debug!("Moved {} -> {}", src.display(), dst.display());
            Ok(())
        }
        Err(e) if is_cross_device_error(&e) => Err(MediaError::CrossDevice {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        }),
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is error code 18 on Linux/macOS
    e.raw_os_error() == Some(18)
}

/// Replace the image at `path` with `image`, encoded as JPEG.
///
/// The new content is written to a temporary file in the same directory and
/// renamed over `path`, so a failure leaves the old image intact. No backup of
/// the old content is kept.
pub fn replace_image(path: &Path, image: &DynamicImage) -> MediaResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::Builder::new()
        .prefix(".dogset-")
        .suffix(".jpg.tmp")
        .tempfile_in(dir)?;

    write_jpeg(tmp.as_file_mut(), path, image)?;

    tmp.persist(path).map_err(|e| MediaError::from(e.error))?;
    Ok(())
}

/// Write `image` as a new JPEG file at `path`, creating parent directories.
pub fn save_image(path: &Path, image: &DynamicImage) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    write_jpeg(&mut file, path, image)
}

fn write_jpeg(file: &mut std::fs::File, path: &Path, image: &DynamicImage) -> MediaResult<()> {
    let mut writer = std::io::BufWriter::new(file);
    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_to(&mut writer, ImageOutputFormat::Jpeg(REWRITE_JPEG_QUALITY))
        .map_err(|e| MediaError::image_encode(path, e))?;
    writer.flush()?;
    Ok(())
}

/// Regular files directly inside `dir`, sorted by name.
pub async fn list_files(dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Immediate subdirectories of `dir`, sorted by name.
pub async fn list_subdirs(dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut dirs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Whether two paths name the same location, resolving symlinks when possible.
pub fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_file_same_filesystem() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.jpg");
        let dst = dir.path().join("dest.jpg");

        fs::write(&src, b"test content").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists(), "Source file should be removed");
        assert!(dst.exists(), "Destination file should exist");
        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "test content");
    }

    #[tokio::test]
    async fn test_move_file_to_subdirectory() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.jpg");
        let dst = dir.path().join("invalid").join("rex").join("source.jpg");

        fs::write(&src, b"test content").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert!(dst.exists());
    }

    #[tokio::test]
    async fn test_move_file_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.jpg");
        let dst = dir.path().join("dest.jpg");

        fs::write(&src, b"new content").await.unwrap();
        fs::write(&dst, b"old content").await.unwrap();

        let result = move_file(&src, &dst).await;
        assert!(matches!(result, Err(MediaError::DestinationExists(_))));
        assert!(src.exists(), "Source must stay in place");
        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "old content");
    }

    #[tokio::test]
    async fn test_move_missing_source() {
        let dir = TempDir::new().unwrap();
        let result = move_file(dir.path().join("nope.jpg"), dir.path().join("x.jpg")).await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }

    #[test]
    fn test_is_cross_device_error() {
        let exdev_error = std::io::Error::from_raw_os_error(18);
        assert!(is_cross_device_error(&exdev_error));

        let not_found = std::io::Error::from_raw_os_error(2);
        assert!(!is_cross_device_error(&not_found));
    }

    #[test]
    fn test_replace_image_overwrites_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rex_1.jpg");
        save_image(&path, &DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([9, 9, 9]))))
            .unwrap();

        let smaller = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 5, Rgb([200, 0, 0])));
        replace_image(&path, &smaller).unwrap();

        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (10, 5));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1, "no temporary file should remain");
    }

    #[tokio::test]
    async fn test_listing_is_sorted_and_split() {
        let dir = TempDir::new().unwrap();
        for name in ["c.jpg", "a.jpg", "b.txt"] {
            fs::write(dir.path().join(name), b"x").await.unwrap();
        }
        fs::create_dir(dir.path().join("zeta")).await.unwrap();
        fs::create_dir(dir.path().join("alpha")).await.unwrap();

        let files = list_files(dir.path()).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.txt", "c.jpg"]);

        let dirs = list_subdirs(dir.path()).await.unwrap();
        assert_eq!(dirs, vec![dir.path().join("alpha"), dir.path().join("zeta")]);
    }
}
