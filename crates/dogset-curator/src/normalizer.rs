//! Dense renumbering of a curated dataset.
//!
//! After sorting, subject folders carry arbitrary names and sparse file
//! numbers. Normalizing deletes empty folders and renames the rest to
//! `{prefix}001`, `{prefix}002`, ... with files `{folder}_001.jpg`, ...
//!
//! Renames go through unique temporary names first, so a final name that is
//! currently held by a sibling never collides.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info};

use dogset_media::fs_utils::{list_files, list_subdirs, same_path};
use dogset_media::metrics;
use dogset_models::naming::{subject_file_name, subject_folder_name, DEFAULT_SUBJECT_PREFIX};

use crate::error::CuratorResult;

const STAGING_PREFIX: &str = ".dogset-normalize-";

/// A folder and the name it was given.
#[derive(Debug, Clone, Serialize)]
pub struct RenamedFolder {
    pub from: PathBuf,
    pub to: PathBuf,
    pub files: usize,
}

/// Outcome of a normalization pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizeReport {
    pub renamed: Vec<RenamedFolder>,
    pub deleted: Vec<PathBuf>,
    /// Folders holding only subdirectories, left as they are
    pub untouched: Vec<PathBuf>,
}

/// Renumbers subject folders and their files densely.
#[derive(Debug, Clone)]
pub struct DatasetNormalizer {
    prefix: String,
    exclude: Vec<PathBuf>,
}

impl Default for DatasetNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_SUBJECT_PREFIX)
    }
}

impl DatasetNormalizer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            exclude: Vec::new(),
        }
    }

    /// Skip `dir` (e.g. an invalid root living inside the data root).
    pub fn exclude(mut self, dir: impl Into<PathBuf>) -> Self {
        self.exclude.push(dir.into());
        self
    }

    fn is_excluded(&self, dir: &Path) -> bool {
        self.exclude.iter().any(|e| same_path(e, dir))
    }

    /// Delete empty folders under `data_root` and renumber the rest.
    pub async fn rename_folders_by_count(&self, data_root: &Path) -> CuratorResult<NormalizeReport> {
        let mut report = NormalizeReport::default();

        // Folders to renumber, in name order, with their files in name order
        let mut plan: Vec<(PathBuf, Vec<PathBuf>)> = Vec::new();

        for folder in list_subdirs(data_root).await? {
            if self.is_excluded(&folder) {
                debug!(folder = %folder.display(), "Excluded from normalization");
                continue;
            }

            let files = list_files(&folder).await?;
            if !files.is_empty() {
                plan.push((folder, files));
                continue;
            }

            if list_subdirs(&folder).await?.is_empty() {
                fs::remove_dir(&folder).await?;
                info!(folder = %folder.display(), "Deleted empty folder");
                report.deleted.push(folder);
            } else {
                info!(folder = %folder.display(), "Folder holds only subdirectories, leaving it");
                report.untouched.push(folder);
            }
        }

        // Phase 1: move every folder out of the way
        let mut staged = Vec::with_capacity(plan.len());
        for (index, (folder, files)) in plan.into_iter().enumerate() {
            let staging = data_root.join(format!("{}{}", STAGING_PREFIX, index + 1));
            fs::rename(&folder, &staging).await?;
            let files: Vec<PathBuf> = files
                .iter()
                .filter_map(|f| f.file_name().map(|name| staging.join(name)))
                .collect();
            staged.push((folder, staging, files));
        }

        // Phase 2: final folder names, then files through temporary names
        for (index, (original, staging, files)) in staged.into_iter().enumerate() {
            let folder_name = subject_folder_name(&self.prefix, index + 1);
            let target = data_root.join(&folder_name);
            fs::rename(&staging, &target).await?;

            let mut temporaries = Vec::with_capacity(files.len());
            for (file_index, file) in files.iter().enumerate() {
                let Some(name) = file.file_name() else {
                    continue;
                };
                let current = target.join(name);
                let temporary = target.join(format!("{}{}", STAGING_PREFIX, file_index + 1));
                fs::rename(&current, &temporary).await?;
                temporaries.push(temporary);
            }
            for (file_index, temporary) in temporaries.iter().enumerate() {
                let final_path = target.join(subject_file_name(&folder_name, file_index + 1));
                fs::rename(temporary, &final_path).await?;
            }

            info!(
                from = %original.display(),
                to = %target.display(),
                files = temporaries.len(),
                "Renamed folder"
            );
            report.renamed.push(RenamedFolder {
                from: original,
                to: target,
                files: temporaries.len(),
            });
        }

        metrics::record_normalized(report.renamed.len(), report.deleted.len());
        Ok(report)
    }
}

/// Normalize `data_root` with the default prefix and no exclusions.
pub async fn rename_folders_by_count(data_root: &Path) -> CuratorResult<NormalizeReport> {
    DatasetNormalizer::default()
        .rename_folders_by_count(data_root)
        .await
}
