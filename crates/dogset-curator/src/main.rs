//! Dataset curation binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;

use dogset_curator::{
    build_detector, extract_dataset_from_videos, ingest_new_videos, init_tracing, split_dataset,
    CurationConfig, CurationPipeline, DatasetNormalizer,
};
use dogset_media::FrameExtractor;

/// Curate per-subject dog image folders extracted from video.
///
/// Directories and thresholds come from DOGSET_* environment variables
/// (.env is read).
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract stills from VIDEO, or from every video in DOGSET_VIDEO_DIR
    Extract { video: Option<PathBuf> },
    /// Rename each video in DOGSET_VIDEO_DIR to the next subject name and extract it
    Ingest,
    /// Partition FOLDER, or partition and prune every folder in DOGSET_DATA_DIR
    Sort { folder: Option<PathBuf> },
    /// Crop every folder in place, or into the OUTPUT tree
    Crop { output: Option<PathBuf> },
    /// Delete empty folders and renumber the rest
    Normalize,
    /// Copy DOGSET_DATA_DIR into DOGSET_OUTPUT_DIR/{train,test}
    Split {
        /// Seed for a reproducible shuffle
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Extract, sort and crop a single video
    Video { video: PathBuf },
    /// Ingest, prune, crop and normalize the whole dataset
    Pipeline,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    let config = CurationConfig::from_env();
    config.validate()?;
    info!(command = ?cli.command, "Starting dogset");

    match cli.command {
        Command::Extract { video: Some(video) } => {
            let summary = FrameExtractor::new(config.interval_secs)
                .extract_frames(&video, &config.data_dir)
                .await?;
            print_report(&summary)
        }
        Command::Extract { video: None } => {
            let report =
                extract_dataset_from_videos(&config.video_dir, &config.data_dir, config.interval_secs)
                    .await?;
            print_report(&report)
        }
        Command::Ingest => {
            let report = ingest_new_videos(
                &config.video_dir,
                &config.data_dir,
                config.interval_secs,
                &config.subject_prefix,
            )
            .await?;
            print_report(&report)
        }
        Command::Sort { folder } => {
            let detector = build_detector(&config)?;
            let sorter = CurationPipeline::new(&config, detector.as_ref()).sorter();
            let invalid_root = config.invalid_root();
            match folder {
                Some(folder) => {
                    let report = sorter.partition_folder(&folder, &invalid_root).await?;
                    print_report(&report)
                }
                None => {
                    let report = sorter
                        .prune_dataset(&config.data_dir, &invalid_root, config.min_images)
                        .await?;
                    print_report(&report)
                }
            }
        }
        Command::Crop { output } => {
            let detector = build_detector(&config)?;
            let pipeline = CurationPipeline::new(&config, detector.as_ref());
            let report = match output {
                Some(output) => {
                    pipeline
                        .cropper()
                        .process_directories(&config.data_dir, &output)
                        .await?
                }
                None => {
                    pipeline
                        .crop_all_in_place(&config.data_dir, &config.invalid_root())
                        .await?
                }
            };
            print_report(&report)
        }
        Command::Normalize => {
            let report = DatasetNormalizer::new(config.subject_prefix.clone())
                .exclude(config.invalid_root())
                .rename_folders_by_count(&config.data_dir)
                .await?;
            print_report(&report)
        }
        Command::Split { seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let report = split_dataset(
                &config.data_dir,
                &config.output_dir,
                config.split_ratio,
                config.split_min_images,
                &mut rng,
            )
            .await?;
            print_report(&report)
        }
        Command::Video { video } => {
            let detector = build_detector(&config)?;
            let report = CurationPipeline::new(&config, detector.as_ref())
                .process_video(&video, &config.data_dir, &config.invalid_root())
                .await?;
            print_report(&report)
        }
        Command::Pipeline => {
            let detector = build_detector(&config)?;
            let report = CurationPipeline::new(&config, detector.as_ref())
                .process_dataset()
                .await?;
            print_report(&report)
        }
    }
}

fn print_report<T: Serialize>(report: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
