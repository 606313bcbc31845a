use std::path::Path;

use dogset_curator::config::parse_var;
use dogset_curator::CurationConfig;
use dogset_media::{check_ffmpeg, check_ffprobe};

/// Variables that must parse when set.
const NUMERIC_VARS: &[&str] = &[
    "DOGSET_INTERVAL_SECS",
    "DOGSET_CONFIDENCE",
    "DOGSET_AREA_PERCENT",
    "DOGSET_SPLIT_RATIO",
    "DOGSET_NMS",
];
const COUNT_VARS: &[&str] = &[
    "DOGSET_TARGET_CLASS",
    "DOGSET_MIN_IMAGES",
    "DOGSET_SPLIT_MIN_IMAGES",
    "DOGSET_INPUT_SIZE",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = CurationConfig::from_env();

    println!(
        "dogset-selfcheck: starting with data_dir={} invalid_dir={}",
        config.data_dir.display(),
        config.invalid_root().display()
    );

    ensure_env_parses()?;
    config.validate()?;
    ensure_dir(&config.data_dir).await?;
    ensure_ffmpeg()?;
    report_model(&config.detector.model_path);

    println!("dogset-selfcheck: ok");
    Ok(())
}

fn ensure_env_parses() -> anyhow::Result<()> {
    for var in NUMERIC_VARS {
        parse_var::<f64>(var, std::env::var(var).ok().as_deref())?;
    }
    for var in COUNT_VARS {
        parse_var::<usize>(var, std::env::var(var).ok().as_deref())?;
    }
    Ok(())
}

async fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

fn ensure_ffmpeg() -> anyhow::Result<()> {
    let ffmpeg = check_ffmpeg()?;
    let ffprobe = check_ffprobe()?;
    println!(
        "dogset-selfcheck: ffmpeg={} ffprobe={}",
        ffmpeg.display(),
        ffprobe.display()
    );
    Ok(())
}

fn report_model(model_path: &str) {
    if dogset_media::detection::is_model_available_at(model_path) {
        println!("dogset-selfcheck: model found at {}", model_path);
    } else if cfg!(feature = "onnx") {
        println!("dogset-selfcheck: warning: model missing at {}", model_path);
    } else {
        println!("dogset-selfcheck: built without onnx, model not required");
    }
}
