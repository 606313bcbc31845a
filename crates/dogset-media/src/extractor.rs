//! Representative still extraction from video.
//!
//! A video is cut into consecutive windows of `interval * fps` frames. Every
//! frame of a window is scored with [`laplacian_variance`] and the sharpest
//! one is written as `{stem}_{window_start + 1}.jpg` under `output_dir/{stem}/`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use image::{ImageOutputFormat, RgbImage};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use dogset_models::naming::frame_file_name;

use crate::command::{check_ffmpeg, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::focus::laplacian_variance;
use crate::metrics;
use crate::probe::{probe_video, VideoInfo};

/// JPEG quality used for extracted stills.
pub const FRAME_JPEG_QUALITY: u8 = 95;

/// The frame chosen to represent one window.
#[derive(Debug, Clone)]
pub struct SelectedFrame {
    /// Index of the first frame of the window
    pub window_start: u64,
    /// Index of the chosen frame
    pub frame_index: u64,
    /// Focus score of the chosen frame
    pub focus_score: f64,
    pub image: RgbImage,
}

/// Picks the sharpest frame of each fixed-size window.
///
/// Frames are pushed in decode order. A completed window yields its best
/// frame; ties keep the earliest frame.
#[derive(Debug)]
pub struct WindowSelector {
    window_len: u64,
    next_index: u64,
    best: Option<SelectedFrame>,
}

impl WindowSelector {
    pub fn new(window_len: u64) -> Self {
        Self {
            window_len: window_len.max(1),
            next_index: 0,
            best: None,
        }
    }

    pub fn window_len(&self) -> u64 {
        self.window_len
    }

    /// Frames seen so far.
    pub fn frames_seen(&self) -> u64 {
        self.next_index
    }

    /// Add the next decoded frame; returns the winner when a window closes.
    pub fn push(&mut self, image: RgbImage) -> Option<SelectedFrame> {
        let index = self.next_index;
        self.next_index += 1;

        let score = laplacian_variance(&image);
        let window_start = index - index % self.window_len;

        let replace = match &self.best {
            None => true,
            Some(best) => score > best.focus_score,
        };
        if replace {
            self.best = Some(SelectedFrame {
                window_start,
                frame_index: index,
                focus_score: score,
                image,
            });
        }

        if (index + 1) % self.window_len == 0 {
            self.best.take()
        } else {
            None
        }
    }

    /// Close the trailing, possibly shorter, window.
    pub fn finish(&mut self) -> Option<SelectedFrame> {
        self.best.take()
    }
}

/// Result of extracting one video.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionSummary {
    pub video: PathBuf,
    /// Directory holding the extracted stills
    pub output_dir: PathBuf,
    pub frames_decoded: u64,
    pub window_frames: u64,
    pub images: Vec<PathBuf>,
}

/// Extracts one sharp still per time interval from videos.
#[derive(Debug, Clone)]
pub struct FrameExtractor {
    interval_secs: f64,
    jpeg_quality: u8,
}

impl FrameExtractor {
    /// Create an extractor producing one still per `interval_secs`.
    pub fn new(interval_secs: f64) -> Self {
        Self {
            interval_secs,
            jpeg_quality: FRAME_JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn interval_secs(&self) -> f64 {
        self.interval_secs
    }

    /// Extract stills from `video_path` into `output_dir/{stem}/`.
    pub async fn extract_frames(
        &self,
        video_path: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> MediaResult<ExtractionSummary> {
        let video_path = video_path.as_ref();
        let started = Instant::now();
        let info = probe_video(video_path).await?;
        let stem = video_stem(video_path)?;

        let target_dir = output_dir.as_ref().join(&stem);
        tokio::fs::create_dir_all(&target_dir).await?;

        let window_frames = info.window_frames(self.interval_secs);
        info!(
            video = %video_path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            window_frames,
            "Extracting frames"
        );

        let mut stream = FrameStream::spawn(video_path, &info)?;
        let mut selector = WindowSelector::new(window_frames);
        let mut images = Vec::new();

        while let Some(frame) = stream.next_frame().await? {
            if let Some(selected) = selector.push(frame) {
                images.push(self.write_selected(&target_dir, &stem, &selected)?);
            }
        }
        if let Some(selected) = selector.finish() {
            images.push(self.write_selected(&target_dir, &stem, &selected)?);
        }

        let frames_decoded = selector.frames_seen();
        stream.finish(frames_decoded).await?;
        metrics::record_extraction(frames_decoded, images.len(), started.elapsed().as_secs_f64());

        info!(
            video = %video_path.display(),
            frames = frames_decoded,
            images = images.len(),
            "Frame extraction complete"
        );

        Ok(ExtractionSummary {
            video: video_path.to_path_buf(),
            output_dir: target_dir,
            frames_decoded,
            window_frames,
            images,
        })
    }

    /// Run the window selection over already decoded frames.
    ///
    /// Used when frames come from somewhere other than FFmpeg.
    pub fn extract_from_frames<I>(
        &self,
        stem: &str,
        fps: f64,
        frames: I,
        output_dir: impl AsRef<Path>,
    ) -> MediaResult<ExtractionSummary>
    where
        I: IntoIterator<Item = RgbImage>,
    {
        let target_dir = output_dir.as_ref().join(stem);
        std::fs::create_dir_all(&target_dir)?;

        let window_frames = crate::probe::window_frames(fps, self.interval_secs);
        let mut selector = WindowSelector::new(window_frames);
        let mut images = Vec::new();

        for frame in frames {
            if let Some(selected) = selector.push(frame) {
                images.push(self.write_selected(&target_dir, stem, &selected)?);
            }
        }
        if let Some(selected) = selector.finish() {
            images.push(self.write_selected(&target_dir, stem, &selected)?);
        }

        Ok(ExtractionSummary {
            video: PathBuf::from(stem),
            output_dir: target_dir,
            frames_decoded: selector.frames_seen(),
            window_frames,
            images,
        })
    }

    fn write_selected(
        &self,
        target_dir: &Path,
        stem: &str,
        selected: &SelectedFrame,
    ) -> MediaResult<PathBuf> {
        let path = target_dir.join(frame_file_name(stem, selected.window_start));
        let mut file = std::io::BufWriter::new(std::fs::File::create(&path)?);
        image::DynamicImage::ImageRgb8(selected.image.clone())
            .write_to(&mut file, ImageOutputFormat::Jpeg(self.jpeg_quality))
            .map_err(|e| MediaError::image_encode(&path, e))?;
        file.flush()?;

        debug!(
            path = %path.display(),
            frame = selected.frame_index,
            focus = selected.focus_score,
            "Saved window still"
        );
        Ok(path)
    }
}

/// File stem of a video, used as its output folder and image prefix.
pub fn video_stem(video_path: &Path) -> MediaResult<String> {
    video_path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| MediaError::InvalidVideo(format!("No file name: {}", video_path.display())))
}

/// Raw RGB24 frames decoded by an FFmpeg child process.
pub struct FrameStream {
    child: Child,
    stdout: ChildStdout,
    stderr_task: Option<JoinHandle<String>>,
    reader: FrameReader,
}

impl FrameStream {
    /// Start decoding `video_path`.
    pub fn spawn(video_path: &Path, info: &VideoInfo) -> MediaResult<Self> {
        check_ffmpeg()?;

        let cmd = FfmpegCommand::raw_rgb_frames(video_path);
        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stdout not captured"))?;

        // Drain stderr so FFmpeg never blocks on a full pipe
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text).await;
                text
            })
        });

        Ok(Self {
            child,
            stdout,
            stderr_task,
            reader: FrameReader::new(info.width, info.height),
        })
    }

    /// Next decoded frame, or `None` at end of stream.
    pub async fn next_frame(&mut self) -> MediaResult<Option<RgbImage>> {
        self.reader.read_frame(&mut self.stdout).await
    }

    /// Wait for FFmpeg to exit.
    ///
    /// A failure after some frames were decoded is a truncated stream and only
    /// logged; a failure before any frame is an error.
    pub async fn finish(mut self, frames_decoded: u64) -> MediaResult<()> {
        let status = self.child.wait().await?;
        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            return Ok(());
        }

        if frames_decoded > 0 {
            warn!(
                exit_code = ?status.code(),
                frames = frames_decoded,
                stderr = %stderr.trim(),
                "FFmpeg stopped early, keeping decoded frames"
            );
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg could not decode the video",
                Some(stderr),
                status.code(),
            ))
        }
    }
}

/// Splits a byte stream into fixed-size RGB24 frames.
#[derive(Debug)]
pub struct FrameReader {
    width: u32,
    height: u32,
    buf: Vec<u8>,
}

impl FrameReader {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            buf: vec![0u8; width as usize * height as usize * 3],
        }
    }

    /// Read one frame; a trailing partial frame counts as end of stream.
    pub async fn read_frame<R>(&mut self, reader: &mut R) -> MediaResult<Option<RgbImage>>
    where
        R: AsyncRead + Unpin,
    {
        if self.buf.is_empty() {
            return Ok(None);
        }

        let mut filled = 0;
        while filled < self.buf.len() {
            let n = reader.read(&mut self.buf[filled..]).await?;
            if n == 0 {
                if filled > 0 {
                    debug!(bytes = filled, "Discarding partial trailing frame");
                }
                return Ok(None);
            }
            filled += n;
        }

        let frame = RgbImage::from_raw(self.width, self.height, self.buf.clone())
            .ok_or_else(|| MediaError::internal("Frame buffer size mismatch"))?;
        Ok(Some(frame))
    }
}
