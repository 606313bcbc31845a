//! FFmpeg command builder.

use std::path::{Path, PathBuf};

use crate::error::{MediaError, MediaResult};

/// Output target meaning "write to stdout".
pub const STDOUT_PIPE: &str = "pipe:1";

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path (or `pipe:1`)
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Command that decodes `input` to raw RGB24 frames on stdout.
    ///
    /// Auto-rotation is disabled so frame dimensions match what ffprobe reports.
    pub fn raw_rgb_frames(input: impl AsRef<Path>) -> Self {
        Self::new(input, STDOUT_PIPE)
            .input_arg("-noautorotate")
            .output_args(["-an", "-f", "rawvideo", "-pix_fmt", "rgb24"])
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.push("-nostdin".to_string());

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_frames_command() {
        let cmd = FfmpegCommand::raw_rgb_frames("clips/rex.mp4");
        let args = cmd.build_args();

        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        let noautorotate_pos = args.iter().position(|a| a == "-noautorotate").unwrap();
        assert!(noautorotate_pos < input_pos);
        assert_eq!(args[input_pos + 1], "clips/rex.mp4");

        assert!(args.windows(2).any(|w| w[0] == "-pix_fmt" && w[1] == "rgb24"));
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "rawvideo"));
        assert_eq!(args.last().map(String::as_str), Some(STDOUT_PIPE));
        assert_eq!(&args[..3], ["-y", "-v", "error"]);
    }
}
