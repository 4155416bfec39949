//! Media probing through `ffprobe`.
//!
//! Each call runs the inspection tool synchronously and parses its plain
//! `default=noprint_wrappers=1:nokey=1` output. Results are never cached.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use reelbatch_common::error::{ReelbatchError, ReelbatchResult};

/// Video stream geometry and rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// Combined result of a duration and a stream probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaProbeResult {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl MediaProbeResult {
    pub fn stream(&self) -> StreamInfo {
        StreamInfo {
            width: self.width,
            height: self.height,
            fps: self.fps,
        }
    }
}

/// Read-only media inspection.
pub trait MediaProbe {
    /// Container duration in seconds.
    fn probe_duration(&self, path: &Path) -> ReelbatchResult<f64>;

    /// Width, height, and frame rate of the first video stream.
    fn probe_stream_info(&self, path: &Path) -> ReelbatchResult<StreamInfo>;

    /// Duration and stream info together.
    fn probe(&self, path: &Path) -> ReelbatchResult<MediaProbeResult> {
        let duration_secs = self.probe_duration(path)?;
        let info = self.probe_stream_info(path)?;
        Ok(MediaProbeResult {
            duration_secs,
            width: info.width,
            height: info.height,
            fps: info.fps,
        })
    }
}

/// [`MediaProbe`] backed by the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    program: PathBuf,
    default_fps: f64,
}

impl FfprobeProber {
    pub fn new(program: impl Into<PathBuf>, default_fps: f64) -> Self {
        Self {
            program: program.into(),
            default_fps,
        }
    }

    fn run(&self, path: &Path, args: &[&str]) -> ReelbatchResult<String> {
        tracing::debug!(program = %self.program.display(), path = %path.display(), ?args, "Probing");
        let output = Command::new(&self.program)
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                ReelbatchError::probe(
                    path,
                    format!("Failed to run {}: {e}", self.program.display()),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReelbatchError::probe(
                path,
                format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    stderr.trim()
                ),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new("ffprobe", 25.0)
    }
}

impl MediaProbe for FfprobeProber {
    fn probe_duration(&self, path: &Path) -> ReelbatchResult<f64> {
        let stdout = self.run(
            path,
            &[
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ],
        )?;
        parse_duration_output(&stdout).map_err(|msg| ReelbatchError::probe(path, msg))
    }

    fn probe_stream_info(&self, path: &Path) -> ReelbatchResult<StreamInfo> {
        let stdout = self.run(
            path,
            &[
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,r_frame_rate",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ],
        )?;
        parse_stream_info_output(&stdout, self.default_fps)
            .map_err(|msg| ReelbatchError::probe(path, msg))
    }
}

/// Parse the single-line duration output.
pub fn parse_duration_output(stdout: &str) -> Result<f64, String> {
    let trimmed = stdout.trim();
    let secs = trimmed
        .parse::<f64>()
        .map_err(|_| format!("Unparseable duration: {trimmed:?}"))?;
    if !secs.is_finite() {
        return Err(format!("Non-finite duration: {trimmed:?}"));
    }
    Ok(secs)
}

/// Parse the three-line `width`, `height`, `num/den` stream output.
pub fn parse_stream_info_output(stdout: &str, default_fps: f64) -> Result<StreamInfo, String> {
    let lines: Vec<&str> = stdout.trim().lines().map(str::trim).collect();
    let [width, height, rate] = lines.as_slice() else {
        return Err(format!(
            "Expected 3 lines (width, height, frame rate), got {}",
            lines.len()
        ));
    };

    let width = width
        .parse::<u32>()
        .map_err(|_| format!("Invalid width: {width:?}"))?;
    let height = height
        .parse::<u32>()
        .map_err(|_| format!("Invalid height: {height:?}"))?;
    let fps = parse_frame_rate(rate, default_fps)?;

    Ok(StreamInfo { width, height, fps })
}

/// Parse a rational `num/den` frame rate.
///
/// A zero denominator yields `default_fps` instead of a division failure.
pub fn parse_frame_rate(rate: &str, default_fps: f64) -> Result<f64, String> {
    let (num, den) = rate
        .trim()
        .split_once('/')
        .ok_or_else(|| format!("Invalid frame rate: {rate:?}"))?;
    let num = num
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("Invalid frame rate numerator: {rate:?}"))?;
    let den = den
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("Invalid frame rate denominator: {rate:?}"))?;

    if den == 0 {
        tracing::debug!(rate, default_fps, "Zero frame rate denominator, using default");
        return Ok(default_fps);
    }
    Ok(num as f64 / den as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration_output("20.000000\n").unwrap(), 20.0);
        assert!(parse_duration_output("N/A\n").is_err());
        assert!(parse_duration_output("").is_err());
    }

    #[test]
    fn test_parse_stream_info() {
        let info = parse_stream_info_output("1920\n1080\n30/1\n", 25.0).unwrap();
        assert_eq!(
            info,
            StreamInfo {
                width: 1920,
                height: 1080,
                fps: 30.0
            }
        );
    }

    #[test]
    fn test_parse_stream_info_ntsc_rate() {
        let info = parse_stream_info_output("1280\n720\n30000/1001", 25.0).unwrap();
        assert!((info.fps - 29.970_029_97).abs() < 1e-6);
    }

    #[test]
    fn test_parse_stream_info_rejects_missing_lines() {
        let err = parse_stream_info_output("1920\n1080\n", 25.0).unwrap_err();
        assert!(err.contains("got 2"));
        assert!(parse_stream_info_output("", 25.0).is_err());
    }

    #[test]
    fn test_parse_stream_info_rejects_extra_lines() {
        assert!(parse_stream_info_output("1920\n1080\n30/1\n30/1\n", 25.0).is_err());
    }

    #[test]
    fn test_parse_stream_info_rejects_non_integer_dimensions() {
        assert!(parse_stream_info_output("1920.5\n1080\n30/1", 25.0).is_err());
        assert!(parse_stream_info_output("1920\nabc\n30/1", 25.0).is_err());
    }

    #[test]
    fn test_frame_rate_zero_denominator_uses_default() {
        assert_eq!(parse_frame_rate("0/0", 25.0).unwrap(), 25.0);
        assert_eq!(parse_frame_rate("30/0", 25.0).unwrap(), 25.0);
    }

    #[test]
    fn test_frame_rate_without_slash_is_error() {
        assert!(parse_frame_rate("30", 25.0).is_err());
    }

    #[test]
    fn test_missing_binary_is_probe_error() {
        let prober = FfprobeProber::new("/nonexistent/reelbatch-ffprobe", 25.0);
        let err = prober.probe_duration(Path::new("clip.mp4")).unwrap_err();
        assert!(matches!(err, ReelbatchError::Probe { .. }));
    }

    /// Install an executable stand-in for `ffprobe` running `body`.
    #[cfg(unix)]
    fn fake_ffprobe(dir: &Path, body: &str) -> FfprobeProber {
        use std::os::unix::fs::PermissionsExt;

        let program = dir.join("ffprobe");
        std::fs::write(&program, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
        FfprobeProber::new(program, 25.0)
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_probe_error_with_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let prober = fake_ffprobe(dir.path(), "echo 'clip.mp4: No such file or directory' >&2; exit 1");

        let err = prober.probe_duration(Path::new("clip.mp4")).unwrap_err();
        match err {
            ReelbatchError::Probe { path, message } => {
                assert_eq!(path, PathBuf::from("clip.mp4"));
                assert!(message.contains("No such file or directory"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_malformed_duration_output_is_probe_error() {
        let dir = tempfile::tempdir().unwrap();
        let prober = fake_ffprobe(dir.path(), "echo N/A");

        let err = prober.probe_duration(Path::new("clip.mp4")).unwrap_err();
        assert!(err.to_string().contains("Unparseable duration"));
    }

    #[cfg(unix)]
    #[test]
    fn test_short_stream_output_is_probe_error() {
        let dir = tempfile::tempdir().unwrap();
        let prober = fake_ffprobe(dir.path(), "printf '1920\\n1080\\n'");

        let err = prober.probe_stream_info(Path::new("clip.mp4")).unwrap_err();
        assert!(matches!(err, ReelbatchError::Probe { .. }));
        assert!(err.to_string().contains("got 2"));
    }

    #[cfg(unix)]
    #[test]
    fn test_stream_probe_receives_path_last() {
        let dir = tempfile::tempdir().unwrap();
        // Fails unless the probed file is the final argument.
        let prober = fake_ffprobe(
            dir.path(),
            "for last; do :; done; [ \"$last\" = clip.mp4 ] || exit 9; printf '1280\\n720\\n0/0\\n'",
        );

        let info = prober.probe_stream_info(Path::new("clip.mp4")).unwrap();
        assert_eq!(
            info,
            StreamInfo {
                width: 1280,
                height: 720,
                fps: 25.0
            }
        );
    }

    proptest! {
        #[test]
        fn prop_zero_denominator_never_divides(num in any::<i64>()) {
            let fps = parse_frame_rate(&format!("{num}/0"), 25.0).unwrap();
            prop_assert_eq!(fps, 25.0);
        }

        #[test]
        fn prop_nonzero_denominator_divides(num in 0i64..1_000_000, den in 1i64..10_000) {
            let fps = parse_frame_rate(&format!("{num}/{den}"), 25.0).unwrap();
            prop_assert!((fps - num as f64 / den as f64).abs() < 1e-12);
        }
    }
}
