//! Batch configuration.
//!
//! Every constant the render pipeline depends on lives here as a named
//! default, so a JSON config file can override any of them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ReelbatchError, ReelbatchResult};

/// Global batch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Folder under the batch root that holds one subdirectory per project.
    pub batch_dir_name: String,

    /// Project-local layout and input naming.
    pub layout: LayoutConfig,

    /// External tool names (resolved through `PATH`).
    pub tools: ToolConfig,

    /// Crossfade timing for the intro/main/outro composition.
    pub crossfade: CrossfadeConfig,

    /// Encoding defaults shared by every project.
    pub render: RenderDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Project directory layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Extensions (without dot, case-insensitive) accepted for the main video.
    pub video_extensions: Vec<String>,

    /// Intro still image file name.
    pub intro_file: String,

    /// Outro still image file name.
    pub outro_file: String,

    /// Intermediate artifacts directory.
    pub work_dir_name: String,

    /// Final output directory.
    pub final_dir_name: String,

    /// Loudness-normalized intermediate file name inside the work directory.
    pub normalized_file_name: String,

    /// Appended to the project name to form the final file stem.
    pub final_suffix: String,

    /// Container extension of the final file.
    pub output_extension: String,
}

/// Names of the external media tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
}

/// Crossfade timing, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossfadeConfig {
    /// How long the intro is on screen before the first crossfade starts.
    pub intro_visible_secs: f64,

    /// Duration of each crossfade.
    pub crossfade_secs: f64,

    /// How long the outro stays on screen after the second crossfade.
    pub outro_visible_secs: f64,
}

/// Encoding parameters independent of the selected codec policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Length of the looped still-image inputs.
    pub still_loop_secs: f64,

    /// Added to the main duration to form the composite progress hint.
    pub progress_padding_secs: f64,

    /// Frame rate used when the probed rate has a zero denominator.
    pub default_fps: f64,

    /// EBU R128 loudness normalization target.
    pub loudness: LoudnessTarget,

    /// Audio encoder name.
    pub audio_codec: String,

    /// Audio bitrate, e.g. `192k`.
    pub audio_bitrate: String,
}

/// Loudness normalization target (`loudnorm` filter parameters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoudnessTarget {
    /// Integrated loudness (LUFS).
    pub integrated: f64,

    /// Maximum true peak (dBTP).
    pub true_peak: f64,

    /// Loudness range (LU).
    pub loudness_range: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelbatch=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_dir_name: "VID".to_string(),
            layout: LayoutConfig::default(),
            tools: ToolConfig::default(),
            crossfade: CrossfadeConfig::default(),
            render: RenderDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            video_extensions: vec!["mp4".to_string()],
            intro_file: "intro.png".to_string(),
            outro_file: "outro.png".to_string(),
            work_dir_name: "02_Work".to_string(),
            final_dir_name: "03_Final".to_string(),
            normalized_file_name: "normalized.mp4".to_string(),
            final_suffix: "_final".to_string(),
            output_extension: "mp4".to_string(),
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl Default for CrossfadeConfig {
    fn default() -> Self {
        Self {
            intro_visible_secs: 4.0,
            crossfade_secs: 1.0,
            outro_visible_secs: 4.0,
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            still_loop_secs: 5.0,
            progress_padding_secs: 8.0,
            default_fps: 25.0,
            loudness: LoudnessTarget::default(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

impl Default for LoudnessTarget {
    fn default() -> Self {
        Self {
            integrated: -16.0,
            true_peak: -1.5,
            loudness_range: 11.0,
        }
    }
}

impl LoudnessTarget {
    /// Render as a `loudnorm` audio filter expression.
    pub fn filter(&self) -> String {
        format!(
            "loudnorm=I={}:TP={}:LRA={}",
            self.integrated, self.true_peak, self.loudness_range
        )
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl BatchConfig {
    /// Load config from an explicit path, or from the standard location.
    ///
    /// An explicit path must exist and parse. The standard location is
    /// optional and falls back to defaults when missing or malformed.
    pub fn load(explicit: Option<&Path>) -> ReelbatchResult<Self> {
        if let Some(path) = explicit {
            let content = std::fs::read_to_string(path).map_err(|e| {
                ReelbatchError::config(format!("Failed to read {}: {e}", path.display()))
            })?;
            return serde_json::from_str(&content).map_err(|e| {
                ReelbatchError::config(format!("Failed to parse {}: {e}", path.display()))
            });
        }

        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Ok(Self::default())
    }

    /// Directory holding the project subdirectories for a given batch root.
    pub fn batch_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.batch_dir_name)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("reelbatch").join("config.json")
}
