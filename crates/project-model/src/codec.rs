//! Video codec policies.
//!
//! A policy is chosen once per batch run and applied identically to every
//! project. Each variant maps to exactly one [`EncoderProfile`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of video encoder configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CodecPolicy {
    /// Hardware HEVC (NVENC) at the highest-quality preset.
    #[default]
    #[serde(rename = "h265_nvenc", alias = "hevc_nvenc")]
    HevcNvenc,

    /// Software HEVC (libx265) with a constant rate factor. Archival, CPU-bound.
    #[serde(rename = "h265")]
    X265,

    /// Hardware H.264 (NVENC). Compatibility fallback.
    #[serde(rename = "h264")]
    H264Nvenc,
}

/// Concrete encoder settings for one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderProfile {
    /// Encoder name passed to `-c:v`.
    pub encoder: &'static str,

    /// Extra encoder flags, in order.
    pub options: &'static [(&'static str, &'static str)],

    /// Output pixel format.
    pub pix_fmt: &'static str,
}

const HEVC_NVENC: EncoderProfile = EncoderProfile {
    encoder: "hevc_nvenc",
    options: &[("-preset", "p7"), ("-tune", "hq")],
    pix_fmt: "yuv420p",
};

const X265: EncoderProfile = EncoderProfile {
    encoder: "libx265",
    options: &[("-x265-params", "crf=28")],
    pix_fmt: "yuv420p",
};

const H264_NVENC: EncoderProfile = EncoderProfile {
    encoder: "h264_nvenc",
    options: &[],
    pix_fmt: "yuv420p",
};

impl CodecPolicy {
    pub const ALL: [CodecPolicy; 3] = [Self::HevcNvenc, Self::X265, Self::H264Nvenc];

    /// Name accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::HevcNvenc => "h265_nvenc",
            Self::X265 => "h265",
            Self::H264Nvenc => "h264",
        }
    }

    pub fn profile(self) -> &'static EncoderProfile {
        match self {
            Self::HevcNvenc => &HEVC_NVENC,
            Self::X265 => &X265,
            Self::H264Nvenc => &H264_NVENC,
        }
    }

    /// Whether encoding runs on GPU silicon.
    pub fn is_hardware(self) -> bool {
        matches!(self, Self::HevcNvenc | Self::H264Nvenc)
    }

    /// Video codec argument fragment for the encoding engine.
    pub fn video_args(self) -> Vec<String> {
        let profile = self.profile();
        let mut args = vec!["-c:v".to_string(), profile.encoder.to_string()];
        for (flag, value) in profile.options {
            args.push(flag.to_string());
            args.push(value.to_string());
        }
        args.push("-pix_fmt".to_string());
        args.push(profile.pix_fmt.to_string());
        args
    }
}

impl fmt::Display for CodecPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown codec policy name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCodecPolicy(pub String);

impl fmt::Display for UnknownCodecPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = CodecPolicy::ALL.iter().map(|p| p.name()).collect();
        write!(
            f,
            "unknown codec policy '{}' (expected one of: {})",
            self.0,
            names.join(", ")
        )
    }
}

impl std::error::Error for UnknownCodecPolicy {}

impl FromStr for CodecPolicy {
    type Err = UnknownCodecPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if wanted == "hevc_nvenc" {
            return Ok(Self::HevcNvenc);
        }
        Self::ALL
            .into_iter()
            .find(|policy| policy.name() == wanted)
            .ok_or_else(|| UnknownCodecPolicy(s.to_string()))
    }
}
