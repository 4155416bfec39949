//! Crossfade composition graph.
//!
//! Input order is fixed: `0` intro still, `1` main clip, `2` outro still.
//! The graph exposes two labelled outputs, [`VIDEO_OUTPUT_LABEL`] and
//! [`AUDIO_OUTPUT_LABEL`], which the caller must `-map` explicitly.

use reelbatch_common::config::CrossfadeConfig;

use crate::probe::StreamInfo;

pub const INTRO_INPUT: usize = 0;
pub const MAIN_INPUT: usize = 1;
pub const OUTRO_INPUT: usize = 2;

pub const VIDEO_OUTPUT_LABEL: &str = "outv";
pub const AUDIO_OUTPUT_LABEL: &str = "aout";

/// Timing derived from the main clip duration.
///
/// Offsets are positions on the merged video timeline. After the first
/// crossfade the merged stream starts with the intro, so the main clip
/// begins at `intro_to_main_offset` and ends `main_duration` later; the
/// second crossfade must start `crossfade_secs` before that end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossfadeTiming {
    /// Start of the intro→main blend.
    pub intro_to_main_offset: f64,

    /// Start of the main→outro blend.
    pub main_to_outro_offset: f64,

    /// Start of the main audio fade-out, on the main clip's own timeline.
    pub audio_fade_start: f64,

    /// Audio delay aligning main audio with the main video segment.
    pub audio_delay_ms: u64,

    /// Nominal length of the composite output.
    pub composite_duration: f64,
}

impl CrossfadeTiming {
    pub fn compute(main_duration: f64, config: &CrossfadeConfig) -> Self {
        let intro_to_main_offset = config.intro_visible_secs;
        let main_to_outro_offset = intro_to_main_offset + main_duration - config.crossfade_secs;
        let audio_fade_start = (main_duration - config.crossfade_secs).max(0.0);
        let audio_delay_ms = (config.intro_visible_secs * 1000.0).max(0.0) as u64;
        let composite_duration =
            main_to_outro_offset + config.crossfade_secs + config.outro_visible_secs;

        Self {
            intro_to_main_offset,
            main_to_outro_offset,
            audio_fade_start,
            audio_delay_ms,
            composite_duration,
        }
    }

    /// True when the second blend starts at or before the first one.
    ///
    /// Happens when the main clip is no longer than one crossfade. The
    /// graph is still emitted unchanged; the engine decides what to do.
    pub fn overlaps(&self) -> bool {
        self.main_to_outro_offset <= self.intro_to_main_offset
    }
}

/// Build the `-filter_complex` description for intro → main → outro.
pub fn build_crossfade_graph(
    main_duration: f64,
    stream: &StreamInfo,
    config: &CrossfadeConfig,
) -> String {
    let timing = CrossfadeTiming::compute(main_duration, config);
    if timing.overlaps() {
        tracing::warn!(
            main_duration,
            crossfade_secs = config.crossfade_secs,
            offset1 = timing.intro_to_main_offset,
            offset2 = timing.main_to_outro_offset,
            "Main clip is not longer than the crossfade; transitions overlap"
        );
    }

    let crossfade = config.crossfade_secs;
    let delay = timing.audio_delay_ms;

    let segments = [
        normalize_chain(MAIN_INPUT, "vmain", stream),
        normalize_chain(INTRO_INPUT, "vintro", stream),
        normalize_chain(OUTRO_INPUT, "voutro", stream),
        format!(
            "[vintro][vmain]xfade=transition=fade:duration={crossfade}:offset={offset}[im]",
            offset = timing.intro_to_main_offset
        ),
        format!(
            "[im][voutro]xfade=transition=fade:duration={crossfade}:offset={offset}[{VIDEO_OUTPUT_LABEL}]",
            offset = timing.main_to_outro_offset
        ),
        format!(
            "[{MAIN_INPUT}:a]afade=t=out:st={start}:d={crossfade}[a1]",
            start = timing.audio_fade_start
        ),
        format!("[a1]adelay={delay}|{delay},asetpts=PTS-STARTPTS[{AUDIO_OUTPUT_LABEL}]"),
    ];

    segments.join(";")
}

/// Conform one visual input to the target rate and frame size.
///
/// Scales down preserving aspect ratio, pads to the exact size with the
/// content centered, and forces square pixels.
fn normalize_chain(input: usize, label: &str, stream: &StreamInfo) -> String {
    let StreamInfo { width, height, fps } = *stream;
    format!(
        "[{input}:v]fps={fps},scale={width}:{height}:force_original_aspect_ratio=decrease,\
         pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1[{label}]"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hd30() -> StreamInfo {
        StreamInfo {
            width: 1920,
            height: 1080,
            fps: 30.0,
        }
    }

    #[test]
    fn test_demo_graph() {
        let graph = build_crossfade_graph(20.0, &hd30(), &CrossfadeConfig::default());
        let expected = [
            "[1:v]fps=30,scale=1920:1080:force_original_aspect_ratio=decrease,pad=1920:1080:(ow-iw)/2:(oh-ih)/2,setsar=1[vmain]",
            "[0:v]fps=30,scale=1920:1080:force_original_aspect_ratio=decrease,pad=1920:1080:(ow-iw)/2:(oh-ih)/2,setsar=1[vintro]",
            "[2:v]fps=30,scale=1920:1080:force_original_aspect_ratio=decrease,pad=1920:1080:(ow-iw)/2:(oh-ih)/2,setsar=1[voutro]",
            "[vintro][vmain]xfade=transition=fade:duration=1:offset=4[im]",
            "[im][voutro]xfade=transition=fade:duration=1:offset=23[outv]",
            "[1:a]afade=t=out:st=19:d=1[a1]",
            "[a1]adelay=4000|4000,asetpts=PTS-STARTPTS[aout]",
        ]
        .join(";");
        assert_eq!(graph, expected);
    }

    #[test]
    fn test_graph_exposes_both_outputs_once() {
        let graph = build_crossfade_graph(12.5, &hd30(), &CrossfadeConfig::default());
        assert_eq!(graph.matches("[outv]").count(), 1);
        assert_eq!(graph.matches("[aout]").count(), 1);
        assert!(graph.ends_with("[aout]"));
    }

    #[test]
    fn test_timing_for_demo() {
        let timing = CrossfadeTiming::compute(20.0, &CrossfadeConfig::default());
        assert_eq!(timing.intro_to_main_offset, 4.0);
        assert_eq!(timing.main_to_outro_offset, 23.0);
        assert_eq!(timing.audio_fade_start, 19.0);
        assert_eq!(timing.audio_delay_ms, 4000);
        assert_eq!(timing.composite_duration, 28.0);
        assert!(!timing.overlaps());
    }

    #[test]
    fn test_short_clip_fade_start_clamped() {
        let timing = CrossfadeTiming::compute(0.4, &CrossfadeConfig::default());
        assert_eq!(timing.audio_fade_start, 0.0);
        assert!(timing.overlaps());

        let graph = build_crossfade_graph(0.4, &hd30(), &CrossfadeConfig::default());
        assert!(graph.contains("afade=t=out:st=0:d=1"));
    }

    #[test]
    fn test_delay_truncates_to_milliseconds() {
        let config = CrossfadeConfig {
            intro_visible_secs: 2.5009,
            ..CrossfadeConfig::default()
        };
        let timing = CrossfadeTiming::compute(10.0, &config);
        assert_eq!(timing.audio_delay_ms, 2500);
    }

    #[test]
    fn test_fractional_fps_is_passed_through() {
        let stream = StreamInfo {
            width: 1280,
            height: 720,
            fps: 29.97,
        };
        let graph = build_crossfade_graph(10.0, &stream, &CrossfadeConfig::default());
        assert!(graph.starts_with("[1:v]fps=29.97,scale=1280:720:"));
    }

    proptest! {
        #[test]
        fn prop_offset_gap_equals_main_minus_crossfade(
            main in 0.01f64..10_000.0,
            intro in 0.0f64..30.0,
            crossfade in 0.0f64..5.0,
        ) {
            prop_assume!(main - crossfade > 1e-6);
            let config = CrossfadeConfig {
                intro_visible_secs: intro,
                crossfade_secs: crossfade,
                outro_visible_secs: 4.0,
            };
            let timing = CrossfadeTiming::compute(main, &config);
            let gap = timing.main_to_outro_offset - timing.intro_to_main_offset;
            prop_assert!((gap - (main - crossfade)).abs() < 1e-9);
            prop_assert!(!timing.overlaps());
            prop_assert!(timing.audio_fade_start >= 0.0);
        }
    }
}
