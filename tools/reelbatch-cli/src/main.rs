//! ReelBatch CLI: render every project in a batch folder.
//!
//! Usage:
//!   reelbatch [--codec h265_nvenc|h265|h264] [--root DIR] [--config FILE]
//!
//! Each subdirectory of `<root>/VID` holding a main video, `intro.png`, and
//! `outro.png` is rendered to `<project>/03_Final/<project>_final.mp4`.

use std::path::PathBuf;

use clap::Parser;
use reelbatch_common::config::BatchConfig;
use reelbatch_project_model::codec::CodecPolicy;
use reelbatch_render_engine::pipeline::{ProjectOutcome, ProjectPipeline, ProjectReport};
use reelbatch_render_engine::probe::FfprobeProber;
use reelbatch_render_engine::runner::{tool_available, ProcessRunner};

mod progress;

use progress::ProgressBars;

#[derive(Parser)]
#[command(
    name = "reelbatch",
    about = "Batch-render intro/main/outro video projects with crossfades",
    version,
    author
)]
struct Cli {
    /// Video codec policy: h265_nvenc (GPU HEVC), h265 (CPU x265), h264 (GPU H.264)
    #[arg(long, default_value_t = CodecPolicy::default())]
    codec: CodecPolicy,

    /// Batch root containing the project folder
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// JSON configuration file overriding the built-in defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not draw progress bars
    #[arg(long)]
    no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = BatchConfig::load(cli.config.as_deref())?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    reelbatch_common::logging::init_logging(&config.logging);

    for tool in [&config.tools.ffmpeg, &config.tools.ffprobe] {
        if !tool_available(tool) {
            tracing::warn!(tool = %tool, "Tool not found or not runnable; renders will fail");
        }
    }

    let prober = FfprobeProber::new(&config.tools.ffprobe, config.render.default_fps);
    let runner = if cli.no_progress {
        ProcessRunner::new()
    } else {
        ProcessRunner::with_progress(ProgressBars::new().callback())
    };
    let pipeline = ProjectPipeline::new(&config, cli.codec, &prober, &runner);

    tracing::info!(
        codec = %cli.codec,
        encoder = cli.codec.profile().encoder,
        hardware = cli.codec.is_hardware(),
        "Codec policy selected"
    );
    println!("Codec policy: {}", cli.codec);
    let summary = pipeline.run_batch_with(&cli.root, print_report)?;

    println!(
        "\nBatch complete: {} rendered, {} skipped, {} failed",
        summary.completed(),
        summary.skipped(),
        summary.failed()
    );
    Ok(())
}

fn print_report(report: &ProjectReport) {
    match &report.outcome {
        ProjectOutcome::Completed { output } => {
            println!("[OK]   {}: {}", report.name, output.display());
        }
        ProjectOutcome::Skipped { reason } => {
            println!("[SKIP] {}: {reason}", report.name);
        }
        ProjectOutcome::Failed { stage, error } => {
            println!("[FAIL] {} ({stage}): {error}", report.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_defaults_to_hardware_hevc() {
        let cli = Cli::try_parse_from(["reelbatch"]).unwrap();
        assert_eq!(cli.codec, CodecPolicy::HevcNvenc);
        assert_eq!(cli.root, PathBuf::from("."));
        assert!(!cli.no_progress);
    }

    #[test]
    fn test_codec_flag_selects_policy() {
        let cli = Cli::try_parse_from(["reelbatch", "--codec", "H264"]).unwrap();
        assert_eq!(cli.codec, CodecPolicy::H264Nvenc);
    }

    #[test]
    fn test_unknown_codec_rejected() {
        assert!(Cli::try_parse_from(["reelbatch", "--codec", "vp9"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
