//! Per-project render pipeline and batch driver.
//!
//! Each project runs sequentially through discovery, loudness
//! normalization, re-probing, and the composite render. Failures are
//! caught at the project boundary and reported; they never stop the batch.

use std::fmt;
use std::path::{Path, PathBuf};

use reelbatch_common::config::BatchConfig;
use reelbatch_common::error::{ReelbatchError, ReelbatchResult};
use reelbatch_project_model::codec::CodecPolicy;
use reelbatch_project_model::project::{list_project_dirs, project_name, Project};

use crate::filter_graph::{
    build_crossfade_graph, CrossfadeTiming, AUDIO_OUTPUT_LABEL, VIDEO_OUTPUT_LABEL,
};
use crate::probe::{MediaProbe, MediaProbeResult};
use crate::runner::{CommandRunner, RenderJob};

pub const NORMALIZE_LABEL: &str = "Normalizing";
pub const COMPOSE_LABEL: &str = "Rendering";

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Discover,
    Prepare,
    Normalize,
    Probe,
    Compose,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discover => "discover",
            Self::Prepare => "prepare",
            Self::Normalize => "normalize",
            Self::Probe => "probe",
            Self::Compose => "compose",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one project.
#[derive(Debug)]
pub enum ProjectOutcome {
    Completed { output: PathBuf },
    Skipped { reason: String },
    Failed {
        stage: PipelineStage,
        error: ReelbatchError,
    },
}

/// Outcome of one project, tagged with its name.
#[derive(Debug)]
pub struct ProjectReport {
    pub name: String,
    pub outcome: ProjectOutcome,
}

/// Results of a whole batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub reports: Vec<ProjectReport>,
}

impl BatchSummary {
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, ProjectOutcome::Completed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ProjectOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ProjectOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&ProjectOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Drives the render stages for each project with one codec policy.
pub struct ProjectPipeline<'a> {
    config: &'a BatchConfig,
    codec: CodecPolicy,
    prober: &'a dyn MediaProbe,
    runner: &'a dyn CommandRunner,
}

impl<'a> ProjectPipeline<'a> {
    pub fn new(
        config: &'a BatchConfig,
        codec: CodecPolicy,
        prober: &'a dyn MediaProbe,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            config,
            codec,
            prober,
            runner,
        }
    }

    /// Process every project under `<root>/<batch_dir_name>`.
    ///
    /// Only a missing batch directory is an error; per-project failures
    /// are collected in the summary.
    pub fn run_batch(&self, root: &Path) -> ReelbatchResult<BatchSummary> {
        self.run_batch_with(root, |_| {})
    }

    /// Like [`run_batch`](Self::run_batch), reporting each project as it finishes.
    pub fn run_batch_with(
        &self,
        root: &Path,
        mut on_report: impl FnMut(&ProjectReport),
    ) -> ReelbatchResult<BatchSummary> {
        let batch_dir = self.config.batch_dir(root);
        let project_dirs = list_project_dirs(&batch_dir)?;
        tracing::info!(
            batch_dir = %batch_dir.display(),
            projects = project_dirs.len(),
            codec = %self.codec,
            "Starting batch"
        );

        let mut summary = BatchSummary::default();
        for dir in project_dirs {
            let report = ProjectReport {
                name: project_name(&dir),
                outcome: self.process_project(&dir),
            };
            on_report(&report);
            summary.reports.push(report);
        }

        tracing::info!(
            completed = summary.completed(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "Batch finished"
        );
        Ok(summary)
    }

    /// Run one project to a terminal state. Never returns an error.
    pub fn process_project(&self, dir: &Path) -> ProjectOutcome {
        let name = project_name(dir);
        tracing::info!(project = %name, "Processing project");

        let project = match Project::discover(dir, &self.config.layout) {
            Ok(project) => project,
            Err(ReelbatchError::Discovery { message, .. }) => {
                tracing::warn!(project = %name, reason = %message, "Skipping project");
                return ProjectOutcome::Skipped { reason: message };
            }
            Err(error) => {
                tracing::error!(project = %name, stage = "discover", error = %error, "Project failed");
                return ProjectOutcome::Failed {
                    stage: PipelineStage::Discover,
                    error,
                };
            }
        };

        match self.render(&project) {
            Ok(output) => {
                tracing::info!(project = %name, output = %output.display(), "Finished project");
                ProjectOutcome::Completed { output }
            }
            Err((stage, error)) => {
                tracing::error!(project = %name, %stage, error = %error, "Project failed");
                ProjectOutcome::Failed { stage, error }
            }
        }
    }

    fn render(&self, project: &Project) -> Result<PathBuf, (PipelineStage, ReelbatchError)> {
        let at = |stage: PipelineStage| move |error: ReelbatchError| (stage, error);

        project
            .paths
            .ensure_dirs()
            .map_err(at(PipelineStage::Prepare))?;

        let raw_duration = self
            .prober
            .probe_duration(&project.main_video)
            .map_err(at(PipelineStage::Normalize))?;
        self.runner
            .run(&self.normalize_job(project, raw_duration))
            .map_err(at(PipelineStage::Normalize))?;

        let normalized = self
            .prober
            .probe(&project.paths.normalized_video)
            .map_err(at(PipelineStage::Probe))?;
        tracing::info!(
            project = %project.name,
            duration_secs = normalized.duration_secs,
            width = normalized.width,
            height = normalized.height,
            fps = normalized.fps,
            "Normalized main video probed"
        );

        self.runner
            .run(&self.composite_job(project, &normalized))
            .map_err(at(PipelineStage::Compose))?;

        Ok(project.paths.final_video.clone())
    }

    /// Loudness normalization of the main video into the work directory.
    pub fn normalize_job(&self, project: &Project, raw_duration: f64) -> RenderJob {
        RenderJob::new(&self.config.tools.ffmpeg, NORMALIZE_LABEL)
            .arg("-y")
            .arg("-i")
            .arg(&project.main_video)
            .arg("-af")
            .arg(self.config.render.loudness.filter())
            .arg(&project.paths.normalized_video)
            .total_duration(raw_duration)
    }

    /// Composite render of intro, normalized main, and outro.
    pub fn composite_job(&self, project: &Project, normalized: &MediaProbeResult) -> RenderJob {
        let render = &self.config.render;
        let graph = build_crossfade_graph(
            normalized.duration_secs,
            &normalized.stream(),
            &self.config.crossfade,
        );
        let timing = CrossfadeTiming::compute(normalized.duration_secs, &self.config.crossfade);
        tracing::debug!(
            project = %project.name,
            offset1 = timing.intro_to_main_offset,
            offset2 = timing.main_to_outro_offset,
            composite_secs = timing.composite_duration,
            "Crossfade timing"
        );
        let loop_secs = render.still_loop_secs.to_string();

        RenderJob::new(&self.config.tools.ffmpeg, COMPOSE_LABEL)
            .arg("-y")
            .args(["-loop", "1", "-t", loop_secs.as_str(), "-i"])
            .arg(&project.intro_image)
            .arg("-i")
            .arg(&project.paths.normalized_video)
            .args(["-loop", "1", "-t", loop_secs.as_str(), "-i"])
            .arg(&project.outro_image)
            .arg("-filter_complex")
            .arg(graph)
            .arg("-map")
            .arg(format!("[{VIDEO_OUTPUT_LABEL}]"))
            .arg("-map")
            .arg(format!("[{AUDIO_OUTPUT_LABEL}]"))
            .args(self.codec.video_args())
            .arg("-c:a")
            .arg(render.audio_codec.as_str())
            .arg("-b:a")
            .arg(render.audio_bitrate.as_str())
            .arg(&project.paths.final_video)
            .total_duration(normalized.duration_secs + render.progress_padding_secs)
    }
}
