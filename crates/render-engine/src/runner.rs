//! Progress-tracked external process execution.
//!
//! The encoding engine reports progress only as free-form diagnostic text
//! on stderr. A dedicated reader thread drains that stream for the whole
//! life of the child (so the child never blocks on a full pipe), scanning
//! each line for `time=HH:MM:SS.CC` markers.

use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use reelbatch_common::error::{ReelbatchError, ReelbatchResult};

static TIME_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"time=(\d+):(\d+):(\d+)\.(\d+)").expect("time marker pattern is valid")
});

/// Diagnostic lines kept for failure reports.
const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// One external-process invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    /// Program to run.
    pub program: PathBuf,

    /// Full argument list. Paths are kept as raw OS strings.
    pub args: Vec<OsString>,

    /// Expected output duration; enables progress tracking when set.
    pub total_duration: Option<f64>,

    /// Human-readable stage label (e.g. `Normalizing`).
    pub label: String,
}

impl RenderJob {
    pub fn new(program: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            total_duration: None,
            label: label.into(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    pub fn total_duration(mut self, secs: f64) -> Self {
        self.total_duration = Some(secs);
        self
    }

    /// Shell-like rendering for logs. Lossy; never fed back to a process.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().map(|arg| {
                let arg = arg.to_string_lossy();
                if arg.is_empty() || arg.contains(char::is_whitespace) {
                    format!("'{arg}'")
                } else {
                    arg.into_owned()
                }
            }))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Progress of one running job, in seconds of output timeline.
///
/// `current_secs` never decreases and always stays within `[0, total_secs]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressState {
    pub current_secs: f64,
    pub total_secs: f64,
}

impl ProgressState {
    pub fn new(total_secs: f64) -> Self {
        Self {
            current_secs: 0.0,
            total_secs: total_secs.max(0.0),
        }
    }

    /// Record an observed timestamp. Returns true if the value moved.
    pub fn advance(&mut self, secs: f64) -> bool {
        if !secs.is_finite() {
            return false;
        }
        let clamped = secs.clamp(0.0, self.total_secs);
        if clamped > self.current_secs {
            self.current_secs = clamped;
            true
        } else {
            false
        }
    }

    /// Scan one diagnostic line. Returns true if progress moved.
    pub fn observe_line(&mut self, line: &str) -> bool {
        match parse_time_marker(line) {
            Some(secs) => self.advance(secs),
            None => false,
        }
    }

    pub fn finish(&mut self) {
        self.current_secs = self.total_secs;
    }
}

/// Stages of a job as seen by progress observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Started,
    Running,
    Complete,
    Failed,
}

/// Progress report for a tracked job.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderProgress {
    pub label: String,
    pub state: ProgressState,
    pub stage: RenderStage,
}

/// Progress callback for tracked jobs. Invoked from the reader thread.
pub type ProgressCallback = Arc<dyn Fn(&RenderProgress) + Send + Sync>;

/// Executes render jobs to completion.
pub trait CommandRunner {
    fn run(&self, job: &RenderJob) -> ReelbatchResult<()>;
}

/// [`CommandRunner`] that spawns real child processes.
#[derive(Clone, Default)]
pub struct ProcessRunner {
    progress: Option<ProgressCallback>,
}

#[derive(Debug, Default)]
struct DrainSummary {
    state: Option<ProgressState>,
    tail: VecDeque<String>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(progress: ProgressCallback) -> Self {
        Self {
            progress: Some(progress),
        }
    }

    fn emit(&self, label: &str, state: ProgressState, stage: RenderStage) {
        if let Some(cb) = &self.progress {
            cb(&RenderProgress {
                label: label.to_string(),
                state,
                stage,
            });
        }
    }

    fn drain<R: BufRead>(
        &self,
        reader: R,
        label: &str,
        mut state: Option<ProgressState>,
    ) -> DrainSummary {
        let mut tail = VecDeque::with_capacity(DIAGNOSTIC_TAIL_LINES);
        let result = for_each_line(reader, |line| {
            if let Some(state) = state.as_mut() {
                if state.observe_line(line) {
                    self.emit(label, *state, RenderStage::Running);
                }
            }
            if tail.len() == DIAGNOSTIC_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line.to_string());
        });
        if let Err(err) = result {
            tracing::warn!(label, error = %err, "Diagnostic stream read failed");
        }
        DrainSummary { state, tail }
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, job: &RenderJob) -> ReelbatchResult<()> {
        let label = job.label.as_str();
        tracing::info!(label, command = %job.command_line(), "Running");

        let mut child = Command::new(&job.program)
            .args(&job.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ReelbatchError::spawn(job.program.display().to_string(), e))?;

        let Some(stderr) = child.stderr.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ReelbatchError::Other(anyhow::anyhow!(
                "Failed to capture {} stderr",
                job.program.display()
            )));
        };

        let tracker = job
            .total_duration
            .filter(|secs| *secs > 0.0)
            .map(ProgressState::new);
        if let Some(state) = tracker {
            self.emit(label, state, RenderStage::Started);
        }

        tracing::debug!(pid = child.id(), label, tracked = tracker.is_some(), "Process started");

        let (status, summary) = std::thread::scope(|scope| {
            let reader = scope.spawn(move || self.drain(BufReader::new(stderr), label, tracker));
            let status = child.wait();
            let summary = reader.join().unwrap_or_else(|_| {
                tracing::warn!(label, "Diagnostic reader panicked");
                DrainSummary::default()
            });
            (status, summary)
        });

        let status = status.map_err(|e| {
            ReelbatchError::Other(anyhow::anyhow!(
                "Failed to wait on {}: {e}",
                job.program.display()
            ))
        })?;

        if !status.success() {
            // Release the progress display before the diagnostics hit stderr.
            if let Some(state) = summary.state {
                self.emit(label, state, RenderStage::Failed);
            }
            let tail = summary.tail.iter().cloned().collect::<Vec<_>>().join("\n");
            tracing::warn!(label, %status, diagnostics = %tail, "Process failed");
            return Err(ReelbatchError::process(label, status.code()));
        }

        if let Some(mut state) = summary.state {
            state.finish();
            self.emit(label, state, RenderStage::Complete);
        }
        Ok(())
    }
}

/// Extract the `time=HH:MM:SS.CC` marker from a diagnostic line, in seconds.
pub fn parse_time_marker(line: &str) -> Option<f64> {
    if !line.contains("time=") {
        return None;
    }
    let caps = TIME_MARKER.captures(line)?;
    let hours: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    let fraction = &caps[4];
    let scale = 10f64.powi(i32::try_from(fraction.len()).ok()?);
    let fraction: f64 = fraction.parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds + fraction / scale)
}

/// Split a byte stream into lines on `\n` or `\r`, decoding lossily.
///
/// The encoder rewrites its status line in place with bare carriage
/// returns, so `\r` must terminate a line too. Empty lines are skipped.
pub fn for_each_line<R: BufRead>(mut reader: R, mut on_line: impl FnMut(&str)) -> io::Result<()> {
    let mut pending: Vec<u8> = Vec::new();
    loop {
        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if buf.is_empty() {
            break;
        }
        let consumed = buf.len();
        for &byte in buf {
            if byte == b'\n' || byte == b'\r' {
                if !pending.is_empty() {
                    on_line(&String::from_utf8_lossy(&pending));
                    pending.clear();
                }
            } else {
                pending.push(byte);
            }
        }
        reader.consume(consumed);
    }
    if !pending.is_empty() {
        on_line(&String::from_utf8_lossy(&pending));
    }
    Ok(())
}

/// Whether a tool can be launched (`<program> -version` succeeds).
pub fn tool_available(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
