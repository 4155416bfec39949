//! Error types shared across ReelBatch crates.

use std::path::PathBuf;

/// Top-level error type for ReelBatch operations.
///
/// Everything except [`ReelbatchError::BatchSetup`] is recoverable at
/// project granularity: the orchestrator reports it and moves on to the
/// next project directory.
#[derive(Debug, thiserror::Error)]
pub enum ReelbatchError {
    #[error("Discovery error in {project}: {message}")]
    Discovery { project: String, message: String },

    #[error("Probe error for {}: {message}", .path.display())]
    Probe { path: PathBuf, message: String },

    #[error("{label} failed: process exited with {}", exit_code_display(.exit_code))]
    Process {
        label: String,
        exit_code: Option<i32>,
    },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Batch setup error: {message}")]
    BatchSetup { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReelbatchError.
pub type ReelbatchResult<T> = Result<T, ReelbatchError>;

fn exit_code_display(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl ReelbatchError {
    pub fn discovery(project: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Discovery {
            project: project.into(),
            message: msg.into(),
        }
    }

    pub fn probe(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Probe {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn process(label: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::Process {
            label: label.into(),
            exit_code,
        }
    }

    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    pub fn batch_setup(msg: impl Into<String>) -> Self {
        Self::BatchSetup {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error terminates the whole batch rather than one project.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BatchSetup { .. })
    }

    /// Exit code recorded for a failed external process, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Process { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}
