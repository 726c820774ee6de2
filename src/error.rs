//! Error types for the runners.
//!
//! The leaf errors (`DownloadError`, `ExtractionError`, `ConversionError`)
//! carry the diagnostic text that was produced upstream: the HTTP body or
//! the captured standard error. `RunnerError` is what a build ends with.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A long operation was stopped before it finished.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("cancelled")]
    Cancelled,
}

/// Non-200 response from the content repository.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not download file at '{url}' with response ({status}):\n{body}")]
pub struct DownloadError {
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// An archive could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to extract '{}': {message}", .archive.display())]
pub struct ExtractionError {
    pub archive: PathBuf,
    pub message: String,
}

/// A converter process exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{program}' exited with {}:\n{stderr}", exit_description(.code))]
pub struct ConversionError {
    pub program: String,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// Failure to run a child process at all.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{program}' {source}")]
    Interrupted {
        program: String,
        #[source]
        source: Interrupted,
    },
}

/// Failure to stage an input artifact.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("issue connecting to the content repository at {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("expected exactly one top-level entry in '{}', found {entries:?}", .archive.display())]
    UnexpectedArchiveLayout {
        archive: PathBuf,
        entries: Vec<String>,
    },

    #[error("download of {url} {source}")]
    Interrupted {
        url: String,
        #[source]
        source: Interrupted,
    },

    #[error("I/O error while staging input: {0}")]
    Io(#[from] std::io::Error),
}

impl AcquireError {
    /// True when the repository answered 404, i.e. the artifact has not been
    /// produced upstream yet.
    pub fn is_not_yet_available(&self) -> bool {
        matches!(self, AcquireError::Download(e) if e.status == 404)
    }
}

/// Invalid or incomplete runner settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("runner '{runner}' requires the '{key}' setting")]
    Missing { runner: String, key: String },

    #[error("runner '{runner}': {message}")]
    Invalid { runner: String, message: String },

    #[error("no settings found for runner '{0}'")]
    UnknownRunner(String),
}

/// Failure to take a named lock.
#[derive(Debug, Error)]
#[error("failed to lock '{}': {source}", .path.display())]
pub struct LockError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// The lifecycle stage a build was in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Starting,
    Acquiring,
    Converting,
    Relocating,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Starting => "starting",
            Stage::Acquiring => "acquiring",
            Stage::Converting => "converting",
            Stage::Relocating => "relocating",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Underlying cause of a failed build.
#[derive(Debug, Error)]
pub enum BuildFailure {
    #[error(transparent)]
    Settings(#[from] ConfigError),

    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("cannot resolve a version from unpacked entry '{0}'")]
    UnresolvableVersion(String),

    #[error("expected output '{}' was not produced", .0.display())]
    MissingOutput(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a build ended, when it did not succeed.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// An input artifact does not exist upstream yet; retry later.
    #[error("blocked: {reason}")]
    Blocked {
        reason: String,
        #[source]
        source: AcquireError,
    },

    /// Fatal; an operator has to look at it.
    #[error("failed while {stage}: {cause}")]
    Failed {
        stage: Stage,
        #[source]
        cause: BuildFailure,
    },
}

impl RunnerError {
    pub fn failed(stage: Stage, cause: impl Into<BuildFailure>) -> Self {
        RunnerError::Failed {
            stage,
            cause: cause.into(),
        }
    }

    /// Classify an acquisition failure. Only inputs produced by another job
    /// can be `Blocked`; everything else fails.
    pub fn from_acquire(err: AcquireError, blockable: bool, reason: &str) -> Self {
        if blockable && err.is_not_yet_available() {
            RunnerError::Blocked {
                reason: reason.to_string(),
                source: err,
            }
        } else {
            RunnerError::failed(Stage::Acquiring, err)
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, RunnerError::Blocked { .. })
    }

    pub fn stage(&self) -> Stage {
        match self {
            RunnerError::Blocked { .. } => Stage::Acquiring,
            RunnerError::Failed { stage, .. } => *stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn download(status: u16) -> AcquireError {
        AcquireError::Download(DownloadError {
            url: "http://cnx.org/content/col10642/1.2/complete".into(),
            status,
            body: "nope".into(),
        })
    }

    #[test]
    fn not_found_is_blocked_only_when_blockable() {
        let err = RunnerError::from_acquire(download(404), true, "complete zip does not exist yet");
        assert!(err.is_blocked());

        let err = RunnerError::from_acquire(download(404), false, "unused");
        assert!(!err.is_blocked());
        assert_eq!(err.stage(), Stage::Acquiring);
    }

    #[test]
    fn server_error_is_never_blocked() {
        let err = RunnerError::from_acquire(download(500), true, "unused");
        assert!(matches!(
            err,
            RunnerError::Failed {
                stage: Stage::Acquiring,
                ..
            }
        ));
    }

    #[test]
    fn download_error_message_carries_url_status_and_body() {
        let msg = download(503).to_string();
        assert!(msg.contains("http://cnx.org/content/col10642/1.2/complete"));
        assert!(msg.contains("503"));
        assert!(msg.contains("nope"));
    }

    #[test]
    fn conversion_error_message_carries_stderr() {
        let err = ConversionError {
            program: "python3".into(),
            code: Some(2),
            stdout: String::new(),
            stderr: "Traceback: boom".into(),
        };
        let msg = RunnerError::failed(Stage::Converting, err).to_string();
        assert!(msg.contains("converting"));
        assert!(msg.contains("status 2"));
        assert!(msg.contains("Traceback: boom"));
    }
}
