//! # contract: the seams between the runners and the outside world
//!
//! The job-dispatch system owns the build request, the job tracker owns the
//! status, and the converters are opaque child processes. Each of those is a
//! trait here so the runners can be driven by real implementations or by the
//! `mockall` mocks exported under the `test-export-mocks` feature.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;

use crate::error::ProcessError;
use crate::limits::Limits;

/// The four capabilities a runner needs from an incoming job description.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait BuildRequest: Send + Sync {
    /// Package (collection or module) id, e.g. `col10642`.
    fn get_package(&self) -> String;

    /// Requested version, or the symbolic `latest`.
    fn get_version(&self) -> String;

    /// Base URI of the content repository, e.g. `http://cnx.org:80`.
    fn repository_uri(&self) -> String;

    /// Record the build start time and return it.
    fn stamp_request(&mut self) -> DateTime<Utc>;
}

/// States reported to the job tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Building,
    Blocked,
    Failed,
    Done,
}

impl BuildState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildState::Building => "Building",
            BuildState::Blocked => "Blocked",
            BuildState::Failed => "Failed",
            BuildState::Done => "Done",
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives status updates for one build.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait StatusReporter: Send + Sync {
    fn set_status(&self, state: BuildState, message: &str);
}

/// Default reporter: every status update becomes a tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatusReporter;

impl StatusReporter for TracingStatusReporter {
    fn set_status(&self, state: BuildState, message: &str) {
        match state {
            BuildState::Failed => tracing::error!(state = %state, "{message}"),
            BuildState::Blocked => tracing::warn!(state = %state, "{message}"),
            _ => tracing::info!(state = %state, "{message}"),
        }
    }
}

/// A fully specified child process: program, argument vector, working
/// directory and extra environment. Never a shell string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(OsString, OsString)>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Human-readable command line, for logs only.
    pub fn display(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().map(|a| a.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external converter processes.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the invocation to completion, bounded by `limits`.
    ///
    /// A non-zero exit status is not an error here; callers decide what a
    /// failed exit means for them.
    async fn run(
        &self,
        invocation: &Invocation,
        limits: &Limits,
    ) -> Result<ProcessOutput, ProcessError>;
}
