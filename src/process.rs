//! Child-process execution for the external converters.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::contract::{CommandRunner, Invocation, ProcessOutput};
use crate::error::{ConversionError, ProcessError};
use crate::limits::Limits;

/// [`CommandRunner`] backed by `tokio::process`. The child is killed if the
/// build is cancelled or times out.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        limits: &Limits,
    ) -> Result<ProcessOutput, ProcessError> {
        let program = invocation.program.to_string_lossy().into_owned();
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }

        info!(command = %invocation.display(), cwd = ?invocation.cwd, "Running converter");

        let output = limits
            .run(command.output())
            .await
            .map_err(|source| {
                error!(program = %program, error = %source, "Converter interrupted");
                ProcessError::Interrupted {
                    program: program.clone(),
                    source,
                }
            })?
            .map_err(|source| {
                error!(program = %program, error = ?source, "Failed to launch converter");
                ProcessError::Spawn {
                    program: program.clone(),
                    source,
                }
            })?;

        let output = ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(program = %program, code = ?output.code, "Converter finished");
        Ok(output)
    }
}

/// Run `invocation` and turn a non-zero exit into a [`ConversionError`]
/// carrying the captured output.
pub async fn run_checked(
    commands: &dyn CommandRunner,
    invocation: &Invocation,
    limits: &Limits,
) -> Result<ProcessOutput, CheckedError> {
    let output = commands.run(invocation, limits).await?;
    if output.success() {
        return Ok(output);
    }
    error!(
        command = %invocation.display(),
        code = ?output.code,
        stderr = %output.stderr,
        "Converter failed"
    );
    Err(CheckedError::Conversion(conversion_error(invocation, output)))
}

pub fn conversion_error(invocation: &Invocation, output: ProcessOutput) -> ConversionError {
    ConversionError {
        program: invocation.program.to_string_lossy().into_owned(),
        code: output.code,
        stdout: output.stdout,
        stderr: output.stderr,
    }
}

/// Either the process could not run, or it ran and failed.
#[derive(Debug, thiserror::Error)]
pub enum CheckedError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl From<CheckedError> for crate::error::BuildFailure {
    fn from(err: CheckedError) -> Self {
        match err {
            CheckedError::Process(e) => e.into(),
            CheckedError::Conversion(e) => e.into(),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn captures_output_and_exit_code() {
        let output = TokioCommandRunner
            .run(&sh("echo out; echo err >&2; exit 3"), &Limits::unbounded())
            .await
            .unwrap();
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[tokio::test]
    async fn passes_cwd_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let invocation = sh("pwd; echo $ROADRUNNERS_TEST")
            .current_dir(dir.path())
            .env("ROADRUNNERS_TEST", "hello");
        let output = TokioCommandRunner
            .run(&invocation, &Limits::unbounded())
            .await
            .unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert!(output.stdout.contains(canonical.to_str().unwrap()), "{}", output.stdout);
        assert!(output.stdout.ends_with("hello\n"));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let err = TokioCommandRunner
            .run(&Invocation::new("/nonexistent/converter"), &Limits::unbounded())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn timeout_interrupts_the_child() {
        let err = TokioCommandRunner
            .run(&sh("sleep 10"), &Limits::with_timeout(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Interrupted { .. }));
    }

    #[tokio::test]
    async fn run_checked_reports_stderr() {
        let err = run_checked(&TokioCommandRunner, &sh("echo broken >&2; exit 1"), &Limits::unbounded())
            .await
            .unwrap_err();
        match err {
            CheckedError::Conversion(e) => assert_eq!(e.stderr, "broken\n"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
