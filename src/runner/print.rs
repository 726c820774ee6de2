use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::artifact::artifact_filename;
use crate::config::PrintSettings;
use crate::contract::Invocation;
use crate::error::{BuildFailure, RunnerError, Stage};
use crate::lock::NamedLock;
use crate::process::run_checked;
use crate::staging::relocate;

use super::{Job, RunContext};

/// Lock name guarding the shared print working tree.
pub const PRINT_LOCK: &str = "print";

/// Drive the RhaptosPrint makefiles in the shared print directory.
///
/// The makefiles build in place, so the whole run holds [`PRINT_LOCK`] in
/// that directory.
pub async fn make_print(
    job: &Job,
    settings: &PrintSettings,
    ctx: &RunContext<'_>,
) -> Result<Vec<PathBuf>, RunnerError> {
    let starting = |e: std::io::Error| RunnerError::failed(Stage::Starting, e);
    let cwd = match &settings.print_dir {
        Some(dir) => std::path::absolute(dir).map_err(starting)?,
        None => std::env::current_dir().map_err(starting)?,
    };

    let _lock = NamedLock::acquire(&cwd, PRINT_LOCK)
        .await
        .map_err(|e| RunnerError::failed(Stage::Starting, e))?;

    ctx.progress("Cleaning the print directory");
    let clear = Invocation::new(&settings.make).arg("clear").current_dir(&cwd);
    match ctx.commands.run(&clear, &ctx.limits).await {
        Ok(output) if output.success() => {}
        Ok(output) => {
            warn!(code = ?output.code, stderr = %output.stderr, "make clear failed, continuing")
        }
        Err(e) => warn!(error = %e, "make clear could not run, continuing"),
    }

    ctx.progress("Running print makefile");
    let invocation = make_invocation(job, settings, &cwd);
    run_checked(ctx.commands, &invocation, &ctx.limits)
        .await
        .map_err(|e| RunnerError::failed(Stage::Converting, e))?;

    let built = cwd.join(format!("{}.pdf", job.package));
    let result = cwd.join(artifact_filename(&job.package, &job.version, None, "pdf"));
    if !built.is_file() {
        return Err(RunnerError::failed(
            Stage::Relocating,
            BuildFailure::MissingOutput(built),
        ));
    }
    fs::rename(&built, &result).map_err(|e| RunnerError::failed(Stage::Relocating, e))?;
    info!(pdf = %result.display(), "Print PDF built");

    relocate(&[result], &settings.output_dir).map_err(|e| RunnerError::failed(Stage::Relocating, e))
}

fn make_invocation(job: &Job, settings: &PrintSettings, cwd: &Path) -> Invocation {
    let makefile = if job.package.starts_with('m') {
        "module_print.mak"
    } else {
        "course_print.mak"
    };

    let mut invocation = Invocation::new(&settings.make)
        .args(["-f", makefile])
        .arg(format!("{}.pdf", job.package));

    let mut python = std::ffi::OsString::from("PYTHON=");
    python.push(&settings.python);
    invocation = invocation.arg(python);

    if let Some(print_dir) = &settings.print_dir {
        let mut var = std::ffi::OsString::from("PRINT_DIR=");
        var.push(print_dir);
        invocation = invocation.arg(var);
    }
    let host = repository_host(&job.repository_uri);
    if !host.is_empty() {
        invocation = invocation.arg(format!("HOST={host}"));
    }
    invocation
        .arg(format!("VERSION={}", job.version))
        .current_dir(cwd)
}

/// `{scheme}://{host}` of the repository URI.
fn repository_host(uri: &str) -> String {
    uri.split('/').take(3).collect::<Vec<_>>().join("/")
}
