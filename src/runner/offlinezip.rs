use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::artifact::{artifact_filename, unpacked_collection_dir, ZipKind};
use crate::config::OfflinezipSettings;
use crate::contract::Invocation;
use crate::error::{RunnerError, Stage};
use crate::process::run_checked;
use crate::staging::{relocate, StagingDirectory};

use super::{
    acquirer, input_unavailable, new_staging, rename_staged_zip, resolve_from_archive, Job,
    RunContext,
};

/// Build an offline zip and an epub from the package's complete zip with
/// the cnx-buildout `content2epub.bash` script.
pub async fn make_offlinezip(
    job: &Job,
    settings: &OfflinezipSettings,
    ctx: &RunContext<'_>,
) -> Result<Vec<PathBuf>, RunnerError> {
    let staging = new_staging()?;

    ctx.progress("Acquiring complete zip");
    let staged = stage_completezip(job, settings, &staging, ctx).await?;
    let version = resolve_from_archive(&staged, &staging, job).await?;
    let completezip = rename_staged_zip(staged, ZipKind::Complete, job, &version)?;

    let offlinezip_name = ZipKind::Offline.filename(&job.package, &version);
    let epub_name = artifact_filename(&job.package, &version, None, "epub");

    ctx.progress("Running content2epub build script");
    let invocation = build_script_invocation(
        job,
        &version,
        settings,
        &staging,
        &completezip,
        &offlinezip_name,
        &epub_name,
    );
    run_checked(ctx.commands, &invocation, &ctx.limits)
        .await
        .map_err(|e| RunnerError::failed(Stage::Converting, e))?;
    info!("Offline zip created, moving contents to final destination");

    // The script writes the offline zip next to the unpacked collection.
    let produced = [
        staging
            .join(unpacked_collection_dir(&job.package, &version))
            .join(&offlinezip_name),
        staging.join(&epub_name),
    ];
    relocate(&produced, &settings.output_dir).map_err(|e| RunnerError::failed(Stage::Relocating, e))
}

/// Copy the complete zip from the output directory if an earlier build left
/// it there, otherwise download it.
async fn stage_completezip(
    job: &Job,
    settings: &OfflinezipSettings,
    staging: &StagingDirectory,
    ctx: &RunContext<'_>,
) -> Result<PathBuf, RunnerError> {
    let filename = ZipKind::Complete.filename(&job.package, &job.version);
    let existing = settings.output_dir.join(&filename);
    if existing.is_file() {
        let staged = staging.join(&filename);
        debug!(from = %existing.display(), "Using complete zip from output directory");
        fs::copy(&existing, &staged).map_err(|e| RunnerError::failed(Stage::Acquiring, e))?;
        return Ok(staged);
    }

    let acquired = acquirer(&settings.content_path, settings.credentials.as_ref())
        .get_completezip(
            &job.package,
            &job.version,
            &job.repository_uri,
            staging.path(),
            false,
            &ctx.limits,
        )
        .await
        .map_err(|e| input_unavailable(e, ZipKind::Complete))?;
    Ok(acquired.archive().to_path_buf())
}

fn build_script_invocation(
    job: &Job,
    version: &str,
    settings: &OfflinezipSettings,
    staging: &StagingDirectory,
    completezip: &Path,
    offlinezip_name: &str,
    epub_name: &str,
) -> Invocation {
    let script = settings.cnx_buildout_dir.join("scripts").join("content2epub.bash");
    let completezip_name = completezip
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| completezip.as_os_str().to_owned());

    let mut invocation = Invocation::new(script)
        .args(["Connexions", job.package.as_str(), version])
        .arg(staging.path())
        .arg(completezip_name)
        .arg(offlinezip_name)
        .arg(epub_name)
        .arg(&settings.oer_exports_dir)
        .current_dir(&settings.oer_exports_dir);

    if let Some(env) = &settings.python_env {
        invocation = invocation
            .env("VIRTUAL_ENV", env)
            .env("PATH", virtualenv_path(env));
    }
    invocation
}

/// `{env}/bin` in front of the inherited `PATH`.
fn virtualenv_path(env: &Path) -> OsString {
    let mut entries = vec![env.join("bin")];
    if let Some(path) = std::env::var_os("PATH") {
        entries.extend(std::env::split_paths(&path));
    }
    std::env::join_paths(entries).unwrap_or_else(|_| env.join("bin").into_os_string())
}
