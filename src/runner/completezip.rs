use std::path::PathBuf;

use tracing::info;

use crate::artifact::ZipKind;
use crate::config::CompletezipSettings;
use crate::error::{RunnerError, Stage};
use crate::staging::relocate;

use super::{acquirer, new_staging, rename_staged_zip, resolve_from_archive, Job, RunContext};

/// Ask the legacy repository to build a complete zip and keep the result.
///
/// The `create_complete` endpoint produces the zip, so every failure here,
/// 404 included, is fatal.
pub async fn make_completezip(
    job: &Job,
    settings: &CompletezipSettings,
    ctx: &RunContext<'_>,
) -> Result<Vec<PathBuf>, RunnerError> {
    let staging = new_staging()?;
    let acquirer = acquirer(&settings.content_path, Some(&settings.credentials));

    ctx.progress("Requesting complete zip from the repository");
    let url = acquirer.content_url(&job.repository_uri, &job.package, &job.version, "create_complete");
    let staged = staging.join(ZipKind::Complete.filename(&job.package, &job.version));
    acquirer
        .download(&url, &staged, &ctx.limits)
        .await
        .map_err(|e| RunnerError::failed(Stage::Acquiring, e))?;

    let version = resolve_from_archive(&staged, &staging, job).await?;
    let artifact = rename_staged_zip(staged, ZipKind::Complete, job, &version)?;

    info!(artifact = %artifact.display(), "Complete zip received");
    relocate(&[artifact], &settings.output_dir).map_err(|e| RunnerError::failed(Stage::Relocating, e))
}
