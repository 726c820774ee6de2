use std::path::PathBuf;

use crate::artifact::artifact_filename;
use crate::config::CollxmlSettings;
use crate::error::{RunnerError, Stage};
use crate::staging::relocate;

use super::{acquirer, new_staging, Job, RunContext};

/// Fetch the collection XML source for a package. The version is passed
/// through as requested.
pub async fn make_collxml(
    job: &Job,
    settings: &CollxmlSettings,
    ctx: &RunContext<'_>,
) -> Result<Vec<PathBuf>, RunnerError> {
    let staging = new_staging()?;
    let acquirer = acquirer(&settings.content_path, Some(&settings.credentials));

    ctx.progress("Requesting collection XML from the repository");
    let url = acquirer.content_url(&job.repository_uri, &job.package, &job.version, "source_create");
    let staged = staging.join(artifact_filename(&job.package, &job.version, None, "xml"));
    acquirer
        .download(&url, &staged, &ctx.limits)
        .await
        .map_err(|e| RunnerError::failed(Stage::Acquiring, e))?;

    relocate(&[staged], &settings.output_dir).map_err(|e| RunnerError::failed(Stage::Relocating, e))
}
