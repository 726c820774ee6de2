use std::path::{Path, PathBuf};

use tracing::info;

use crate::artifact::{artifact_filename, ZipKind};
use crate::config::PdfSettings;
use crate::contract::Invocation;
use crate::error::{RunnerError, Stage};
use crate::process::run_checked;
use crate::staging::relocate;

use super::{
    acquirer, input_unavailable, new_staging, resolve_from_entry, unpacked_entry, Job, RunContext,
};

/// Render the package's offline zip to PDF with oer.exports and the
/// configured PDF generator.
pub async fn make_pdf(
    job: &Job,
    settings: &PdfSettings,
    ctx: &RunContext<'_>,
) -> Result<Vec<PathBuf>, RunnerError> {
    let staging = new_staging()?;

    ctx.progress("Acquiring offline zip");
    let acquired = acquirer(&settings.content_path, settings.credentials.as_ref())
        .get_offlinezip(
            &job.package,
            &job.version,
            &job.repository_uri,
            staging.path(),
            true,
            &ctx.limits,
        )
        .await
        .map_err(|e| input_unavailable(e, ZipKind::Offline))?;
    let entry = unpacked_entry(acquired, staging.path()).await?;
    let version = resolve_from_entry(job, &entry)?;
    let collection_dir = staging.join(&entry).join("content");

    ctx.progress("Reading print style from collection");
    let style_invocation = print_style_invocation(settings, &collection_dir);
    let style = run_checked(ctx.commands, &style_invocation, &ctx.limits)
        .await
        .map_err(|e| RunnerError::failed(Stage::Converting, e))?;
    let print_style = style.stdout.trim();
    info!(print_style = %print_style, "Using print style");

    let result = staging.join(artifact_filename(&job.package, &version, None, "pdf"));
    let invocation = pdf_invocation(settings, &collection_dir, print_style, &result, staging.path());

    ctx.progress("Converting collection to PDF");
    run_checked(ctx.commands, &invocation, &ctx.limits)
        .await
        .map_err(|e| RunnerError::failed(Stage::Converting, e))?;

    relocate(&[result], &settings.output_dir).map_err(|e| RunnerError::failed(Stage::Relocating, e))
}

/// `xsltproc collxml-print-style.xsl collection.xml` prints the style name.
fn print_style_invocation(settings: &PdfSettings, collection_dir: &Path) -> Invocation {
    Invocation::new(&settings.xsltproc)
        .arg(
            settings
                .oer_exports_dir
                .join("xsl")
                .join("collxml-print-style.xsl"),
        )
        .arg(collection_dir.join("collection.xml"))
}

fn pdf_invocation(
    settings: &PdfSettings,
    collection_dir: &Path,
    print_style: &str,
    result: &Path,
    cwd: &Path,
) -> Invocation {
    Invocation::new(&settings.python)
        .arg(settings.oer_exports_dir.join("collectiondbk2pdf.py"))
        .arg("-p")
        .arg(&settings.pdf_generator)
        .arg("-d")
        .arg(collection_dir)
        .arg("-s")
        .arg(print_style)
        .arg(result)
        .current_dir(cwd)
}
