use std::path::{Path, PathBuf};

use crate::artifact::{artifact_filename, ZipKind};
use crate::config::EpubSettings;
use crate::contract::Invocation;
use crate::error::{RunnerError, Stage};
use crate::process::run_checked;
use crate::staging::relocate;

use super::{
    acquirer, input_unavailable, new_staging, resolve_from_entry, unpacked_entry, Job, RunContext,
};

/// Convert an unpacked complete zip to epub with oer.exports.
pub async fn make_epub(
    job: &Job,
    settings: &EpubSettings,
    ctx: &RunContext<'_>,
) -> Result<Vec<PathBuf>, RunnerError> {
    let staging = new_staging()?;

    ctx.progress("Acquiring complete zip");
    let acquired = acquirer(&settings.content_path, settings.credentials.as_ref())
        .get_completezip(
            &job.package,
            &job.version,
            &job.repository_uri,
            staging.path(),
            true,
            &ctx.limits,
        )
        .await
        .map_err(|e| input_unavailable(e, ZipKind::Complete))?;
    let entry = unpacked_entry(acquired, staging.path()).await?;
    let version = resolve_from_entry(job, &entry)?;

    let result = staging.join(artifact_filename(&job.package, &version, None, "epub"));
    let invocation = epub_invocation(settings, &staging.join(&entry), &result, staging.path());

    ctx.progress("Converting collection to epub");
    run_checked(ctx.commands, &invocation, &ctx.limits)
        .await
        .map_err(|e| RunnerError::failed(Stage::Converting, e))?;

    relocate(&[result], &settings.output_dir).map_err(|e| RunnerError::failed(Stage::Relocating, e))
}

fn epub_invocation(
    settings: &EpubSettings,
    collection_dir: &Path,
    result: &Path,
    cwd: &Path,
) -> Invocation {
    let oer = &settings.oer_exports_dir;
    Invocation::new(&settings.python)
        .arg(oer.join("content2epub.py"))
        .arg(collection_dir)
        .args(["-t", "collection"])
        .arg("-c")
        .arg(oer.join("static").join("content.css"))
        .arg("-e")
        .arg(oer.join("xsl").join("dbk2epub.xsl"))
        .arg("-o")
        .arg(result)
        .current_dir(cwd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn epub_arguments() {
        let settings = EpubSettings {
            output_dir: PathBuf::from("/srv/out"),
            oer_exports_dir: PathBuf::from("/opt/oer"),
            python: PathBuf::from("/usr/bin/python2"),
            credentials: None,
            content_path: "/content".into(),
        };

        let invocation = epub_invocation(
            &settings,
            Path::new("/tmp/build/col10642_1.2_complete"),
            Path::new("/tmp/build/col10642-1.2.epub"),
            Path::new("/tmp/build"),
        );

        let expected: Vec<OsString> = [
            "/opt/oer/content2epub.py",
            "/tmp/build/col10642_1.2_complete",
            "-t",
            "collection",
            "-c",
            "/opt/oer/static/content.css",
            "-e",
            "/opt/oer/xsl/dbk2epub.xsl",
            "-o",
            "/tmp/build/col10642-1.2.epub",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        assert_eq!(invocation.program, PathBuf::from("/usr/bin/python2"));
        assert_eq!(invocation.args, expected);
        assert_eq!(invocation.cwd, Some(PathBuf::from("/tmp/build")));
    }
}
