//! Build lifecycle: `Starting -> Acquiring -> Converting -> Relocating -> Done`.
//!
//! [`run_build`] owns the parts every runner shares: stamping the request,
//! status reporting, the tracing span and settings validation. The runner
//! submodules only acquire, convert and relocate.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::acquire::{unpack_single, Acquired, ZipAcquirer};
use crate::artifact::{self, ZipKind};
use crate::config::{
    CollxmlSettings, CompletezipSettings, Credentials, EpubSettings, OfflinezipSettings,
    PdfSettings, PrintSettings, Settings,
};
use crate::contract::{BuildRequest, BuildState, CommandRunner, StatusReporter};
use crate::error::{AcquireError, BuildFailure, ConfigError, RunnerError, Stage};
use crate::limits::Limits;
use crate::staging::StagingDirectory;

pub mod collxml;
pub mod completezip;
pub mod epub;
pub mod offlinezip;
pub mod pdf;
pub mod print;

pub use collxml::make_collxml;
pub use completezip::make_completezip;
pub use epub::make_epub;
pub use offlinezip::make_offlinezip;
pub use pdf::make_pdf;
pub use print::make_print;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunnerKind {
    Completezip,
    Offlinezip,
    Epub,
    Pdf,
    Print,
    Collxml,
}

impl RunnerKind {
    pub const ALL: [RunnerKind; 6] = [
        RunnerKind::Completezip,
        RunnerKind::Offlinezip,
        RunnerKind::Epub,
        RunnerKind::Pdf,
        RunnerKind::Print,
        RunnerKind::Collxml,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerKind::Completezip => CompletezipSettings::RUNNER,
            RunnerKind::Offlinezip => OfflinezipSettings::RUNNER,
            RunnerKind::Epub => EpubSettings::RUNNER,
            RunnerKind::Pdf => PdfSettings::RUNNER,
            RunnerKind::Print => PrintSettings::RUNNER,
            RunnerKind::Collxml => CollxmlSettings::RUNNER,
        }
    }
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunnerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RunnerKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = RunnerKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown runner '{s}', expected one of: {}", known.join(", "))
            })
    }
}

/// Collaborators for one build.
pub struct RunContext<'a> {
    pub reporter: &'a dyn StatusReporter,
    pub commands: &'a dyn CommandRunner,
    pub limits: Limits,
}

impl RunContext<'_> {
    pub(crate) fn progress(&self, message: &str) {
        self.reporter.set_status(BuildState::Building, message);
    }
}

/// The request fields a runner reads, captured once at the start of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub package: String,
    pub version: String,
    /// Repository base URI without a trailing slash.
    pub repository_uri: String,
}

impl Job {
    pub fn from_request(request: &dyn BuildRequest) -> Self {
        Self {
            package: request.get_package(),
            version: request.get_version(),
            repository_uri: request.repository_uri().trim_end_matches('/').to_string(),
        }
    }
}

/// Run one build of `kind` end to end and report its outcome through
/// `ctx.reporter`. Returns the absolute paths of the relocated artifacts.
pub async fn run_build(
    kind: RunnerKind,
    request: &mut dyn BuildRequest,
    settings: &Settings,
    ctx: &RunContext<'_>,
) -> Result<Vec<PathBuf>, RunnerError> {
    let job = Job::from_request(request);
    let span = info_span!(
        "build",
        runner = kind.as_str(),
        package = %job.package,
        version = %job.version,
        run_id = %Uuid::new_v4()
    );

    async move {
        let stamp = request.stamp_request();
        ctx.progress(&format!("Starting job, timestamp: {}", stamp.to_rfc3339()));

        let result = dispatch(kind, &job, settings, ctx).await;
        match &result {
            Ok(artifacts) => {
                let listed: Vec<String> =
                    artifacts.iter().map(|p| p.display().to_string()).collect();
                ctx.reporter
                    .set_status(BuildState::Done, &format!("Produced: {}", listed.join(", ")));
            }
            Err(err) if err.is_blocked() => {
                ctx.reporter.set_status(BuildState::Blocked, &error_text(err));
            }
            Err(err) => {
                ctx.reporter.set_status(BuildState::Failed, &error_text(err));
            }
        }
        result
    }
    .instrument(span)
    .await
}

async fn dispatch(
    kind: RunnerKind,
    job: &Job,
    settings: &Settings,
    ctx: &RunContext<'_>,
) -> Result<Vec<PathBuf>, RunnerError> {
    let invalid = |e: ConfigError| RunnerError::failed(Stage::Starting, e);
    match kind {
        RunnerKind::Completezip => {
            let settings = CompletezipSettings::from_settings(settings).map_err(invalid)?;
            make_completezip(job, &settings, ctx).await
        }
        RunnerKind::Offlinezip => {
            let settings = OfflinezipSettings::from_settings(settings).map_err(invalid)?;
            make_offlinezip(job, &settings, ctx).await
        }
        RunnerKind::Epub => {
            let settings = EpubSettings::from_settings(settings).map_err(invalid)?;
            make_epub(job, &settings, ctx).await
        }
        RunnerKind::Pdf => {
            let settings = PdfSettings::from_settings(settings).map_err(invalid)?;
            make_pdf(job, &settings, ctx).await
        }
        RunnerKind::Print => {
            let settings = PrintSettings::from_settings(settings).map_err(invalid)?;
            make_print(job, &settings, ctx).await
        }
        RunnerKind::Collxml => {
            let settings = CollxmlSettings::from_settings(settings).map_err(invalid)?;
            make_collxml(job, &settings, ctx).await
        }
    }
}

/// Status message for an unsuccessful build.
fn error_text(err: &RunnerError) -> String {
    match err {
        RunnerError::Blocked { reason, source } => format!("{reason}: {source}"),
        RunnerError::Failed { .. } => err.to_string(),
    }
}

pub(crate) fn new_staging() -> Result<StagingDirectory, RunnerError> {
    StagingDirectory::new().map_err(|e| RunnerError::failed(Stage::Starting, e))
}

pub(crate) fn acquirer(content_path: &str, credentials: Option<&Credentials>) -> ZipAcquirer {
    ZipAcquirer::new(content_path, credentials.cloned())
}

/// The top-level entry of an acquired zip, unpacking it into `dir` first if
/// it was only downloaded.
pub(crate) async fn unpacked_entry(acquired: Acquired, dir: &Path) -> Result<String, RunnerError> {
    match acquired {
        Acquired::Unpacked { entry, .. } => Ok(entry),
        Acquired::Archive(archive) => unpack_single(&archive, dir)
            .await
            .map_err(|e| RunnerError::failed(Stage::Acquiring, e)),
    }
}

/// Resolve `latest` by unpacking `archive` into a scratch directory and
/// reading the version from its single top-level entry.
pub(crate) async fn resolve_from_archive(
    archive: &Path,
    staging: &StagingDirectory,
    job: &Job,
) -> Result<String, RunnerError> {
    if !artifact::is_latest(&job.version) {
        return Ok(job.version.clone());
    }
    let scratch = staging
        .subdir(".resolve")
        .map_err(|e| RunnerError::failed(Stage::Acquiring, e))?;
    let entry = unpack_single(archive, &scratch)
        .await
        .map_err(|e| RunnerError::failed(Stage::Acquiring, e))?;
    resolve_from_entry(job, &entry)
}

/// The version to name outputs with, given the unpacked top-level entry.
pub(crate) fn resolve_from_entry(job: &Job, entry: &str) -> Result<String, RunnerError> {
    let version = artifact::resolve_version(&job.version, entry).ok_or_else(|| {
        RunnerError::failed(
            Stage::Acquiring,
            BuildFailure::UnresolvableVersion(entry.to_string()),
        )
    })?;
    if version != job.version {
        info!(requested = %job.version, resolved = %version, "Resolved version from archive");
    }
    Ok(version)
}

/// Rename a staged zip that was fetched under the requested version to its
/// resolved name. A no-op when the two agree.
pub(crate) fn rename_staged_zip(
    staged: PathBuf,
    kind: ZipKind,
    job: &Job,
    version: &str,
) -> Result<PathBuf, RunnerError> {
    let target = staged.with_file_name(kind.filename(&job.package, version));
    if target == staged {
        return Ok(staged);
    }
    fs::rename(&staged, &target).map_err(|e| RunnerError::failed(Stage::Acquiring, e))?;
    Ok(target)
}

/// Map an acquisition failure of an input produced by another job.
pub(crate) fn input_unavailable(err: AcquireError, kind: ZipKind) -> RunnerError {
    let reason = format!("the {kind} zip does not exist yet");
    RunnerError::from_acquire(err, true, &reason)
}
