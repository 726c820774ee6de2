//! Archive unpacking with new-entry discovery.
//!
//! The unpacked top-level name of a repository zip does not have to match
//! the zip's file name, so it is discovered by diffing the directory listing
//! before and after extraction. Existing files are never overwritten.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::ExtractionError;

fn listing(dir: &Path) -> io::Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for entry in fs::read_dir(dir)? {
        names.insert(entry?.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Extract `archive` into `working_dir` and return the names of the entries
/// of `working_dir` that did not exist before, sorted.
///
/// Relative archive paths are resolved against `working_dir`.
pub fn unpack_zip(archive: &Path, working_dir: &Path) -> Result<Vec<String>, ExtractionError> {
    let archive = if archive.is_relative() {
        working_dir.join(archive)
    } else {
        archive.to_path_buf()
    };
    let fail = |message: String| ExtractionError {
        archive: archive.clone(),
        message,
    };

    let before = listing(working_dir)
        .map_err(|e| fail(format!("cannot list {}: {e}", working_dir.display())))?;

    let file = File::open(&archive).map_err(|e| fail(format!("cannot open archive: {e}")))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| fail(format!("not a zip archive: {e}")))?;
    debug!(archive = %archive.display(), entries = zip.len(), dir = %working_dir.display(), "Unpacking archive");

    let mut skipped = 0usize;
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| fail(format!("cannot read entry #{index}: {e}")))?;
        let relative = match entry.enclosed_name() {
            Some(path) => path.to_path_buf(),
            None => {
                warn!(name = entry.name(), "Skipping archive entry with unsafe path");
                continue;
            }
        };
        let target = working_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| fail(format!("cannot create {}: {e}", target.display())))?;
            continue;
        }
        if target.exists() {
            skipped += 1;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| fail(format!("cannot create {}: {e}", parent.display())))?;
        }
        let mut out = File::create(&target)
            .map_err(|e| fail(format!("cannot create {}: {e}", target.display())))?;
        io::copy(&mut entry, &mut out)
            .map_err(|e| fail(format!("cannot write {}: {e}", target.display())))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode))
                .map_err(|e| fail(format!("cannot set mode on {}: {e}", target.display())))?;
        }
    }

    let after = listing(working_dir)
        .map_err(|e| fail(format!("cannot list {}: {e}", working_dir.display())))?;
    let created: Vec<String> = after.difference(&before).cloned().collect();

    info!(
        archive = %archive.display(),
        created = ?created,
        kept_existing = skipped,
        "Unpacked archive"
    );
    Ok(created)
}

/// [`unpack_zip`] on the blocking thread pool.
pub async fn spawn_unpack(
    archive: PathBuf,
    working_dir: PathBuf,
) -> Result<Vec<String>, ExtractionError> {
    let archive_for_error = archive.clone();
    tokio::task::spawn_blocking(move || unpack_zip(&archive, &working_dir))
        .await
        .map_err(|e| ExtractionError {
            archive: archive_for_error,
            message: format!("extraction task failed: {e}"),
        })?
}
