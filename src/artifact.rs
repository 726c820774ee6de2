//! Artifact naming conventions.
//!
//! Artifacts are named `{package}-{version}.{kind}.{ext}`, or
//! `{package}-{version}.{ext}` when they have no kind. The unpacked form of a
//! completezip is a directory named `{package}_{version}_complete`.

use std::fmt;

/// Symbolic version resolved from the acquired archive.
pub const LATEST: &str = "latest";

/// Zip flavours served by the content repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZipKind {
    Complete,
    Offline,
}

impl ZipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZipKind::Complete => "complete",
            ZipKind::Offline => "offline",
        }
    }

    /// `{package}-{version}.{kind}.zip`
    pub fn filename(&self, package: &str, version: &str) -> String {
        artifact_filename(package, version, Some(self.as_str()), "zip")
    }
}

impl fmt::Display for ZipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn artifact_filename(package: &str, version: &str, kind: Option<&str>, ext: &str) -> String {
    match kind {
        Some(kind) => format!("{package}-{version}.{kind}.{ext}"),
        None => format!("{package}-{version}.{ext}"),
    }
}

/// `{package}_{version}_complete`
pub fn unpacked_collection_dir(package: &str, version: &str) -> String {
    format!("{package}_{version}_complete")
}

pub fn is_latest(version: &str) -> bool {
    version == LATEST
}

/// Parse the version out of an unpacked directory name (`{id}_{version}_complete`).
pub fn version_from_unpacked(entry: &str) -> Option<&str> {
    entry.split('_').nth(1).filter(|v| !v.is_empty())
}

/// The version to put in output file names: the requested one, or for
/// `latest` the one parsed from the unpacked directory name.
pub fn resolve_version(requested: &str, unpacked_entry: &str) -> Option<String> {
    if is_latest(requested) {
        version_from_unpacked(unpacked_entry).map(str::to_string)
    } else {
        Some(requested.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names() {
        assert_eq!(ZipKind::Complete.filename("col10642", "1.2"), "col10642-1.2.complete.zip");
        assert_eq!(ZipKind::Offline.filename("col10642", "1.2"), "col10642-1.2.offline.zip");
        assert_eq!(artifact_filename("col10642", "1.2", None, "epub"), "col10642-1.2.epub");
        assert_eq!(unpacked_collection_dir("col10642", "1.2"), "col10642_1.2_complete");
    }

    #[test]
    fn latest_resolves_from_unpacked_directory() {
        assert_eq!(
            resolve_version("latest", "col10642_1.2_complete").as_deref(),
            Some("1.2")
        );
    }

    #[test]
    fn explicit_version_is_kept() {
        assert_eq!(
            resolve_version("1.3", "col10642_1.2_complete").as_deref(),
            Some("1.3")
        );
    }

    #[test]
    fn unparsable_entry_does_not_resolve() {
        assert_eq!(resolve_version("latest", "collection"), None);
        assert_eq!(resolve_version("latest", "col10642__complete"), None);
    }
}
