//! Per-build scratch space.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::BuildFailure;

/// A fresh directory for one build, removed when dropped on every exit path.
#[derive(Debug)]
pub struct StagingDirectory {
    dir: TempDir,
}

impl StagingDirectory {
    pub fn new() -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("roadrunners-").tempdir()?;
        debug!(staging = %dir.path().display(), "Created staging directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.dir.path().join(path)
    }

    /// A fresh subdirectory, for unpacking into an empty listing.
    pub fn subdir(&self, name: &str) -> std::io::Result<PathBuf> {
        let path = self.join(name);
        fs::create_dir_all(&path)?;
        Ok(path)
    }
}

/// Copy each produced file into `output_dir` under its own file name and
/// return the absolute destination paths, in input order.
pub fn relocate(files: &[PathBuf], output_dir: &Path) -> Result<Vec<PathBuf>, BuildFailure> {
    fs::create_dir_all(output_dir)?;
    let output_dir = std::path::absolute(output_dir)?;

    let mut relocated = Vec::with_capacity(files.len());
    for file in files {
        if !file.is_file() {
            return Err(BuildFailure::MissingOutput(file.clone()));
        }
        let name = file
            .file_name()
            .ok_or_else(|| BuildFailure::MissingOutput(file.clone()))?;
        let dest = output_dir.join(name);
        fs::copy(file, &dest)?;
        info!(from = %file.display(), to = %dest.display(), "Relocated artifact");
        relocated.push(dest);
    }
    Ok(relocated)
}
