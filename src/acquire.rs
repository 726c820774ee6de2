//! Zip acquisition from the content repository.
//!
//! `{base_uri}{content_path}/{package}/{version}/{kind}` is fetched with an
//! optional basic-auth pair, written verbatim into the working directory as
//! `{package}-{version}.{kind}.zip`, and optionally unpacked.

use std::path::{Path, PathBuf};

use reqwest::Client;
use tracing::{debug, error, info};

use crate::artifact::ZipKind;
use crate::config::Credentials;
use crate::error::{AcquireError, DownloadError};
use crate::limits::Limits;
use crate::unpack::spawn_unpack;

pub const DEFAULT_CONTENT_PATH: &str = "/content";

/// Identifies one zip in the repository.
#[derive(Debug, Clone, Copy)]
pub struct ZipRequest<'a> {
    pub package: &'a str,
    pub version: &'a str,
    pub base_uri: &'a str,
    pub kind: ZipKind,
}

/// What [`ZipAcquirer::get_zip`] staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquired {
    /// The archive was unpacked; `entry` is its single top-level name inside
    /// the working directory.
    Unpacked { entry: String, archive: PathBuf },
    /// The archive was only downloaded.
    Archive(PathBuf),
}

impl Acquired {
    pub fn archive(&self) -> &Path {
        match self {
            Acquired::Unpacked { archive, .. } => archive,
            Acquired::Archive(archive) => archive,
        }
    }
}

pub struct ZipAcquirer {
    client: Client,
    content_path: String,
    credentials: Option<Credentials>,
}

impl ZipAcquirer {
    pub fn new(content_path: &str, credentials: Option<Credentials>) -> Self {
        Self::with_client(Client::new(), content_path, credentials)
    }

    pub fn with_client(client: Client, content_path: &str, credentials: Option<Credentials>) -> Self {
        Self {
            client,
            content_path: normalise_content_path(content_path),
            credentials,
        }
    }

    /// `{base_uri}{content_path}/{package}/{version}/{endpoint}`
    pub fn content_url(&self, base_uri: &str, package: &str, version: &str, endpoint: &str) -> String {
        format!(
            "{}{}/{}/{}/{}",
            base_uri.trim_end_matches('/'),
            self.content_path,
            package,
            version,
            endpoint
        )
    }

    /// GET `url` and write the body to `dest`. Any status other than 200 is a
    /// [`DownloadError`].
    pub async fn download(&self, url: &str, dest: &Path, limits: &Limits) -> Result<PathBuf, AcquireError> {
        info!(url = %url, dest = %dest.display(), "Fetching from content repository");

        let fetch = async {
            let mut request = self.client.get(url);
            if let Some(creds) = &self.credentials {
                request = request.basic_auth(&creds.username, Some(&creds.password));
            }
            let transport = |source| AcquireError::Transport {
                url: url.to_string(),
                source,
            };
            let response = request.send().await.map_err(transport)?;
            let status = response.status();
            if status != reqwest::StatusCode::OK {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
                error!(url = %url, status = %status, "Content repository returned an error");
                return Err(AcquireError::Download(DownloadError {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body,
                }));
            }
            let body = response.bytes().await.map_err(transport)?;
            tokio::fs::write(dest, &body).await?;
            debug!(dest = %dest.display(), bytes = body.len(), "Wrote response body");
            Ok::<_, AcquireError>(dest.to_path_buf())
        };

        limits
            .run(fetch)
            .await
            .map_err(|source| AcquireError::Interrupted {
                url: url.to_string(),
                source,
            })?
    }

    /// Download a repository zip into `working_dir`. With `unpack`, the
    /// archive is extracted there too and must contain exactly one new
    /// top-level entry, which is returned.
    pub async fn get_zip(
        &self,
        zip: &ZipRequest<'_>,
        working_dir: &Path,
        unpack: bool,
        limits: &Limits,
    ) -> Result<Acquired, AcquireError> {
        let filename = zip.kind.filename(zip.package, zip.version);
        let url = self.content_url(zip.base_uri, zip.package, zip.version, zip.kind.as_str());
        let archive = self.download(&url, &working_dir.join(&filename), limits).await?;

        if !unpack {
            return Ok(Acquired::Archive(archive));
        }
        let entry = unpack_single(&archive, working_dir).await?;
        Ok(Acquired::Unpacked { entry, archive })
    }

    pub async fn get_completezip(
        &self,
        package: &str,
        version: &str,
        base_uri: &str,
        working_dir: &Path,
        unpack: bool,
        limits: &Limits,
    ) -> Result<Acquired, AcquireError> {
        let zip = ZipRequest {
            package,
            version,
            base_uri,
            kind: ZipKind::Complete,
        };
        self.get_zip(&zip, working_dir, unpack, limits).await
    }

    pub async fn get_offlinezip(
        &self,
        package: &str,
        version: &str,
        base_uri: &str,
        working_dir: &Path,
        unpack: bool,
        limits: &Limits,
    ) -> Result<Acquired, AcquireError> {
        let zip = ZipRequest {
            package,
            version,
            base_uri,
            kind: ZipKind::Offline,
        };
        self.get_zip(&zip, working_dir, unpack, limits).await
    }
}

/// Unpack `archive` into `dir` and insist on exactly one new top-level entry.
pub async fn unpack_single(archive: &Path, dir: &Path) -> Result<String, AcquireError> {
    let mut created = spawn_unpack(archive.to_path_buf(), dir.to_path_buf()).await?;
    if created.len() != 1 {
        return Err(AcquireError::UnexpectedArchiveLayout {
            archive: archive.to_path_buf(),
            entries: created,
        });
    }
    Ok(created.remove(0))
}

fn normalise_content_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
