//! JSON job description, the default [`BuildRequest`] implementation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::contract::BuildRequest;

/// ```json
/// {"package": "col10642", "version": "1.2", "repository_uri": "http://cnx.org"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub package: String,
    pub version: String,
    pub repository_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_stamp: Option<DateTime<Utc>>,
}

impl JobRequest {
    pub fn new(package: &str, version: &str, repository_uri: &str) -> Self {
        Self {
            package: package.to_string(),
            version: version.to_string(),
            repository_uri: repository_uri.to_string(),
            build_stamp: None,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read build request {}", path.display()))?;
        let request: JobRequest = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse build request {}", path.display()))?;
        info!(package = %request.package, version = %request.version, "Loaded build request");
        Ok(request)
    }
}

impl BuildRequest for JobRequest {
    fn get_package(&self) -> String {
        self.package.clone()
    }

    fn get_version(&self) -> String {
        self.version.clone()
    }

    fn repository_uri(&self) -> String {
        self.repository_uri.clone()
    }

    fn stamp_request(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        self.build_stamp = Some(now);
        now
    }
}
