use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::acquire::DEFAULT_CONTENT_PATH;
use crate::error::ConfigError;

/// Raw runner options, `name -> value`, as found in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, String>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Value of `key`; empty strings count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn require(&self, runner: &str, key: &str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::Missing {
            runner: runner.to_string(),
            key: key.to_string(),
        })
    }

    fn path(&self, runner: &str, key: &str) -> Result<PathBuf, ConfigError> {
        self.require(runner, key).map(PathBuf::from)
    }

    fn optional_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(PathBuf::from)
    }

    fn content_path(&self) -> String {
        self.get_or("path-to-content", DEFAULT_CONTENT_PATH)
            .trim_end_matches('/')
            .to_string()
    }

    fn python(&self) -> PathBuf {
        self.optional_path("python").unwrap_or_else(host_python)
    }

    pub fn trace_loaded(&self, runner: &str) {
        info!(runner = runner, keys = ?self.0.keys().collect::<Vec<_>>(), "Loaded runner settings");
    }
}

/// Basic-auth pair for the content repository.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Both `username` and `password`, or neither.
    fn optional(settings: &Settings, runner: &str) -> Result<Option<Self>, ConfigError> {
        match (settings.get("username"), settings.get("password")) {
            (Some(username), Some(password)) => Ok(Some(Credentials {
                username: username.to_string(),
                password: password.to_string(),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::Invalid {
                runner: runner.to_string(),
                message: "'username' and 'password' must be set together".to_string(),
            }),
        }
    }

    fn required(settings: &Settings, runner: &str) -> Result<Self, ConfigError> {
        Ok(Credentials {
            username: settings.require(runner, "username")?.to_string(),
            password: settings.require(runner, "password")?.to_string(),
        })
    }
}

/// The interpreter used when `python` is not configured.
pub fn host_python() -> PathBuf {
    which::which("python3")
        .or_else(|_| which::which("python"))
        .unwrap_or_else(|_| {
            debug!("No python found on PATH, falling back to 'python3'");
            PathBuf::from("python3")
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletezipSettings {
    pub output_dir: PathBuf,
    pub credentials: Credentials,
    pub content_path: String,
}

impl CompletezipSettings {
    pub const RUNNER: &'static str = "completezip";

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            output_dir: settings.path(Self::RUNNER, "output-dir")?,
            credentials: Credentials::required(settings, Self::RUNNER)?,
            content_path: settings.content_path(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollxmlSettings {
    pub output_dir: PathBuf,
    pub credentials: Credentials,
    pub content_path: String,
}

impl CollxmlSettings {
    pub const RUNNER: &'static str = "collxml";

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            output_dir: settings.path(Self::RUNNER, "output-dir")?,
            credentials: Credentials::required(settings, Self::RUNNER)?,
            content_path: settings.content_path(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflinezipSettings {
    pub output_dir: PathBuf,
    pub oer_exports_dir: PathBuf,
    pub cnx_buildout_dir: PathBuf,
    /// Virtual environment exported to the build script's environment.
    pub python_env: Option<PathBuf>,
    pub credentials: Option<Credentials>,
    pub content_path: String,
}

impl OfflinezipSettings {
    pub const RUNNER: &'static str = "offlinezip";

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            output_dir: settings.path(Self::RUNNER, "output-dir")?,
            oer_exports_dir: settings.path(Self::RUNNER, "oer.exports-dir")?,
            cnx_buildout_dir: settings.path(Self::RUNNER, "cnx-buildout-dir")?,
            python_env: settings.optional_path("python-env"),
            credentials: Credentials::optional(settings, Self::RUNNER)?,
            content_path: settings.content_path(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpubSettings {
    pub output_dir: PathBuf,
    pub oer_exports_dir: PathBuf,
    pub python: PathBuf,
    pub credentials: Option<Credentials>,
    pub content_path: String,
}

impl EpubSettings {
    pub const RUNNER: &'static str = "epub";

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            output_dir: settings.path(Self::RUNNER, "output-dir")?,
            oer_exports_dir: settings.path(Self::RUNNER, "oer.exports-dir")?,
            python: settings.python(),
            credentials: Credentials::optional(settings, Self::RUNNER)?,
            content_path: settings.content_path(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfSettings {
    pub output_dir: PathBuf,
    pub oer_exports_dir: PathBuf,
    /// wkhtmltopdf or princexml.
    pub pdf_generator: PathBuf,
    pub python: PathBuf,
    pub xsltproc: PathBuf,
    pub credentials: Option<Credentials>,
    pub content_path: String,
}

impl PdfSettings {
    pub const RUNNER: &'static str = "pdf";

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            output_dir: settings.path(Self::RUNNER, "output-dir")?,
            oer_exports_dir: settings.path(Self::RUNNER, "oer.exports-dir")?,
            pdf_generator: settings.path(Self::RUNNER, "pdf-generator")?,
            python: settings.python(),
            xsltproc: PathBuf::from(settings.get_or("xsltproc", "xsltproc")),
            credentials: Credentials::optional(settings, Self::RUNNER)?,
            content_path: settings.content_path(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintSettings {
    pub output_dir: PathBuf,
    pub python: PathBuf,
    /// Maps to the makefile's `PRINT_DIR`; also the shared working tree.
    pub print_dir: Option<PathBuf>,
    pub make: PathBuf,
}

impl PrintSettings {
    pub const RUNNER: &'static str = "print";

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            output_dir: settings.path(Self::RUNNER, "output-dir")?,
            python: settings.python(),
            print_dir: settings.optional_path("print-dir"),
            make: PathBuf::from(settings.get_or("make", "make")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_output_dir_names_runner_and_key() {
        let err = EpubSettings::from_settings(&Settings::new().with("oer.exports-dir", "/opt/oer"))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing {
                runner: "epub".into(),
                key: "output-dir".into()
            }
        );
    }

    #[test]
    fn defaults_apply() {
        let settings = Settings::new()
            .with("output-dir", "/srv/out")
            .with("oer.exports-dir", "/opt/oer")
            .with("python", "/usr/bin/python2.7");
        let epub = EpubSettings::from_settings(&settings).unwrap();
        assert_eq!(epub.python, PathBuf::from("/usr/bin/python2.7"));
        assert_eq!(epub.content_path, "/content");
        assert!(epub.credentials.is_none());

        let print = PrintSettings::from_settings(&settings).unwrap();
        assert_eq!(print.make, PathBuf::from("make"));
        assert!(print.print_dir.is_none());
    }

    #[test]
    fn path_to_content_trailing_slash_is_stripped() {
        let settings = Settings::new()
            .with("output-dir", "/srv/out")
            .with("username", "admin")
            .with("password", "secret")
            .with("path-to-content", "/plone/content/");
        let completezip = CompletezipSettings::from_settings(&settings).unwrap();
        assert_eq!(completezip.content_path, "/plone/content");
        assert_eq!(completezip.credentials.username, "admin");
    }

    #[test]
    fn completezip_requires_credentials() {
        let settings = Settings::new().with("output-dir", "/srv/out");
        let err = CompletezipSettings::from_settings(&settings).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key, .. } if key == "username"));
    }

    #[test]
    fn half_a_credential_pair_is_invalid() {
        let settings = Settings::new()
            .with("output-dir", "/srv/out")
            .with("oer.exports-dir", "/opt/oer")
            .with("username", "admin");
        let err = EpubSettings::from_settings(&settings).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
