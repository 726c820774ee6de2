use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::error::ConfigError;

pub const USERNAME_ENV: &str = "ROADRUNNERS_USERNAME";
pub const PASSWORD_ENV: &str = "ROADRUNNERS_PASSWORD";

#[derive(Deserialize)]
struct StaticConfig {
    #[serde(default)]
    runners: BTreeMap<String, BTreeMap<String, serde_yaml::Value>>,
}

/// Per-runner settings, keyed by runner name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerConfigs {
    runners: BTreeMap<String, Settings>,
}

impl RunnerConfigs {
    pub fn new(runners: BTreeMap<String, Settings>) -> Self {
        Self { runners }
    }

    pub fn settings_for(&self, runner: &str) -> Result<&Settings, ConfigError> {
        self.runners
            .get(runner)
            .ok_or_else(|| ConfigError::UnknownRunner(runner.to_string()))
    }

    pub fn runner_names(&self) -> impl Iterator<Item = &str> {
        self.runners.keys().map(String::as_str)
    }
}

/// Loads a static YAML config file and fills in repository credentials from
/// the environment where a runner section does not carry them.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RunnerConfigs> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let static_conf: StaticConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let username = std::env::var(USERNAME_ENV).ok();
    let password = std::env::var(PASSWORD_ENV).ok();

    let mut runners = BTreeMap::new();
    for (runner, section) in static_conf.runners {
        let mut settings = Settings::new();
        for (key, value) in section {
            match scalar(&value) {
                Some(value) => settings.insert(&key, value),
                None => {
                    error!(runner = %runner, key = %key, "Setting must be a scalar value");
                    anyhow::bail!("runner '{runner}': setting '{key}' must be a scalar value");
                }
            }
        }

        if let (Some(username), Some(password)) = (&username, &password) {
            if !settings.contains("username") && !settings.contains("password") {
                info!(runner = %runner, "Injecting repository credentials from env");
                settings.insert("username", username.clone());
                settings.insert("password", password.clone());
            }
        }

        settings.trace_loaded(&runner);
        runners.insert(runner, settings);
    }

    if runners.is_empty() {
        warn!(config_path = ?path_ref, "Config file defines no runners");
    }

    Ok(RunnerConfigs::new(runners))
}

fn scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Null => Some(String::new()),
        _ => None,
    }
}
