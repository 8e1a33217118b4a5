use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ImportError;
use crate::profile::MADICES_PROFILE_PID;
use crate::resolver::AmbiguityPolicy;

pub const CONFIG_FILE: &str = "ro-import.json";
pub const DEFAULT_API_URL: &str = "https://datalab.concatlab.eu";
pub const DEFAULT_API_KEY_ENV: &str = "DATALAB_API_KEY";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub strict: Option<bool>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub profile: Option<String>,
    pub strict: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub api_url: String,
    pub api_key_env: String,
    pub profile: String,
    pub ambiguity: AmbiguityPolicy,
    pub timeout: Duration,
}

impl ResolvedConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, ImportError> {
        let config = match Self::locate(path) {
            Some(config_path) => {
                debug!(path = %config_path.display(), "loading config");
                let content = fs::read_to_string(&config_path)
                    .map_err(|_| ImportError::ConfigRead(config_path.clone()))?;
                serde_json::from_str(&content)
                    .map_err(|err| ImportError::ConfigParse(err.to_string()))?
            }
            None => Config::default(),
        };

        Ok(Self::resolve_config(config, overrides))
    }

    pub fn resolve_config(config: Config, overrides: ConfigOverrides) -> ResolvedConfig {
        let strict = overrides.strict || config.strict.unwrap_or(false);
        ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            api_url: overrides
                .api_url
                .or(config.api_url)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key_env: config
                .api_key_env
                .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
            profile: overrides
                .profile
                .or(config.profile)
                .unwrap_or_else(|| MADICES_PROFILE_PID.to_string()),
            ambiguity: if strict {
                AmbiguityPolicy::Error
            } else {
                AmbiguityPolicy::Warn
            },
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        }
    }

    // An explicit path is always returned so a missing file surfaces as ConfigRead.
    fn locate(path: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = path {
            return Some(PathBuf::from(path));
        }
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("eu", "datalab", "ro-import")
            .map(|dirs| dirs.config_dir().join("config.json"))
            .filter(|user| user.exists())
    }
}
