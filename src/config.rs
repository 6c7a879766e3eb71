use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PublishError, Result};

/// Directory name of the CLI home under the user's home directory
pub const DEFAULT_CLI_HOME: &str = ".cloud-publish";

/// Represents the complete configuration for cloud-publish.
///
/// Passed explicitly into the workflow; nothing reads process-wide state after
/// loading.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// CLI home holding the per-user cache. Defaults to `~/.cloud-publish`.
    #[serde(default)]
    pub home: Option<PathBuf>,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub gitlab: GitlabConfig,
}

fn default_build_server() -> String {
    "ws://localhost:7001".to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_task_timeout() -> u64 {
    5 * 60
}

/// Remote build service settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BuildConfig {
    #[serde(default = "default_build_server")]
    pub server_url: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,

    /// Turn a failure action reported before disconnect into an error
    #[serde(default)]
    pub fail_on_terminal_action: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            server_url: default_build_server(),
            connect_timeout_secs: default_connect_timeout(),
            task_timeout_secs: default_task_timeout(),
            fail_on_terminal_action: false,
        }
    }
}

impl BuildConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

fn default_component_api() -> String {
    "http://localhost:7001".to_string()
}

fn default_npm_registry() -> String {
    "https://registry.npmjs.org".to_string()
}

/// Component registry and npm registry endpoints
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RegistryConfig {
    #[serde(default = "default_component_api")]
    pub component_api: String,

    #[serde(default = "default_npm_registry")]
    pub npm_registry: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            component_api: default_component_api(),
            npm_registry: default_npm_registry(),
        }
    }
}

fn default_gitlab_api() -> String {
    "https://gitlab.com/api/v4".to_string()
}

fn default_gitlab_host() -> String {
    "gitlab.com".to_string()
}

/// Self-hosted Gitlab endpoints
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GitlabConfig {
    #[serde(default = "default_gitlab_api")]
    pub api_url: String,

    #[serde(default = "default_gitlab_host")]
    pub host: String,
}

impl Default for GitlabConfig {
    fn default() -> Self {
        GitlabConfig {
            api_url: default_gitlab_api(),
            host: default_gitlab_host(),
        }
    }
}

impl Config {
    /// Resolve the CLI home directory.
    ///
    /// Uses the configured `home` when present, otherwise `~/.cloud-publish`.
    pub fn cli_home(&self) -> Result<PathBuf> {
        if let Some(home) = &self.home {
            return Ok(home.clone());
        }
        dirs::home_dir()
            .map(|home| home.join(DEFAULT_CLI_HOME))
            .ok_or_else(|| PublishError::config("cannot determine user home directory"))
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `cloudpublish.toml` in current directory
/// 3. `.cloudpublish.toml` in the user config directory
/// 4. Default configuration if no file found
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config_str = if let Some(path) = config_path {
        fs::read_to_string(path)?
    } else if Path::new("./cloudpublish.toml").exists() {
        fs::read_to_string("./cloudpublish.toml")?
    } else if let Some(config_dir) = dirs::config_dir() {
        let config_path = config_dir.join(".cloudpublish.toml");
        if config_path.exists() {
            fs::read_to_string(config_path)?
        } else {
            return Ok(Config::default());
        }
    } else {
        return Ok(Config::default());
    };

    toml::from_str(&config_str).map_err(|e| PublishError::config(e.to_string()))
}
