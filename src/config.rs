// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates values and provides defaults so the server runs with no config at all

use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use teamsim_core::EnvironmentConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origin for browser clients; "*" allows any
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to a daily-rolling file in the data directory
    #[serde(default)]
    pub file: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. TEAMSIM_CONFIG_PATH env var (if set and the file exists)
    /// 2. ./config.toml (current directory - for development)
    /// 3. ~/.config/teamsim/config.toml (XDG config dir)
    ///
    /// Runs before logging is up, so it reports nothing itself.
    pub fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("TEAMSIM_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration from config.toml with environment variable overrides
    pub fn load() -> Result<Self> {
        Self::load_from(Self::find_config_file().as_deref())
    }

    /// Load from `path` (defaults when `None`), then apply env overrides and validate
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(config_path) => Self::from_file(config_path)?,
            None => Config::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str::<Config>(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("SERVER_HOST") {
            self.server.host = val;
        }
        // PORT is honored for container platforms that inject it
        for var in ["PORT", "SERVER_PORT"] {
            if let Ok(val) = std::env::var(var) {
                self.server.port = val
                    .parse()
                    .with_context(|| format!("{} must be a valid port number, got: {}", var, val))?;
            }
        }
        if let Ok(val) = std::env::var("CORS_ORIGIN") {
            self.server.cors_origin = val;
        }
        if let Ok(val) = std::env::var("ENV_MAX_STEPS") {
            self.environment.max_steps = val
                .parse()
                .with_context(|| format!("ENV_MAX_STEPS must be a valid number, got: {}", val))?;
        }
        if let Ok(val) = std::env::var("LOG_TO_FILE") {
            self.logging.file = matches!(val.trim(), "1" | "true" | "yes" | "on");
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            anyhow::bail!("server.host must not be empty (set in config.toml or SERVER_HOST)");
        }
        if self.server.cors_origin.trim().is_empty() {
            anyhow::bail!("server.cors_origin must not be empty (use \"*\" to allow any origin)");
        }
        if self.environment.max_steps == 0 {
            anyhow::bail!("environment.max_steps must be at least 1");
        }
        Ok(())
    }
}
