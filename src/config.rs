//! Configuration management for promptbox.
//!
//! Configuration can be set via environment variables:
//! - `MODEL_PROXY_URL` - Required. Base URL of the model-proxy service (e.g. `http://127.0.0.1:3000`).
//! - `WORKSPACE_PATH` - Optional. Directory the sandbox mounts projects into. Defaults to `./workspace`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8080`.
//! - `INSTALL_COMMAND` - Optional. Dependency install command. Defaults to `npm install`.
//! - `RUN_COMMAND` - Optional. Long-lived run command. Defaults to `npm run dev`.
//! - `MAX_RETRIES` - Optional. Rate-limit retry ceiling for model requests. Defaults to `3`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the model-proxy service
    pub proxy_url: String,

    /// Directory the sandbox mounts project trees into
    pub workspace_path: PathBuf,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Dependency install command (program + args)
    pub install_command: Vec<String>,

    /// Long-lived run command (program + args)
    pub run_command: Vec<String>,

    /// Rate-limit retry ceiling for model requests
    pub max_retries: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `MODEL_PROXY_URL` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let proxy_url = std::env::var("MODEL_PROXY_URL")
            .map_err(|_| ConfigError::MissingEnvVar("MODEL_PROXY_URL".to_string()))?;

        let workspace_path = std::env::var("WORKSPACE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./workspace"));

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let install_command = parse_command_var("INSTALL_COMMAND", "npm install")?;
        let run_command = parse_command_var("RUN_COMMAND", "npm run dev")?;

        let max_retries = std::env::var("MAX_RETRIES")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("MAX_RETRIES".to_string(), format!("{}", e)))?;

        Ok(Self {
            proxy_url,
            workspace_path,
            host,
            port,
            install_command,
            run_command,
            max_retries,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(proxy_url: String, workspace_path: PathBuf) -> Self {
        Self {
            proxy_url,
            workspace_path,
            host: "127.0.0.1".to_string(),
            port: 8080,
            install_command: vec!["npm".to_string(), "install".to_string()],
            run_command: vec!["npm".to_string(), "run".to_string(), "dev".to_string()],
            max_retries: 3,
        }
    }
}

/// Split a whitespace-separated command env var into program + args.
fn parse_command_var(name: &str, default: &str) -> Result<Vec<String>, ConfigError> {
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    let parts: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            "empty command".to_string(),
        ));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_commands_split_into_program_and_args() {
        let config = Config::new(
            "http://127.0.0.1:3000".to_string(),
            PathBuf::from("/tmp/ws"),
        );
        assert_eq!(config.install_command, vec!["npm", "install"]);
        assert_eq!(config.run_command, vec!["npm", "run", "dev"]);
    }
}
