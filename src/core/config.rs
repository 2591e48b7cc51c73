//! Configuration management

use clap::Parser;
use config::{Config as ConfigBuilder, ConfigError as BuilderError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid server configuration: {0}")]
    InvalidServer(String),

    #[error("Invalid extensions configuration: {0}")]
    InvalidExtensions(String),

    #[error("Invalid network configuration: {0}")]
    InvalidNetwork(String),

    #[error("Invalid logging configuration: {0}")]
    InvalidLogging(String),

    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

impl From<BuilderError> for ConfigError {
    fn from(err: BuilderError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub extensions: ExtensionsConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration with precedence: CLI args > Environment variables > Config file > Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let cli_args = CliArgs::parse();
        Self::load_with(&cli_args)
    }

    /// Load configuration using already parsed command-line arguments
    pub fn load_with(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let mut builder = with_defaults(ConfigBuilder::builder())?;

        if let Some(config_path) = &cli_args.config {
            if !config_path.exists() {
                return Err(ConfigError::FileNotFound(config_path.display().to_string()));
            }
            builder = builder.add_source(File::from(config_path.as_path()));
        }

        // Example: BRIDGE_NETWORK__REQUEST_TIMEOUT=10
        builder = builder.add_source(
            Environment::with_prefix("BRIDGE")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(host) = &cli_args.host {
            builder = builder.set_override("server.host", host.clone())?;
        }
        if let Some(port) = cli_args.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(dir) = &cli_args.packages_dir {
            builder = builder.set_override("extensions.packages_dir", dir.display().to_string())?;
        }
        if let Some(log_level) = &cli_args.log_level {
            builder = builder.set_override("logging.level", log_level.clone())?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let config: Config = with_defaults(ConfigBuilder::builder())?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults only
    pub fn defaults() -> Result<Self, ConfigError> {
        let config: Config = with_defaults(ConfigBuilder::builder())?
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.extensions.validate()?;
        self.network.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    let cache_root = dirs::cache_dir()
        .map(|dir| dir.join("extension-bridge"))
        .unwrap_or_else(|| PathBuf::from("./cache"));

    Ok(builder
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 4545)?
        .set_default("extensions.packages_dir", "./extensions")?
        .set_default(
            "extensions.icon_cache_dir",
            cache_root.join("icons").display().to_string(),
        )?
        .set_default("extensions.preference_dir", "./data/preferences")?
        .set_default("extensions.require_trusted_signatures", false)?
        .set_default("extensions.trusted_signatures", Vec::<String>::new())?
        .set_default("network.request_timeout", 30)?
        .set_default("network.user_agent", concat!("extension-bridge/", env!("CARGO_PKG_VERSION")))?
        .set_default("network.mirror_base", "https://gcore.jsdelivr.net/gh/")?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stdout")?)
}

/// Command-line arguments for configuration override
#[derive(Debug, Default, Parser)]
#[command(name = "extension-bridge")]
#[command(about = "Anime/manga extension bridge", long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (TOML format)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Server host address
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Directory holding installed extension packages
    #[arg(long, value_name = "DIR")]
    pub packages_dir: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::InvalidServer("host cannot be empty".to_string()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidServer("port must be greater than 0".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionsConfig {
    pub packages_dir: PathBuf,
    pub icon_cache_dir: PathBuf,
    pub preference_dir: PathBuf,
    pub require_trusted_signatures: bool,
    pub trusted_signatures: Vec<String>,
}

impl ExtensionsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.packages_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidExtensions("packages_dir cannot be empty".to_string()));
        }

        if self.icon_cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidExtensions("icon_cache_dir cannot be empty".to_string()));
        }

        if self.preference_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidExtensions("preference_dir cannot be empty".to_string()));
        }

        if self.trusted_signatures.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::InvalidExtensions(
                "trusted_signatures cannot contain empty entries".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub request_timeout: u64, // seconds, per attempt
    pub user_agent: String,
    pub mirror_base: String,
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout == 0 {
            return Err(ConfigError::InvalidNetwork("request_timeout must be greater than 0".to_string()));
        }

        if !self.mirror_base.starts_with("http://") && !self.mirror_base.starts_with("https://") {
            return Err(ConfigError::InvalidNetwork(
                "mirror_base must be an http(s) URL".to_string(),
            ));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
    pub log_file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "level must be one of: {:?}",
                valid_levels
            )));
        }

        let valid_formats = ["json", "text"];
        if !valid_formats.contains(&self.format.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "format must be one of: {:?}",
                valid_formats
            )));
        }

        let valid_outputs = ["stdout", "file"];
        if !valid_outputs.contains(&self.output.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "output must be one of: {:?}",
                valid_outputs
            )));
        }

        if self.output == "file" && self.log_file.is_none() {
            return Err(ConfigError::InvalidLogging(
                "log_file must be specified when output is 'file'".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::defaults().unwrap();
        assert_eq!(config.server.port, 4545);
        assert_eq!(config.network.timeout(), Duration::from_secs(30));
        assert_eq!(config.network.mirror_base, "https://gcore.jsdelivr.net/gh/");
        assert!(!config.extensions.require_trusted_signatures);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(
            &path,
            "[network]\nrequest_timeout = 5\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.network.request_timeout, 5);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_logging_validation() {
        let logging = LoggingConfig {
            level: "verbose".to_string(),
            format: "text".to_string(),
            output: "stdout".to_string(),
            log_file: None,
        };
        assert!(logging.validate().is_err());

        let logging = LoggingConfig {
            level: "info".to_string(),
            format: "text".to_string(),
            output: "file".to_string(),
            log_file: None,
        };
        assert!(logging.validate().is_err());
    }

    #[test]
    fn test_network_validation() {
        let network = NetworkConfig {
            request_timeout: 0,
            user_agent: "ua".to_string(),
            mirror_base: "https://cdn.example/gh/".to_string(),
        };
        assert!(network.validate().is_err());

        let network = NetworkConfig {
            request_timeout: 10,
            user_agent: "ua".to_string(),
            mirror_base: "cdn.example/gh/".to_string(),
        };
        assert!(network.validate().is_err());
    }
}
