use crate::cli::Cli;
use crate::notes::NoteNumberGrammar;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub validation: ValidationConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Largest accepted request body in bytes
    pub max_body_bytes: usize,
    /// Directory served for every path that is not an API route (the browser editor)
    pub static_dir: Option<PathBuf>,
}

/// Where the document lives
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// The single stored document; backups are written next to it
    pub document_path: PathBuf,
}

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ValidationConfig {
    /// Fixed DTD every document is validated against instead of its own DOCTYPE
    pub dtd_path: Option<PathBuf>,
    /// Accepted lexicon for note `Number` attributes
    pub note_numbers: NoteNumberGrammar,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. "info" or "midnam_server=debug"
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_body_bytes: 10 * 1024 * 1024,
            static_dir: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            document_path: PathBuf::from("Alesis/D4.midnam"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Validation(format!("Invalid bind address: {e}")))
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(cli, &SystemEnvProvider).await
    }

    /// Same as [`ConfigManager::load_config`] with a custom environment provider
    pub async fn load_config_with(cli: &Cli, env: &impl EnvProvider) -> Result<Config> {
        let mut config = if let Some(config_path) = &cli.config {
            Self::load_from_file(config_path).await?
        } else if let Some(found_config) = Self::find_config_file().await? {
            found_config
        } else {
            Config::default()
        };

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    ///
    /// Sections and fields missing from the file keep their defaults.
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub async fn find_config_file() -> Result<Option<Config>> {
        let config_names = [
            "midnam-server.toml",
            "midnam-server.json",
            ".midnam-server.toml",
            ".midnam-server.json",
        ];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("midnam-server");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        // Server settings
        if let Some(host) = env.get("MIDNAM_HOST") {
            config.server.host = host;
        }

        if let Some(port) = env.get("MIDNAM_PORT") {
            config.server.port = port.parse().map_err(|_| {
                ConfigError::Environment(format!("Invalid MIDNAM_PORT value: {}", port))
            })?;
        }

        if let Some(max_body) = env.get("MIDNAM_MAX_BODY_BYTES") {
            config.server.max_body_bytes = max_body.parse().map_err(|_| {
                ConfigError::Environment(format!(
                    "Invalid MIDNAM_MAX_BODY_BYTES value: {}",
                    max_body
                ))
            })?;
        }

        if let Some(static_dir) = env.get("MIDNAM_STATIC_DIR") {
            config.server.static_dir = Some(PathBuf::from(static_dir));
        }

        // Storage settings
        if let Some(document_path) = env.get("MIDNAM_DOCUMENT_PATH") {
            config.storage.document_path = PathBuf::from(document_path);
        }

        // Validation settings
        if let Some(dtd_path) = env.get("MIDNAM_DTD_PATH") {
            config.validation.dtd_path = Some(PathBuf::from(dtd_path));
        }

        if let Some(grammar) = env.get("MIDNAM_NOTE_NUMBERS") {
            config.validation.note_numbers = grammar.parse().map_err(|_| {
                ConfigError::Environment(format!("Invalid MIDNAM_NOTE_NUMBERS value: {}", grammar))
            })?;
        }

        // Logging settings
        if let Some(level) = env.get("MIDNAM_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Some(format) = env.get("MIDNAM_LOG_FORMAT") {
            config.logging.format = match format.to_lowercase().as_str() {
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid MIDNAM_LOG_FORMAT value: {}",
                        format
                    )));
                }
            };
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration; only flags that were given override
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if let Some(host) = &cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(static_dir) = &cli.static_dir {
            config.server.static_dir = Some(static_dir.clone());
        }
        if let Some(document) = &cli.document {
            config.storage.document_path = document.clone();
        }
        if let Some(dtd) = &cli.dtd {
            config.validation.dtd_path = Some(dtd.clone());
        }
        if let Some(grammar) = cli.note_numbers {
            config.validation.note_numbers = grammar;
        }
        if let Some(level) = &cli.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = cli.log_format {
            config.logging.format = format;
        }

        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.server.port == 0 {
            return Err(ConfigError::Validation(
                "Port must be greater than 0".to_string(),
            ));
        }

        if config.server.max_body_bytes == 0 {
            return Err(ConfigError::Validation(
                "Maximum body size must be greater than 0".to_string(),
            ));
        }

        config.server.socket_addr()?;

        if config.storage.document_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "Document path must not be empty".to_string(),
            ));
        }

        if config.logging.level.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Log level must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
