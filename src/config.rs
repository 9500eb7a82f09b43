//! Configuration module for the rememberlist server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Smallest listen backlog the server will request.
pub const MIN_BACKLOG: i32 = 5;

/// How received bytes are cut into messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// Every read call is one message.
    #[default]
    Read,
    /// Messages are `\n`-terminated lines, reassembled across reads.
    Line,
}

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(name = "rememberlist-server")]
#[command(version = "0.1.0")]
#[command(about = "Serves list and value queries from flat files", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:8889)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Listen backlog
    #[arg(long)]
    pub backlog: Option<i32>,

    /// Number of runtime worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Seconds a connection may stay idle before it is closed
    #[arg(long)]
    pub read_timeout: Option<u64>,

    /// Maximum bytes taken from the socket per read
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Message framing
    #[arg(long, value_enum)]
    pub framing: Option<Framing>,

    /// Path of the lists data file
    #[arg(long)]
    pub lists: Option<PathBuf>,

    /// Path of the `#`-separated values data file
    #[arg(long)]
    pub values: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Listen backlog
    #[serde(default = "default_backlog")]
    pub backlog: i32,
    /// Number of runtime worker threads
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            backlog: default_backlog(),
            workers: None,
        }
    }
}

/// Per-connection configuration
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    /// Idle read timeout in seconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,
    /// Read buffer size in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default)]
    pub framing: Framing,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_timeout: default_read_timeout(),
            buffer_size: default_buffer_size(),
            framing: Framing::default(),
        }
    }
}

/// Locations of the data files
#[derive(Debug, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_lists_path")]
    pub lists: PathBuf,
    #[serde(default = "default_values_path")]
    pub values: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            lists: default_lists_path(),
            values: default_values_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8889".to_string()
}

fn default_backlog() -> i32 {
    MIN_BACKLOG
}

fn default_read_timeout() -> u64 {
    60
}

fn default_buffer_size() -> usize {
    1024
}

fn default_lists_path() -> PathBuf {
    PathBuf::from("lists.txt")
}

fn default_values_path() -> PathBuf {
    PathBuf::from("values.txt")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub backlog: i32,
    pub workers: Option<usize>,
    pub read_timeout: Duration,
    pub buffer_size: usize,
    pub framing: Framing,
    pub lists_path: PathBuf,
    pub values_path: PathBuf,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args over TOML config.
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let buffer_size = cli
            .buffer_size
            .unwrap_or(toml_config.connection.buffer_size);
        if buffer_size == 0 {
            return Err(ConfigError::Invalid("buffer_size must be non-zero".into()));
        }

        let read_timeout = cli
            .read_timeout
            .unwrap_or(toml_config.connection.read_timeout);
        if read_timeout == 0 {
            return Err(ConfigError::Invalid("read_timeout must be non-zero".into()));
        }

        Ok(Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            backlog: cli
                .backlog
                .unwrap_or(toml_config.server.backlog)
                .max(MIN_BACKLOG),
            workers: cli.workers.or(toml_config.server.workers),
            read_timeout: Duration::from_secs(read_timeout),
            buffer_size,
            framing: cli.framing.unwrap_or(toml_config.connection.framing),
            lists_path: cli.lists.unwrap_or(toml_config.data.lists),
            values_path: cli.values.unwrap_or(toml_config.data.values),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        let defaults = TomlConfig::default();
        Config {
            listen: defaults.server.listen,
            backlog: defaults.server.backlog,
            workers: defaults.server.workers,
            read_timeout: Duration::from_secs(defaults.connection.read_timeout),
            buffer_size: defaults.connection.buffer_size,
            framing: defaults.connection.framing,
            lists_path: defaults.data.lists,
            values_path: defaults.data.values,
            log_level: defaults.logging.level,
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
