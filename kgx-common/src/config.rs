//! Configuration loading for the KGX loaders
//!
//! Settings are resolved in priority order:
//! 1. Command-line arguments (applied by the binary)
//! 2. Environment variables (`KGX_CONFIG`, `KGX_NODE_NORM_URL`, `KGX_EDGE_NORM_URL`, `KGX_LOG_LEVEL`)
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error: the loader logs a warning and
//! starts with defaults. A TOML file that exists but does not parse is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "KGX_CONFIG";
/// Environment override for the node normalization endpoint
pub const NODE_NORM_URL_ENV_VAR: &str = "KGX_NODE_NORM_URL";
/// Environment override for the edge (predicate) normalization endpoint
pub const EDGE_NORM_URL_ENV_VAR: &str = "KGX_EDGE_NORM_URL";
/// Environment override for the log level
pub const LOG_LEVEL_ENV_VAR: &str = "KGX_LOG_LEVEL";

pub const DEFAULT_NODE_NORM_ENDPOINT: &str =
    "https://nodenormalization-sri.renci.org/get_normalized_nodes";
pub const DEFAULT_EDGE_NORM_ENDPOINT: &str =
    "https://edgenormalization-sri.renci.org/resolve_predicate";

/// Complete loader configuration as read from TOML
///
/// Every section is optional; missing sections take compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Normalization service and batching configuration
    #[serde(default)]
    pub normalization: NormalizationConfig,

    /// Output file configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// What to do with the ids of a chunk whose batch request failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Mark every id in the failed chunk unresolved for the rest of the run
    #[default]
    ChunkSacrifice,
    /// Look each id of the failed chunk up on its own before giving up on it
    PerIdRetry,
}

/// Bounded retry with exponential backoff around one batch request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one (minimum 1)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Ceiling on any single delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    /// Single attempt, no backoff
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    ///
    /// Doubles from `initial_backoff_ms`, capped at `max_backoff_ms`.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(32);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Normalization service and batching configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizationConfig {
    /// Node normalization endpoint (`?curie=..&curie=..`)
    #[serde(default = "default_node_endpoint")]
    pub node_endpoint: String,

    /// Predicate normalization endpoint (`?predicate=..&predicate=..`)
    #[serde(default = "default_edge_endpoint")]
    pub edge_endpoint: String,

    /// Identifiers per node normalization request
    #[serde(default = "default_chunk_size")]
    pub node_chunk_size: usize,

    /// Relations per predicate normalization request
    #[serde(default = "default_chunk_size")]
    pub edge_chunk_size: usize,

    /// Handling of ids in a failed chunk
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Chunks allowed in flight at once (1 = strictly sequential)
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,

    /// Per-attempt request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Minimum spacing between requests to one service (0 disables)
    #[serde(default)]
    pub min_request_interval_ms: u64,

    /// Retry policy for each batch request
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            node_endpoint: default_node_endpoint(),
            edge_endpoint: default_edge_endpoint(),
            node_chunk_size: default_chunk_size(),
            edge_chunk_size: default_chunk_size(),
            failure_policy: FailurePolicy::default(),
            max_concurrent_batches: default_max_concurrent_batches(),
            request_timeout_secs: default_request_timeout_secs(),
            min_request_interval_ms: 0,
            retry: RetryConfig::default(),
        }
    }
}

impl NormalizationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// KGX output flavour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Tab-separated rows with a header line
    #[default]
    Tsv,
    /// `{"nodes":[...]}` / `{"edges":[...]}` documents
    Json,
}

impl OutputMode {
    /// File extension for this mode
    pub fn extension(&self) -> &'static str {
        match self {
            OutputMode::Tsv => "tsv",
            OutputMode::Json => "json",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tsv" => Ok(OutputMode::Tsv),
            "json" => Ok(OutputMode::Json),
            other => Err(Error::InvalidInput(format!(
                "Unknown output mode '{}' (expected tsv or json)",
                other
            ))),
        }
    }
}

/// Output file configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Output flavour
    #[serde(default)]
    pub mode: OutputMode,

    /// Source records read per processing block
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Value for the edge `source_database` column (defaults to the input file stem)
    #[serde(default)]
    pub source_database: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::default(),
            block_size: default_block_size(),
            source_database: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_node_endpoint() -> String {
    DEFAULT_NODE_NORM_ENDPOINT.to_string()
}

fn default_edge_endpoint() -> String {
    DEFAULT_EDGE_NORM_ENDPOINT.to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_max_concurrent_batches() -> usize {
    1
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8000
}

fn default_block_size() -> usize {
    150_000
}

impl TomlConfig {
    /// Load configuration using the full resolution order
    ///
    /// `cli_path` wins over `KGX_CONFIG`, which wins over the per-user
    /// default location. Environment overrides are applied last.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(cli_path) {
            Some(path) => load_toml_config(&path)?,
            None => {
                info!("No configuration file found, using compiled defaults");
                TomlConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `KGX_*` environment overrides on top of file values
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_env(NODE_NORM_URL_ENV_VAR) {
            info!("Node normalization endpoint overridden by {}", NODE_NORM_URL_ENV_VAR);
            self.normalization.node_endpoint = url;
        }
        if let Some(url) = non_empty_env(EDGE_NORM_URL_ENV_VAR) {
            info!("Edge normalization endpoint overridden by {}", EDGE_NORM_URL_ENV_VAR);
            self.normalization.edge_endpoint = url;
        }
        if let Some(level) = non_empty_env(LOG_LEVEL_ENV_VAR) {
            self.logging.level = level;
        }
    }

    /// Reject values the loader cannot run with
    pub fn validate(&self) -> Result<()> {
        let n = &self.normalization;
        if n.node_chunk_size == 0 || n.edge_chunk_size == 0 {
            return Err(Error::Config("chunk sizes must be greater than zero".to_string()));
        }
        if n.max_concurrent_batches == 0 {
            return Err(Error::Config(
                "max_concurrent_batches must be at least 1".to_string(),
            ));
        }
        if n.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.output.block_size == 0 {
            return Err(Error::Config("output.block_size must be greater than zero".to_string()));
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Per-user default config file location (`<config_dir>/kgx/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("kgx").join("config.toml"))
}

/// Pick the config file to read
///
/// Explicit paths (CLI, then `KGX_CONFIG`) are returned even if they do not
/// exist so the loader can warn about them; the per-user default is only
/// returned when present.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Some(path) = non_empty_env(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    default_config_path().filter(|p| p.exists())
}

/// Read and parse a TOML config file
///
/// A missing file yields defaults with a warning.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            );
            return Ok(TomlConfig::default());
        }
        Err(e) => return Err(Error::Io(e)),
    };

    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write config to TOML atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryConfig {
            max_attempts: 6,
            initial_backoff_ms: 100,
            max_backoff_ms: 500,
        };
        assert_eq!(retry.backoff_after(1), Duration::from_millis(100));
        assert_eq!(retry.backoff_after(2), Duration::from_millis(200));
        assert_eq!(retry.backoff_after(3), Duration::from_millis(400));
        assert_eq!(retry.backoff_after(4), Duration::from_millis(500));
        assert_eq!(retry.backoff_after(40), Duration::from_millis(500));
    }

    #[test]
    fn test_output_mode_parse() {
        assert_eq!("json".parse::<OutputMode>().unwrap(), OutputMode::Json);
        assert_eq!(" TSV ".parse::<OutputMode>().unwrap(), OutputMode::Tsv);
        assert!("csv".parse::<OutputMode>().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let mut config = TomlConfig::default();
        config.normalization.node_chunk_size = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
