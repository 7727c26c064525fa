//! Configuration file model and loading
//!
//! The TOML file is optional: every section and every key has a built-in
//! default, so a missing file or a partial file is valid.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! This module owns tiers 3 and 4. Tiers 1 and 2 are applied by the
//! consuming crate on top of the loaded `TomlConfig`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "CEP_CONFIG";

/// Application directory name under the platform config dir
const APP_DIR: &str = "cep-resolver";

/// Root of the TOML configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Single-lookup, cache and health settings
    pub lookup: LookupConfig,

    /// Batch processing settings
    pub batch: BatchConfig,

    /// Source ordering and endpoint overrides
    pub sources: SourcesConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Lookup configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Timeout for each adapter call and each health probe
    pub timeout_ms: u64,

    /// Result cache time-to-live
    pub cache_ttl_secs: u64,

    /// Known-valid postal code used by health probes
    pub probe_reference: String,

    /// Probe every source before each top-level request
    pub refresh_health: bool,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            cache_ttl_secs: 300,
            probe_reference: "01001000".to_string(),
            refresh_health: true,
        }
    }
}

/// Batch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Items per chunk; chunks run strictly one after another
    pub chunk_size: usize,

    /// Maximum in-flight lookups within a chunk
    pub concurrency_limit: usize,

    /// Pause between chunks
    pub throttle_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5,
            concurrency_limit: 5,
            throttle_ms: 200,
        }
    }
}

/// Source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Source ids in priority order
    pub order: Vec<String>,

    /// Base URL overrides keyed by source id
    pub base_urls: BTreeMap<String, String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            order: ["brasilapi", "awesomeapi", "viacep", "apicep", "widenet"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            base_urls: BTreeMap::new(),
        }
    }
}

impl TomlConfig {
    /// Check value ranges that do not depend on the set of known sources
    pub fn validate(&self) -> Result<()> {
        if self.lookup.timeout_ms == 0 {
            return Err(Error::Config("lookup.timeout_ms must be greater than 0".to_string()));
        }
        if self.batch.chunk_size == 0 {
            return Err(Error::Config("batch.chunk_size must be greater than 0".to_string()));
        }
        if self.batch.concurrency_limit == 0 {
            return Err(Error::Config(
                "batch.concurrency_limit must be greater than 0".to_string(),
            ));
        }
        let digits = self
            .lookup
            .probe_reference
            .chars()
            .filter(|c| c.is_ascii_digit())
            .count();
        if digits != 8 {
            return Err(Error::Config(format!(
                "lookup.probe_reference must contain 8 digits, got '{}'",
                self.lookup.probe_reference
            )));
        }
        if self.sources.order.is_empty() {
            return Err(Error::Config("sources.order must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Platform default config file path (`<config dir>/cep-resolver/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Resolve which config file to read
///
/// Priority: explicit path → `CEP_CONFIG` → platform default (only if it exists).
/// An explicit path or env path is returned even if missing so that the
/// caller can report it.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|p| p.exists())
}

/// Load a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    debug!(path = %path.display(), "Loaded TOML config");
    Ok(config)
}

/// Write a TOML config file atomically (temp file + rename)
///
/// Parent directories are created as needed.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;

    info!(path = %path.display(), "Config written");
    Ok(())
}
