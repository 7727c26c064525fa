//! Configuration resolution for cep-resolver
//!
//! **Priority:** CLI → ENV → TOML → built-in default
//!
//! The TOML file model lives in `cep_common::config`; this module layers
//! environment and command-line overrides on top and turns the result into
//! the typed settings the services consume.

use crate::adapters::KNOWN_SOURCE_IDS;
use crate::error::{ResolveError, ResolveResult};
use crate::services::BatchSettings;
use crate::types::PostalCode;
use cep_common::config::{load_toml_config, resolve_config_path, TomlConfig};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const ENV_LOG_LEVEL: &str = "CEP_LOG_LEVEL";
pub const ENV_TIMEOUT_MS: &str = "CEP_TIMEOUT_MS";
pub const ENV_CACHE_TTL_SECS: &str = "CEP_CACHE_TTL_SECS";
pub const ENV_BATCH_CHUNK_SIZE: &str = "CEP_BATCH_CHUNK_SIZE";
pub const ENV_BATCH_CONCURRENCY: &str = "CEP_BATCH_CONCURRENCY";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Values given on the command line (highest priority)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub log_level: Option<String>,
    pub timeout_ms: Option<u64>,
    pub chunk_size: Option<usize>,
    pub concurrency_limit: Option<usize>,
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub log_level: String,
    pub timeout: Duration,
    pub cache_ttl: Duration,
    pub probe_reference: PostalCode,
    pub refresh_health: bool,
    pub batch: BatchSettings,
    /// Source ids in priority order
    pub source_order: Vec<String>,
    pub base_urls: BTreeMap<String, String>,
}

impl ResolverConfig {
    /// Resolve every tier
    ///
    /// `config_path` is the `--config` argument, if any.
    pub fn resolve(config_path: Option<&Path>, cli: &CliOverrides) -> ResolveResult<Self> {
        let mut toml = load_file(config_path)?;
        apply_env_overrides(&mut toml);
        apply_cli_overrides(&mut toml, cli);
        Self::from_toml(&toml)
    }

    /// Validate a merged config and convert it
    pub fn from_toml(config: &TomlConfig) -> ResolveResult<Self> {
        config.validate()?;

        if let Some(unknown) = config
            .sources
            .order
            .iter()
            .find(|id| !KNOWN_SOURCE_IDS.contains(&id.as_str()))
        {
            return Err(config_error(format!(
                "sources.order: unknown source '{}' (known: {})",
                unknown,
                KNOWN_SOURCE_IDS.join(", ")
            )));
        }
        if let Some(unknown) = config
            .sources
            .base_urls
            .keys()
            .find(|id| !KNOWN_SOURCE_IDS.contains(&id.as_str()))
        {
            return Err(config_error(format!(
                "sources.base_urls: unknown source '{}'",
                unknown
            )));
        }

        let probe_reference = PostalCode::parse(&config.lookup.probe_reference)
            .map_err(|e| config_error(format!("lookup.probe_reference: {}", e)))?;

        Ok(Self {
            log_level: config.logging.level.clone(),
            timeout: Duration::from_millis(config.lookup.timeout_ms),
            cache_ttl: Duration::from_secs(config.lookup.cache_ttl_secs),
            probe_reference,
            refresh_health: config.lookup.refresh_health,
            batch: BatchSettings {
                chunk_size: config.batch.chunk_size,
                concurrency_limit: config.batch.concurrency_limit,
                throttle: Duration::from_millis(config.batch.throttle_ms),
                refresh_health: config.lookup.refresh_health,
            },
            source_order: config.sources.order.clone(),
            base_urls: config.sources.base_urls.clone(),
        })
    }
}

/// Load the TOML tier; defaults when no file is configured
///
/// An explicitly named file (CLI or `CEP_CONFIG`) must exist.
pub fn load_file(config_path: Option<&Path>) -> ResolveResult<TomlConfig> {
    match resolve_config_path(config_path) {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration file");
            Ok(load_toml_config(&path)?)
        }
        None => {
            debug!("No configuration file, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Apply `CEP_*` environment variables
pub fn apply_env_overrides(config: &mut TomlConfig) {
    apply_env_overrides_with(config, |key| std::env::var(key).ok());
}

/// Apply environment overrides from an arbitrary lookup
///
/// Unparseable values are logged and ignored.
pub fn apply_env_overrides_with<F>(config: &mut TomlConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(level) = lookup(ENV_LOG_LEVEL) {
        let level = level.trim().to_lowercase();
        if LOG_LEVELS.contains(&level.as_str()) {
            config.logging.level = level;
        } else {
            warn!(var = ENV_LOG_LEVEL, value = %level, "Ignoring unknown log level");
        }
    }

    override_parsed(&lookup, ENV_TIMEOUT_MS, &mut config.lookup.timeout_ms);
    override_parsed(&lookup, ENV_CACHE_TTL_SECS, &mut config.lookup.cache_ttl_secs);
    override_parsed(&lookup, ENV_BATCH_CHUNK_SIZE, &mut config.batch.chunk_size);
    override_parsed(&lookup, ENV_BATCH_CONCURRENCY, &mut config.batch.concurrency_limit);
}

/// Apply command-line values
pub fn apply_cli_overrides(config: &mut TomlConfig, cli: &CliOverrides) {
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.lookup.timeout_ms = timeout_ms;
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.batch.chunk_size = chunk_size;
    }
    if let Some(limit) = cli.concurrency_limit {
        config.batch.concurrency_limit = limit;
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => {
            debug!(var = key, "Environment override applied");
            *target = value;
        }
        Err(_) => warn!(var = key, value = %raw, "Ignoring unparseable environment value"),
    }
}

fn config_error(message: String) -> ResolveError {
    ResolveError::Common(cep_common::Error::Config(message))
}
