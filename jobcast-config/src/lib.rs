use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Pre-compiled regex for hostname validation (compiled once at first use)
static HOSTNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][-a-zA-Z0-9\.]*[a-zA-Z0-9]$").unwrap());

/// Capability names are lowercase snake_case identifiers such as `manage_jobs`.
static CAPABILITY_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap());

/// Configuration file as written on disk. Every key is optional; missing
/// keys keep their defaults and unknown keys are rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfigFile {
    pub server: Option<ServerSection>,
    pub logging: Option<LoggingSection>,
    pub database: Option<DatabaseSection>,
    pub jobs: Option<JobsSection>,
    pub cluster: Option<ClusterSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub json: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSection {
    pub url: Option<String>,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobsSection {
    pub retention_days: Option<u32>,
    pub sweep_interval_minutes: Option<u64>,
    pub default_page_size: Option<usize>,
    pub max_page_size: Option<usize>,
    pub delivery_capabilities: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterSection {
    pub worker_id: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

/// Parse configuration from a string with optional format hint
#[inline]
fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

/// Try to parse config by attempting each enabled format
#[inline]
fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    // YAML last: almost any scalar text is valid YAML.
    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse config as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        let _ = s;
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Concrete service configuration with defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub jobs: JobsConfig,
    pub cluster: ClusterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Longest accepted retention sweep interval: one week.
pub const MAX_SWEEP_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobsConfig {
    /// Terminal jobs older than this many days are removed by the retention sweep.
    pub retention_days: u32,
    /// How often the background retention sweep runs.
    pub sweep_interval_minutes: u64,
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Observers holding any of these capabilities receive job updates.
    pub delivery_capabilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterConfig {
    pub worker_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 6100,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            database: DatabaseConfig {
                url: "sqlite://jobcast.sqlite".to_string(),
                max_connections: 10,
            },
            jobs: JobsConfig {
                retention_days: 30,
                sweep_interval_minutes: 60,
                default_page_size: 20,
                max_page_size: 100,
                delivery_capabilities: vec!["manage_jobs".to_string(), "read_job".to_string()],
            },
            cluster: ClusterConfig {
                worker_id: "worker-0".to_string(),
            },
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[inline]
fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = path {
        let raw = load_raw_from_file(p)?;
        apply_raw(&mut cfg, raw);
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw(cfg: &mut Config, raw: RawConfigFile) {
    if let Some(server) = raw.server {
        apply_opt!(cfg.server.host, server.host);
        apply_opt!(cfg.server.port, server.port);
    }
    if let Some(logging) = raw.logging {
        apply_opt!(cfg.logging.level, logging.level);
        apply_opt!(cfg.logging.json, logging.json);
    }
    if let Some(db) = raw.database {
        apply_opt!(cfg.database.url, db.url);
        apply_opt!(cfg.database.max_connections, db.max_connections);
    }
    if let Some(jobs) = raw.jobs {
        apply_opt!(cfg.jobs.retention_days, jobs.retention_days);
        apply_opt!(cfg.jobs.sweep_interval_minutes, jobs.sweep_interval_minutes);
        apply_opt!(cfg.jobs.default_page_size, jobs.default_page_size);
        apply_opt!(cfg.jobs.max_page_size, jobs.max_page_size);
        apply_opt!(cfg.jobs.delivery_capabilities, jobs.delivery_capabilities);
    }
    if let Some(cluster) = raw.cluster {
        apply_opt!(cfg.cluster.worker_id, cluster.worker_id);
    }
}

/// Helper to parse env var as a specific type
#[inline]
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Helper to parse env var as bool
#[inline]
fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(v) => parse_bool(&v)
            .map(Some)
            .ok_or_else(|| ConfigError::Parse(format!("invalid {key}: expected a boolean"))),
        Err(_) => Ok(None),
    }
}

#[inline]
fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Apply all environment variable overrides to config
fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    // Server
    if let Some(v) = env_str("JOBCAST_SERVER_HOST") {
        cfg.server.host = v;
    }
    if let Some(v) = env_parse::<u16>("JOBCAST_SERVER_PORT")? {
        cfg.server.port = v;
    }

    // Logging
    if let Some(v) = env_str("JOBCAST_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = env_bool("JOBCAST_LOG_JSON")? {
        cfg.logging.json = v;
    }

    // Database
    if let Some(v) = env_str("JOBCAST_DATABASE_URL") {
        cfg.database.url = v;
    }
    if let Some(v) = env_parse::<u32>("JOBCAST_DATABASE_MAX_CONNECTIONS")? {
        cfg.database.max_connections = v;
    }

    // Jobs
    if let Some(v) = env_parse::<u32>("JOBCAST_JOBS_RETENTION_DAYS")? {
        cfg.jobs.retention_days = v;
    }
    if let Some(v) = env_parse::<u64>("JOBCAST_JOBS_SWEEP_INTERVAL_MINUTES")? {
        cfg.jobs.sweep_interval_minutes = v;
    }
    if let Some(v) = env_parse::<usize>("JOBCAST_JOBS_DEFAULT_PAGE_SIZE")? {
        cfg.jobs.default_page_size = v;
    }
    if let Some(v) = env_parse::<usize>("JOBCAST_JOBS_MAX_PAGE_SIZE")? {
        cfg.jobs.max_page_size = v;
    }
    if let Some(v) = env_str("JOBCAST_JOBS_DELIVERY_CAPABILITIES") {
        cfg.jobs.delivery_capabilities = split_csv(&v);
    }

    // Cluster
    if let Some(v) = env_str("JOBCAST_WORKER_ID") {
        cfg.cluster.worker_id = v;
    }

    Ok(())
}

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.server.port == 0 {
        return Err(ConfigError::Validation("server.port must be > 0".into()));
    }
    let host_ok = cfg.server.host.parse::<std::net::IpAddr>().is_ok()
        || HOSTNAME_REGEX.is_match(&cfg.server.host);
    if !host_ok {
        return Err(ConfigError::Validation(format!(
            "invalid server.host: {}",
            cfg.server.host
        )));
    }

    if cfg.database.url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database.url must not be empty".into(),
        ));
    }
    if cfg.database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be > 0".into(),
        ));
    }

    if cfg.jobs.retention_days == 0 {
        return Err(ConfigError::Validation(
            "jobs.retention_days must be > 0".into(),
        ));
    }
    if cfg.jobs.sweep_interval_minutes == 0
        || cfg.jobs.sweep_interval_minutes > MAX_SWEEP_INTERVAL_MINUTES
    {
        return Err(ConfigError::Validation(format!(
            "jobs.sweep_interval_minutes must be between 1 and {MAX_SWEEP_INTERVAL_MINUTES}"
        )));
    }
    if cfg.jobs.default_page_size == 0 || cfg.jobs.default_page_size > cfg.jobs.max_page_size {
        return Err(ConfigError::Validation(format!(
            "jobs.default_page_size must be between 1 and jobs.max_page_size ({})",
            cfg.jobs.max_page_size
        )));
    }

    if cfg.jobs.delivery_capabilities.is_empty() {
        return Err(ConfigError::Validation(
            "jobs.delivery_capabilities must name at least one capability".into(),
        ));
    }
    for cap in &cfg.jobs.delivery_capabilities {
        if !CAPABILITY_REGEX.is_match(cap) {
            return Err(ConfigError::Validation(format!(
                "invalid capability name: {}",
                cap
            )));
        }
    }

    if cfg.cluster.worker_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "cluster.worker_id must not be empty".into(),
        ));
    }

    Ok(())
}
