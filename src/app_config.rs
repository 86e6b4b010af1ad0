//! Application configuration: TOML file defaults merged under CLI flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use mediadl_core::download::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CACHE_DIR, DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, FetchConfig,
    RetryPolicy,
};
use serde::Deserialize;

use crate::cli::Args;

/// TOML-backed file configuration for CLI defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileConfig {
    /// Default download root.
    pub(crate) output_dir: Option<PathBuf>,
    /// Default concurrency (same range as CLI).
    pub(crate) concurrency: Option<u8>,
    /// Default maximum attempts (same range as CLI).
    pub(crate) max_retries: Option<u8>,
    /// Skip URLs already in the cache.
    pub(crate) check_cache: Option<bool>,
    /// Cache directory.
    pub(crate) cache_dir: Option<PathBuf>,
    /// Throughput-adaptive chunk sizing for videos.
    pub(crate) dynamic_chunks: Option<bool>,
    /// User-Agent override.
    pub(crate) user_agent: Option<String>,
    /// Connect timeout in seconds.
    pub(crate) connect_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=100).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=100");
        }
        if let Some(max_retries) = self.max_retries
            && max_retries > 10
        {
            bail!("Invalid config value for `max_retries`: {max_retries}. Expected range: 0..=10");
        }
        if let Some(secs) = self.connect_timeout_secs
            && !(1..=3600).contains(&secs)
        {
            bail!("Invalid config value for `connect_timeout_secs`: {secs}. Expected range: 1..=3600");
        }
        if let Some(user_agent) = &self.user_agent
            && user_agent.trim().is_empty()
        {
            bail!("Invalid config value for `user_agent`: must not be empty");
        }
        Ok(())
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/mediadl/config.toml`
/// 2. `$HOME/.config/mediadl/config.toml`
#[must_use]
pub(crate) fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("mediadl").join("config.toml"));
    }
    let home = env_var_non_empty_os("HOME")?;
    Some(PathBuf::from(home).join(".config").join("mediadl").join("config.toml"))
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the file config.
///
/// An explicit path must exist; the default path is optional.
pub(crate) fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return read_file_config(path).map(Some);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => read_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

pub(crate) fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Effective run settings: CLI flag, then config file, then built-in default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub(crate) output_dir: PathBuf,
    pub(crate) concurrency: usize,
    pub(crate) max_retries: u32,
    pub(crate) check_cache: bool,
    pub(crate) cache_dir: PathBuf,
    pub(crate) dynamic_chunks: bool,
    pub(crate) user_agent: Option<String>,
    pub(crate) connect_timeout: Duration,
}

impl Settings {
    pub(crate) fn resolve(args: &Args, file: Option<&FileConfig>) -> Self {
        let file = file.cloned().unwrap_or_default();
        Self {
            output_dir: args
                .output_dir
                .clone()
                .or(file.output_dir)
                .unwrap_or_else(|| PathBuf::from(".")),
            concurrency: usize::from(
                args.concurrency
                    .or(file.concurrency)
                    .unwrap_or(DEFAULT_CONCURRENCY as u8),
            ),
            max_retries: u32::from(
                args.max_retries
                    .or(file.max_retries)
                    .unwrap_or(DEFAULT_MAX_RETRIES as u8),
            ),
            check_cache: args.check_cache || file.check_cache.unwrap_or(false),
            cache_dir: args
                .cache_dir
                .clone()
                .or(file.cache_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
            dynamic_chunks: !args.no_dynamic_chunks && file.dynamic_chunks.unwrap_or(true),
            user_agent: args.user_agent.clone().or(file.user_agent),
            connect_timeout: Duration::from_secs(
                file.connect_timeout_secs
                    .unwrap_or(CONNECT_TIMEOUT_SECS),
            ),
        }
    }

    pub(crate) fn fetch_config(&self) -> FetchConfig {
        let config = FetchConfig::default()
            .with_concurrency(self.concurrency)
            .with_retry_policy(RetryPolicy::with_max_attempts(self.max_retries))
            .with_cache_enabled(self.check_cache)
            .with_cache_dir(&self.cache_dir)
            .with_dynamic_chunks(self.dynamic_chunks)
            .with_connect_timeout(self.connect_timeout);
        match &self.user_agent {
            Some(user_agent) => config.with_user_agent(user_agent.clone()),
            None => config,
        }
    }
}
