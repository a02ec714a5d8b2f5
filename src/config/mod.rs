//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    collections::BTreeSet,
    num::NonZeroUsize,
    path::Path,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{CliArgs, Command, MenuArgs, Overrides, PageArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "vitrine";
const ENV_PREFIX: &str = "VITRINE";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_ENTRIES: u64 = 1000;
const DEFAULT_SWEEP_INTERVAL: u64 = 100;
const DEFAULT_COALESCE_WINDOW_MS: u64 = 5;
const DEFAULT_STRUCTURE_TTL_SECS: u64 = 30 * 60;
const DEFAULT_SECTION_TTL_SECS: u64 = 2 * 60;
const DEFAULT_MENU_TTL_SECS: u64 = 60 * 60;
pub(crate) const DEFAULT_HEAVY_MEDIA_KIND: &str = "VIDEO";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub transport: TransportSettings,
    pub cache: CacheSettings,
    pub pages: PageSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// GraphQL endpoint; commands that reach the network require it.
    pub endpoint: Option<Url>,
    pub timeout: Duration,
    pub tenant: Option<String>,
    /// Operations whose authorization errors resolve to partial data.
    pub lenient_operations: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub max_entries: NonZeroUsize,
    pub sweep_interval: NonZeroUsize,
    pub coalesce_window: Duration,
}

#[derive(Debug, Clone)]
pub struct PageSettings {
    pub structure_ttl: Duration,
    pub section_ttl: Duration,
    pub menu_ttl: Duration,
    pub heavy_media_kinds: BTreeSet<String>,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            structure_ttl: Duration::from_secs(DEFAULT_STRUCTURE_TTL_SECS),
            section_ttl: Duration::from_secs(DEFAULT_SECTION_TTL_SECS),
            menu_ttl: Duration::from_secs(DEFAULT_MENU_TTL_SECS),
            heavy_media_kinds: BTreeSet::from([DEFAULT_HEAVY_MEDIA_KIND.to_string()]),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let raw = load_raw(cli.config_file.as_deref())?;
    resolve(raw, cli.command.overrides())
}

fn load_raw(config_file: Option<&Path>) -> Result<RawSettings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("transport.lenient_operations")
            .with_list_parse_key("pages.heavy_media_kinds"),
    );

    Ok(builder.build()?.try_deserialize()?)
}

fn resolve(mut raw: RawSettings, overrides: &Overrides) -> Result<Settings, LoadError> {
    raw.apply_overrides(overrides);
    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    transport: RawTransportSettings,
    cache: RawCacheSettings,
    pages: RawPageSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(endpoint) = overrides.endpoint.as_ref() {
            self.transport.endpoint = Some(endpoint.clone());
        }
        if let Some(timeout) = overrides.timeout_ms {
            self.transport.timeout_ms = Some(timeout);
        }
        if let Some(tenant) = overrides.tenant.as_ref() {
            self.transport.tenant = Some(tenant.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            transport,
            cache,
            pages,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            transport: build_transport_settings(transport)?,
            cache: build_cache_settings(cache)?,
            pages: build_page_settings(pages)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_transport_settings(
    transport: RawTransportSettings,
) -> Result<TransportSettings, LoadError> {
    let endpoint = match transport.endpoint.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(value) => {
            let url = Url::parse(value).map_err(|err| {
                LoadError::invalid("transport.endpoint", format!("invalid URL `{value}`: {err}"))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(LoadError::invalid(
                    "transport.endpoint",
                    format!("unsupported scheme `{}`", url.scheme()),
                ));
            }
            Some(url)
        }
    };

    let timeout_ms = non_zero(
        transport.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
        "transport.timeout_ms",
    )?;

    let tenant = transport.tenant.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    Ok(TransportSettings {
        endpoint,
        timeout: Duration::from_millis(timeout_ms),
        tenant,
        lenient_operations: non_empty_set(transport.lenient_operations.unwrap_or_default()),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let max_entries = non_zero_usize(
        cache.max_entries.unwrap_or(DEFAULT_MAX_ENTRIES),
        "cache.max_entries",
    )?;
    let sweep_interval = non_zero_usize(
        cache.sweep_interval.unwrap_or(DEFAULT_SWEEP_INTERVAL),
        "cache.sweep_interval",
    )?;
    let coalesce_window_ms = non_zero(
        cache
            .coalesce_window_ms
            .unwrap_or(DEFAULT_COALESCE_WINDOW_MS),
        "cache.coalesce_window_ms",
    )?;

    Ok(CacheSettings {
        max_entries,
        sweep_interval,
        coalesce_window: Duration::from_millis(coalesce_window_ms),
    })
}

fn build_page_settings(pages: RawPageSettings) -> Result<PageSettings, LoadError> {
    let structure_ttl = non_zero(
        pages
            .structure_ttl_secs
            .unwrap_or(DEFAULT_STRUCTURE_TTL_SECS),
        "pages.structure_ttl_secs",
    )?;
    let section_ttl = non_zero(
        pages.section_ttl_secs.unwrap_or(DEFAULT_SECTION_TTL_SECS),
        "pages.section_ttl_secs",
    )?;
    let menu_ttl = non_zero(
        pages.menu_ttl_secs.unwrap_or(DEFAULT_MENU_TTL_SECS),
        "pages.menu_ttl_secs",
    )?;

    let heavy_media_kinds = match pages.heavy_media_kinds {
        Some(kinds) => {
            let kinds = non_empty_set(kinds);
            if kinds.is_empty() {
                return Err(LoadError::invalid(
                    "pages.heavy_media_kinds",
                    "at least one component type is required",
                ));
            }
            kinds
        }
        None => BTreeSet::from([DEFAULT_HEAVY_MEDIA_KIND.to_string()]),
    };

    Ok(PageSettings {
        structure_ttl: Duration::from_secs(structure_ttl),
        section_ttl: Duration::from_secs(section_ttl),
        menu_ttl: Duration::from_secs(menu_ttl),
        heavy_media_kinds,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTransportSettings {
    endpoint: Option<String>,
    timeout_ms: Option<u64>,
    tenant: Option<String>,
    lenient_operations: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    max_entries: Option<u64>,
    sweep_interval: Option<u64>,
    coalesce_window_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPageSettings {
    structure_ttl_secs: Option<u64>,
    section_ttl_secs: Option<u64>,
    menu_ttl_secs: Option<u64>,
    heavy_media_kinds: Option<Vec<String>>,
}

fn non_zero(value: u64, key: &'static str) -> Result<u64, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(value)
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = non_zero(value, key)?
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_empty_set(values: Vec<String>) -> BTreeSet<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
