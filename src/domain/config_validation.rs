//! Configuration validation and typed scan settings.
//!
//! Validates all config fields before any data is loaded.

use crate::domain::error::FilterscanError;
use crate::domain::scan::SortOrder;
use crate::domain::timeframe::Timeframe;
use crate::domain::universe::parse_symbols;
use crate::logging::{LogFormat, LOG_LEVELS};
use crate::ports::config_port::ConfigPort;
use std::path::PathBuf;

pub const DEFAULT_POOL_SIZE: i64 = 4;
pub const MAX_POOL_SIZE: i64 = 64;
pub const MAX_THREADS: i64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Csv,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    pub source: DataSource,
    pub csv_dir: Option<PathBuf>,
    pub base_timeframe: Timeframe,
    pub sqlite_path: Option<PathBuf>,
    pub pool_size: u32,
    pub parallel: bool,
    pub threads: usize,
    pub order: SortOrder,
    pub symbols: Option<Vec<String>>,
    pub log_level: String,
    pub log_format: LogFormat,
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> FilterscanError {
    FilterscanError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn missing(section: &str, key: &str) -> FilterscanError {
    FilterscanError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

pub fn validate_scan_config(config: &dyn ConfigPort) -> Result<(), FilterscanError> {
    load_scan_settings(config).map(|_| ())
}

/// Validate and read every scan-related key.
pub fn load_scan_settings(config: &dyn ConfigPort) -> Result<ScanSettings, FilterscanError> {
    let source = validate_source(config)?;
    let csv_dir = config.get_string("data", "csv_dir").map(PathBuf::from);
    if source == DataSource::Csv && csv_dir.is_none() {
        return Err(missing("data", "csv_dir"));
    }
    let base_timeframe = validate_base_timeframe(config)?;

    let sqlite_path = config.get_string("sqlite", "path").map(PathBuf::from);
    if source == DataSource::Sqlite && sqlite_path.is_none() {
        return Err(missing("sqlite", "path"));
    }
    let pool_size = validate_pool_size(config)?;

    let parallel = config
        .get_bool("scan", "parallel", true)
        .map_err(|reason| invalid("scan", "parallel", reason))?;
    let threads = validate_threads(config)?;
    let order = validate_order(config)?;
    let symbols = validate_symbols(config)?;
    let (log_level, log_format) = validate_logging(config)?;

    Ok(ScanSettings {
        source,
        csv_dir,
        base_timeframe,
        sqlite_path,
        pool_size,
        parallel,
        threads,
        order,
        symbols,
        log_level,
        log_format,
    })
}

/// Settings needed for the saved filter store only.
pub fn validate_store_config(config: &dyn ConfigPort) -> Result<(PathBuf, u32), FilterscanError> {
    let path = config
        .get_string("sqlite", "path")
        .map(PathBuf::from)
        .ok_or_else(|| missing("sqlite", "path"))?;
    Ok((path, validate_pool_size(config)?))
}

fn validate_source(config: &dyn ConfigPort) -> Result<DataSource, FilterscanError> {
    match config.get_string_or("data", "source", "csv").to_ascii_lowercase().as_str() {
        "csv" => Ok(DataSource::Csv),
        "sqlite" => Ok(DataSource::Sqlite),
        other => Err(invalid(
            "data",
            "source",
            format!("unknown source '{other}', expected csv or sqlite"),
        )),
    }
}

fn validate_base_timeframe(config: &dyn ConfigPort) -> Result<Timeframe, FilterscanError> {
    config
        .get_string_or("data", "base_timeframe", "daily")
        .parse()
        .map_err(|reason: String| invalid("data", "base_timeframe", reason))
}

fn validate_pool_size(config: &dyn ConfigPort) -> Result<u32, FilterscanError> {
    let value = config
        .get_int("sqlite", "pool_size", DEFAULT_POOL_SIZE)
        .map_err(|reason| invalid("sqlite", "pool_size", reason))?;
    if !(1..=MAX_POOL_SIZE).contains(&value) {
        return Err(invalid(
            "sqlite",
            "pool_size",
            format!("pool_size must be between 1 and {MAX_POOL_SIZE}"),
        ));
    }
    Ok(value as u32)
}

fn validate_threads(config: &dyn ConfigPort) -> Result<usize, FilterscanError> {
    let value = config
        .get_int("scan", "threads", 0)
        .map_err(|reason| invalid("scan", "threads", reason))?;
    if !(0..=MAX_THREADS).contains(&value) {
        return Err(invalid(
            "scan",
            "threads",
            format!("threads must be between 0 and {MAX_THREADS}"),
        ));
    }
    Ok(value as usize)
}

fn validate_order(config: &dyn ConfigPort) -> Result<SortOrder, FilterscanError> {
    config
        .get_string_or("scan", "order", "desc")
        .parse()
        .map_err(|reason: String| invalid("scan", "order", reason))
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<Option<Vec<String>>, FilterscanError> {
    match config.get_string("scan", "symbols") {
        None => Ok(None),
        Some(list) => parse_symbols(&list)
            .map(Some)
            .map_err(|e| invalid("scan", "symbols", e.to_string())),
    }
}

/// `[logging]` level and format, for commands that need no data source.
pub fn validate_logging(config: &dyn ConfigPort) -> Result<(String, LogFormat), FilterscanError> {
    let level = config
        .get_string_or("logging", "level", "info")
        .to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(invalid(
            "logging",
            "level",
            format!("unknown level '{level}', expected one of {}", LOG_LEVELS.join(", ")),
        ));
    }
    let format = config
        .get_string_or("logging", "format", "text")
        .parse()
        .map_err(|reason: String| invalid("logging", "format", reason))?;
    Ok((level, format))
}
