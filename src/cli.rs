//! CLI definition and dispatch.

use clap::{ArgGroup, Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    load_scan_settings, validate_logging, validate_store_config, DataSource, ScanSettings,
};
use crate::domain::error::{FilterscanError, ValidationError, ValidationErrors};
use crate::domain::filter::FilterExpression;
use crate::domain::filter_parser;
use crate::domain::ohlcv::format_timestamp;
use crate::domain::request::{parse_bounds, ScanRequest};
use crate::domain::saved_filter::SavedFilter;
use crate::domain::scan::{ScanOptions, ScanReport, Scanner, SortOrder};
use crate::domain::universe::{load_universe, parse_symbols};
use crate::logging::init_logging;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::filter_store_port::FilterStorePort;

#[derive(Parser, Debug)]
#[command(name = "filterscan", about = "Declarative OHLCV filter scanner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a filter over every symbol and print matching rows as JSON
    Scan(ScanArgs),
    /// Validate a filter document
    Validate {
        #[arg(short, long)]
        filter: PathBuf,
    },
    /// Manage saved filters
    Filters {
        #[arg(short, long)]
        config: PathBuf,
        #[command(subcommand)]
        action: FilterAction,
    },
    /// List symbols available from the configured data source
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the data range for a symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
    },
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("filter_source")
        .required(true)
        .args(["filter", "saved", "request"])
))]
pub struct ScanArgs {
    #[arg(short, long)]
    pub config: PathBuf,
    /// Filter document (JSON)
    #[arg(short, long)]
    pub filter: Option<PathBuf>,
    /// Name of a saved filter
    #[arg(long)]
    pub saved: Option<String>,
    /// Scan request document (JSON)
    #[arg(long)]
    pub request: Option<PathBuf>,
    /// Comma-separated symbols, overriding the request and config
    #[arg(long)]
    pub symbols: Option<String>,
    #[arg(long)]
    pub start: Option<String>,
    #[arg(long)]
    pub end: Option<String>,
    #[arg(long)]
    pub order: Option<SortOrder>,
    /// Attach per-condition operand values to each match
    #[arg(long)]
    pub explain: bool,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum FilterAction {
    /// Validate a filter document and store it under a name
    Save {
        name: String,
        #[arg(short, long)]
        filter: PathBuf,
    },
    List,
    /// Print a saved filter's canonical JSON
    Show { name: String },
    Delete { name: String },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Scan(args) => run_scan(&args),
        Command::Validate { filter } => run_validate(&filter),
        Command::Filters { config, action } => run_filters(&config, action),
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::Info { config, symbol } => run_info(&config, &symbol),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, FilterscanError> {
    FileConfigAdapter::from_file(path)
}

/// Malformed JSON in a filter file is a violation at the document root,
/// the same as any other invalid filter.
pub fn read_filter(path: &Path) -> Result<FilterExpression, FilterscanError> {
    let content = fs::read_to_string(path)?;
    Ok(filter_parser::parse_str(&content)?)
}

fn init_logging_from(config: &dyn ConfigPort) -> Result<(), FilterscanError> {
    let (level, format) = validate_logging(config)?;
    init_logging(&level, format);
    Ok(())
}

#[cfg(feature = "sqlite")]
fn open_filter_store(config: &dyn ConfigPort) -> Result<Box<dyn FilterStorePort>, FilterscanError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let (path, pool_size) = validate_store_config(config)?;
    let store = SqliteAdapter::open(&path, pool_size)?;
    store.initialize_schema()?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "sqlite"))]
fn open_filter_store(config: &dyn ConfigPort) -> Result<Box<dyn FilterStorePort>, FilterscanError> {
    validate_store_config(config)?;
    Err(FilterscanError::ConfigInvalid {
        section: "sqlite".into(),
        key: "path".into(),
        reason: "saved filters require the sqlite feature".into(),
    })
}

pub fn open_data_port(settings: &ScanSettings) -> Result<Box<dyn DataPort>, FilterscanError> {
    match settings.source {
        DataSource::Csv => {
            let dir = settings
                .csv_dir
                .clone()
                .ok_or_else(|| FilterscanError::ConfigMissing {
                    section: "data".into(),
                    key: "csv_dir".into(),
                })?;
            Ok(Box::new(CsvAdapter::new(dir)))
        }
        DataSource::Sqlite => open_sqlite_data(settings),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite_data(settings: &ScanSettings) -> Result<Box<dyn DataPort>, FilterscanError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let path = settings
        .sqlite_path
        .as_ref()
        .ok_or_else(|| FilterscanError::ConfigMissing {
            section: "sqlite".into(),
            key: "path".into(),
        })?;
    let adapter = SqliteAdapter::open(path, settings.pool_size)?;
    adapter.initialize_schema()?;
    Ok(Box::new(adapter))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite_data(_settings: &ScanSettings) -> Result<Box<dyn DataPort>, FilterscanError> {
    Err(FilterscanError::ConfigInvalid {
        section: "data".into(),
        key: "source".into(),
        reason: "sqlite source requires the sqlite feature".into(),
    })
}

/// Filter, options and symbol override resolved from the command line.
pub struct ScanPlan {
    pub expr: FilterExpression,
    pub options: ScanOptions,
    pub symbols: Option<Vec<String>>,
}

fn symbols_arg(list: &str) -> Result<Vec<String>, FilterscanError> {
    parse_symbols(list).map_err(|e| {
        FilterscanError::Validation(ValidationErrors::single(ValidationError::schema(
            "/symbols",
            e.to_string(),
        )))
    })
}

/// Command-line flags win over the request document, which wins over config.
fn resolve_plan(
    args: &ScanArgs,
    config: &dyn ConfigPort,
    settings: &ScanSettings,
) -> Result<ScanPlan, FilterscanError> {
    let (expr, mut options, mut symbols) = if let Some(path) = &args.request {
        info!(path = %path.display(), "loading scan request");
        let content = fs::read_to_string(path)?;
        let request = ScanRequest::from_json(&content)?;
        (
            request.filter()?,
            request.options(settings.order)?,
            request.symbols(),
        )
    } else if let Some(name) = &args.saved {
        let store = open_filter_store(config)?;
        let saved = store
            .load_filter(name)?
            .ok_or_else(|| FilterscanError::FilterNotFound { name: name.clone() })?;
        info!(name = %saved.name, "loaded saved filter");
        (saved.filter, ScanOptions::default(), None)
    } else if let Some(path) = &args.filter {
        info!(path = %path.display(), "loading filter");
        (read_filter(path)?, ScanOptions::default(), None)
    } else {
        // clap enforces one filter source
        return Err(FilterscanError::Validation(ValidationErrors::single(
            ValidationError::schema("/filter", "is required"),
        )));
    };

    if args.request.is_none() {
        options.order = settings.order;
    }
    if let Some(order) = args.order {
        options.order = order;
    }
    if args.start.is_some() || args.end.is_some() {
        options.date_range = Some(parse_bounds(args.start.as_deref(), args.end.as_deref())?);
    }
    options.explain = args.explain;
    if let Some(list) = &args.symbols {
        symbols = Some(symbols_arg(list)?);
    }

    Ok(ScanPlan {
        expr,
        options,
        symbols,
    })
}

/// Load the universe and run the scan. Symbols default to the configured
/// list, then to everything the data source offers.
pub fn run_scan_pipeline(
    data_port: &dyn DataPort,
    plan: &ScanPlan,
    settings: &ScanSettings,
) -> Result<ScanReport, FilterscanError> {
    let symbols = match plan.symbols.clone().or_else(|| settings.symbols.clone()) {
        Some(list) => list,
        None => data_port.list_symbols()?,
    };
    info!(symbols = symbols.len(), filter = %plan.expr, "resolved universe");

    let universe = load_universe(data_port, &symbols, settings.base_timeframe);
    let scanner = Scanner::new()
        .with_parallelism(settings.parallel)
        .with_threads(settings.threads);

    let mut report = scanner.scan(&plan.expr, &universe.symbols, &plan.options)?;
    report.merge_diagnostics(universe.diagnostics);
    Ok(report)
}

fn run_scan(args: &ScanArgs) -> Result<(), FilterscanError> {
    let config = load_config(&args.config)?;
    let settings = load_scan_settings(&config)?;
    init_logging(&settings.log_level, settings.log_format);

    let plan = resolve_plan(args, &config, &settings)?;
    let data_port = open_data_port(&settings)?;
    let report = run_scan_pipeline(data_port.as_ref(), &plan, &settings)?;

    let json = report.to_json_pretty()?;
    match &args.output {
        Some(path) => {
            fs::write(path, json)?;
            eprintln!(
                "{} matches written to {}",
                report.results.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn run_validate(path: &Path) -> Result<(), FilterscanError> {
    eprintln!("Validating filter: {}", path.display());
    let expr = read_filter(path)?;

    eprintln!("  Parsed:   {expr}");
    eprintln!("  Lookback: {} rows", expr.lookback_window());
    let indicators: Vec<String> = expr
        .extract_indicators()
        .iter()
        .map(|key| format!("{}({})", key.indicator_type, key.column))
        .collect();
    if !indicators.is_empty() {
        eprintln!("  Indicators: {}", indicators.join(", "));
    }
    println!("{}", expr.to_json_string());
    eprintln!("\nFilter is valid.");
    Ok(())
}

fn run_filters(config_path: &Path, action: FilterAction) -> Result<(), FilterscanError> {
    let config = load_config(config_path)?;
    init_logging_from(&config)?;
    let store = open_filter_store(&config)?;

    match action {
        FilterAction::Save { name, filter } => {
            let saved = SavedFilter::new(&name, read_filter(&filter)?)?;
            store.save_filter(&saved)?;
            eprintln!("Saved filter '{}'", saved.name);
        }
        FilterAction::List => {
            let names = store.list_filters()?;
            for name in &names {
                println!("{name}");
            }
            eprintln!("{} saved filters", names.len());
        }
        FilterAction::Show { name } => {
            let saved = store
                .load_filter(&name)?
                .ok_or(FilterscanError::FilterNotFound { name })?;
            println!("{}", serde_json::to_string_pretty(&saved.filter.to_json())?);
        }
        FilterAction::Delete { name } => {
            if !store.delete_filter(&name)? {
                return Err(FilterscanError::FilterNotFound { name });
            }
            eprintln!("Deleted filter '{name}'");
        }
    }
    Ok(())
}

fn run_list_symbols(config_path: &Path) -> Result<(), FilterscanError> {
    let config = load_config(config_path)?;
    let settings = load_scan_settings(&config)?;
    init_logging(&settings.log_level, settings.log_format);

    let symbols = open_data_port(&settings)?.list_symbols()?;
    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{symbol}");
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}

fn run_info(config_path: &Path, symbol: &str) -> Result<(), FilterscanError> {
    let config = load_config(config_path)?;
    let settings = load_scan_settings(&config)?;
    init_logging(&settings.log_level, settings.log_format);

    let symbol = symbol.trim().to_uppercase();
    match open_data_port(&settings)?.get_data_range(&symbol)? {
        Some((first, last, count)) => {
            println!(
                "{}: {} rows, {} to {}",
                symbol,
                count,
                format_timestamp(&first),
                format_timestamp(&last)
            );
            Ok(())
        }
        None => Err(FilterscanError::NoData { symbol }),
    }
}
