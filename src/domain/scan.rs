//! Scan orchestration across symbols.
//!
//! Each symbol is evaluated independently (in parallel by default) with its
//! own `EvalContext`. Per-symbol failures become diagnostics; only
//! cancellation aborts the whole scan. Results are merged and sorted so the
//! output does not depend on processing order.

use crate::domain::error::ScanError;
use crate::domain::filter::FilterExpression;
use crate::domain::filter_eval::{evaluate, explain, EvalContext, RowEvaluation};
use crate::domain::ohlcv::{is_reserved_column, is_standard_column, serialize_timestamp, OhlcvBar};
use crate::domain::symbol_data::SymbolData;
use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => f.write_str("asc"),
            SortOrder::Desc => f.write_str("desc"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown order '{other}', expected asc or desc")),
        }
    }
}

/// Cooperative cancellation shared between the caller and a running scan.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Inclusive bounds on base row dates. Either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDateTime) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub order: SortOrder,
    pub date_range: Option<DateRange>,
    /// Attach per-condition operand values to each match.
    pub explain: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanMatch {
    pub symbol: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub date: NaiveDateTime,
    pub index: usize,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<RowEvaluation>,
}

impl ScanMatch {
    fn from_row(row: &OhlcvBar, symbol: &str, index: usize) -> Self {
        Self {
            symbol: symbol.to_string(),
            date: row.date,
            index,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            // flattened next to the fixed keys, so reserved names are dropped
            extra: row
                .extra
                .iter()
                .filter(|(name, _)| !is_standard_column(name) && !is_reserved_column(name))
                .map(|(name, value)| (name.clone(), *value))
                .collect(),
            explanation: None,
        }
    }
}

fn serialize_display<T: fmt::Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolDiagnostic {
    pub symbol: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: ScanError,
}

/// A symbol with too few rows to clear the lookback window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub rows: usize,
    pub required: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanReport {
    pub results: Vec<ScanMatch>,
    pub diagnostics: Vec<SymbolDiagnostic>,
    pub skipped: Vec<SkippedSymbol>,
}

impl ScanReport {
    /// Add diagnostics raised outside the scan (e.g. while loading rows).
    pub fn merge_diagnostics(&mut self, diagnostics: Vec<SymbolDiagnostic>) {
        self.diagnostics.extend(diagnostics);
        self.diagnostics.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

enum SymbolOutcome {
    Matched(Vec<ScanMatch>),
    Skipped(SkippedSymbol),
    Failed(SymbolDiagnostic),
    Cancelled,
}

pub struct Scanner {
    parallel: bool,
    pool: Option<rayon::ThreadPool>,
    cancel: CancelFlag,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            parallel: true,
            pool: None,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run on a private pool of `threads` workers. Zero keeps rayon's global pool.
    pub fn with_threads(mut self, threads: usize) -> Self {
        if threads == 0 {
            self.pool = None;
            return self;
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("filterscan-{i}"))
            .build()
        {
            Ok(pool) => self.pool = Some(pool),
            Err(e) => warn!(threads, error = %e, "could not build scan thread pool, using global pool"),
        }
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn scan(
        &self,
        expr: &FilterExpression,
        symbols: &[SymbolData],
        options: &ScanOptions,
    ) -> Result<ScanReport, ScanError> {
        let window = expr.lookback_window();
        info!(
            symbols = symbols.len(),
            conditions = expr.conditions().len(),
            lookback = window,
            parallel = self.parallel,
            "starting scan"
        );

        let outcomes: Vec<SymbolOutcome> = if self.parallel {
            let run = || {
                symbols
                    .par_iter()
                    .map(|data| scan_symbol(expr, data, options, window, &self.cancel))
                    .collect::<Vec<_>>()
            };
            match &self.pool {
                Some(pool) => pool.install(run),
                None => run(),
            }
        } else {
            symbols
                .iter()
                .map(|data| scan_symbol(expr, data, options, window, &self.cancel))
                .collect()
        };

        if self.cancel.is_cancelled() {
            info!("scan cancelled");
            return Err(ScanError::Cancelled);
        }

        let mut report = ScanReport::default();
        for outcome in outcomes {
            match outcome {
                SymbolOutcome::Matched(matches) => report.results.extend(matches),
                SymbolOutcome::Skipped(skipped) => report.skipped.push(skipped),
                SymbolOutcome::Failed(diagnostic) => report.diagnostics.push(diagnostic),
                SymbolOutcome::Cancelled => return Err(ScanError::Cancelled),
            }
        }

        sort_matches(&mut report.results, options.order);
        report.diagnostics.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        report.skipped.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        info!(
            matches = report.results.len(),
            diagnostics = report.diagnostics.len(),
            skipped = report.skipped.len(),
            "scan finished"
        );
        Ok(report)
    }
}

/// Scan with default settings: parallel on the global pool, no cancellation.
pub fn scan(
    expr: &FilterExpression,
    symbols: &[SymbolData],
    options: &ScanOptions,
) -> Result<ScanReport, ScanError> {
    Scanner::new().scan(expr, symbols, options)
}

fn scan_symbol(
    expr: &FilterExpression,
    data: &SymbolData,
    options: &ScanOptions,
    window: usize,
    cancel: &CancelFlag,
) -> SymbolOutcome {
    if cancel.is_cancelled() {
        return SymbolOutcome::Cancelled;
    }

    let rows = data.base_rows();
    if rows.is_empty() {
        debug!(symbol = %data.symbol, "no rows");
        return SymbolOutcome::Skipped(SkippedSymbol {
            symbol: data.symbol.clone(),
            rows: 0,
            required: window,
        });
    }

    let mut ctx = match EvalContext::prepare(data, expr) {
        Ok(ctx) => ctx,
        Err(error) => {
            warn!(symbol = %data.symbol, %error, "symbol excluded from scan");
            return SymbolOutcome::Failed(SymbolDiagnostic {
                symbol: data.symbol.clone(),
                error,
            });
        }
    };

    if rows.len() < window {
        debug!(symbol = %data.symbol, rows = rows.len(), required = window, "insufficient rows");
        return SymbolOutcome::Skipped(SkippedSymbol {
            symbol: data.symbol.clone(),
            rows: rows.len(),
            required: window,
        });
    }

    let mut matches = Vec::new();
    for (position, row) in rows.iter().enumerate().skip(window - 1) {
        if options.date_range.is_some_and(|r| !r.contains(row.date)) {
            continue;
        }

        if options.explain {
            let evaluation = explain(expr, &mut ctx, position);
            if evaluation.matched {
                let mut m = ScanMatch::from_row(row, &data.symbol, position);
                m.explanation = Some(evaluation);
                matches.push(m);
            }
        } else if evaluate(expr, &mut ctx, position) {
            matches.push(ScanMatch::from_row(row, &data.symbol, position));
        }
    }

    debug!(
        symbol = %data.symbol,
        rows = rows.len(),
        matches = matches.len(),
        indicators = ctx.cache().len(),
        "symbol scanned"
    );
    SymbolOutcome::Matched(matches)
}

fn sort_matches(matches: &mut [ScanMatch], order: SortOrder) {
    matches.sort_by(|a, b| {
        let by_date = match order {
            SortOrder::Asc => a.date.cmp(&b.date),
            SortOrder::Desc => b.date.cmp(&a.date),
        };
        by_date
            .then_with(|| a.symbol.cmp(&b.symbol))
            .then_with(|| a.index.cmp(&b.index))
    });
}
