//! Symbol universe: parsing symbol lists and loading each symbol's rows.
//!
//! Load failures are recorded per symbol so one bad file never aborts a scan.

use crate::domain::error::ScanError;
use crate::domain::scan::SymbolDiagnostic;
use crate::domain::symbol_data::SymbolData;
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::DataPort;
use std::collections::HashSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolListError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, SymbolListError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(SymbolListError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(SymbolListError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

pub struct LoadedUniverse {
    pub symbols: Vec<SymbolData>,
    pub diagnostics: Vec<SymbolDiagnostic>,
}

/// Fetch every symbol's rows. Symbols whose rows cannot be read are returned
/// as diagnostics instead.
pub fn load_universe(
    data_port: &dyn DataPort,
    symbols: &[String],
    base_timeframe: Timeframe,
) -> LoadedUniverse {
    let mut loaded = Vec::with_capacity(symbols.len());
    let mut diagnostics = Vec::new();

    for symbol in symbols {
        match data_port.fetch_ohlcv(symbol) {
            Ok(rows) => {
                debug!(%symbol, rows = rows.len(), "loaded");
                loaded.push(SymbolData::new(symbol.clone(), base_timeframe, rows));
            }
            Err(e) => {
                warn!(%symbol, error = %e, "skipping symbol");
                diagnostics.push(SymbolDiagnostic {
                    symbol: symbol.clone(),
                    error: ScanError::DataUnavailable {
                        symbol: symbol.clone(),
                        reason: e.to_string(),
                    },
                });
            }
        }
    }

    LoadedUniverse {
        symbols: loaded,
        diagnostics,
    }
}
