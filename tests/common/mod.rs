#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use filterscan::domain::error::FilterscanError;
use filterscan::domain::filter::FilterExpression;
use filterscan::domain::filter_parser;
pub use filterscan::domain::ohlcv::OhlcvBar;
use filterscan::domain::symbol_data::SymbolData;
use filterscan::domain::timeframe::Timeframe;
use filterscan::ports::data_port::DataPort;
use serde_json::Value;
use std::collections::BTreeMap;

/// Symbols are kept ordered so `list_symbols` is deterministic.
pub struct MockDataPort {
    pub data: BTreeMap<String, Vec<OhlcvBar>>,
    pub errors: BTreeMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
            errors: BTreeMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(&self, symbol: &str) -> Result<Vec<OhlcvBar>, FilterscanError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(FilterscanError::Database {
                reason: reason.clone(),
            });
        }
        self.data
            .get(symbol)
            .cloned()
            .ok_or_else(|| FilterscanError::NoData {
                symbol: symbol.to_string(),
            })
    }

    fn list_symbols(&self) -> Result<Vec<String>, FilterscanError> {
        Ok(self
            .data
            .keys()
            .chain(self.errors.keys())
            .cloned()
            .collect())
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, FilterscanError> {
        let bars = self.fetch_ohlcv(symbol)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn make_bar(symbol: &str, date: &str, close: f64) -> OhlcvBar {
    OhlcvBar::new(
        symbol,
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
        close - 1.0,
        close + 1.0,
        close - 2.0,
        close,
        1000.0,
    )
}

/// One bar per closing price, on consecutive days from `start_date`.
pub fn bars_from_closes(symbol: &str, start_date: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let day = start + chrono::Duration::days(i as i64);
            make_bar(symbol, &day.format("%Y-%m-%d").to_string(), close)
        })
        .collect()
}

/// Rising closes: `start_price`, `start_price + 1`, ...
pub fn generate_bars(symbol: &str, start_date: &str, count: usize, start_price: f64) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..count).map(|i| start_price + i as f64).collect();
    bars_from_closes(symbol, start_date, &closes)
}

pub fn symbol_data(symbol: &str, bars: Vec<OhlcvBar>) -> SymbolData {
    SymbolData::new(symbol, Timeframe::Daily, bars)
}

pub fn filter(doc: Value) -> FilterExpression {
    filter_parser::parse(&doc).unwrap()
}

pub fn column(name: &str) -> Value {
    serde_json::json!({"type": "column", "name": name})
}

pub fn constant(value: f64) -> Value {
    serde_json::json!({"type": "constant", "value": value})
}

pub fn indicator(name: &str, params: &[f64], column: &str) -> Value {
    serde_json::json!({"type": "indicator", "name": name, "params": params, "column": column})
}

pub fn condition(left: Value, operator: &str, right: Value) -> Value {
    serde_json::json!({"left": left, "operator": operator, "right": right})
}

pub fn filter_doc(logic: &str, conditions: Vec<Value>) -> Value {
    serde_json::json!({"logic": logic, "conditions": conditions})
}
