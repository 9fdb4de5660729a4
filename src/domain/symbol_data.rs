//! Per-symbol row container.

use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// One symbol's rows, date ascending, keyed by timeframe.
///
/// The base timeframe is what the data source delivered; scan positions index
/// it. Other timeframes are optional pre-built series, stamped with the date
/// their bar closes.
#[derive(Debug, Clone)]
pub struct SymbolData {
    pub symbol: String,
    pub base_timeframe: Timeframe,
    series: BTreeMap<Timeframe, Vec<OhlcvBar>>,
}

impl SymbolData {
    pub fn new(symbol: impl Into<String>, base_timeframe: Timeframe, rows: Vec<OhlcvBar>) -> Self {
        let mut series = BTreeMap::new();
        series.insert(base_timeframe, rows);
        Self {
            symbol: symbol.into(),
            base_timeframe,
            series,
        }
    }

    /// Attach a pre-built series for another timeframe.
    pub fn with_timeframe(mut self, timeframe: Timeframe, rows: Vec<OhlcvBar>) -> Self {
        if timeframe != self.base_timeframe {
            self.series.insert(timeframe, rows);
        }
        self
    }

    pub fn rows(&self, timeframe: Timeframe) -> Option<&[OhlcvBar]> {
        self.series.get(&timeframe).map(Vec::as_slice)
    }

    pub fn base_rows(&self) -> &[OhlcvBar] {
        self.rows(self.base_timeframe).unwrap_or(&[])
    }

    pub fn bar_count(&self) -> usize {
        self.base_rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.base_rows().is_empty()
    }

    pub fn date_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let rows = self.base_rows();
        Some((rows.first()?.date, rows.last()?.date))
    }

    /// Whether any row of `timeframe` carries `column`.
    pub fn has_column(&self, timeframe: Timeframe, column: &str) -> bool {
        self.rows(timeframe)
            .is_some_and(|rows| rows.iter().any(|r| r.has_column(column)))
    }
}
