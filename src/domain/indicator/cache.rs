//! Per-symbol memo of computed indicator series.
//!
//! One series is computed per (indicator, source column, timeframe) and reused
//! by every condition and every row position that references it.

use std::collections::HashMap;

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::timeframe::Timeframe;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndicatorKey {
    pub indicator_type: IndicatorType,
    pub column: String,
    pub timeframe: Timeframe,
}

impl IndicatorKey {
    pub fn new(indicator_type: IndicatorType, column: &str, timeframe: Timeframe) -> Self {
        Self {
            indicator_type,
            column: column.to_string(),
            timeframe,
        }
    }
}

#[derive(Debug, Default)]
pub struct IndicatorCache {
    series: HashMap<IndicatorKey, IndicatorSeries>,
    computed: usize,
}

impl IndicatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached series for `key`, computing it over the column values
    /// produced by `source` on first use.
    pub fn get_or_compute<F>(&mut self, key: &IndicatorKey, source: F) -> &IndicatorSeries
    where
        F: FnOnce() -> Vec<f64>,
    {
        if !self.series.contains_key(key) {
            let values = source();
            let series = key.indicator_type.compute(&values);
            self.computed += 1;
            self.series.insert(key.clone(), series);
        }
        &self.series[key]
    }

    pub fn get(&self, key: &IndicatorKey) -> Option<&IndicatorSeries> {
        self.series.get(key)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// How many series have been computed so far.
    pub fn computations(&self) -> usize {
        self.computed
    }
}
