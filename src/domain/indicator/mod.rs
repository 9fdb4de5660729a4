//! Technical indicator implementations.
//!
//! Every indicator is a pure function over one numeric column (oldest value
//! first) and produces one point per input value:
//! - `IndicatorPoint`: A single point in an indicator series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A series of indicator values aligned with its source column

pub mod bollinger;
pub mod cache;
pub mod ema;
pub mod macd;
pub mod roc;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod wma;

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub valid: bool,
    pub value: IndicatorValue,
}

impl IndicatorPoint {
    pub fn invalid(value: IndicatorValue) -> Self {
        Self {
            valid: false,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

/// Which output of a (possibly multi-valued) indicator to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorField {
    Value,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Wma(usize),
    Rsi(usize),
    Roc(usize),
    Stddev(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

/// Result of sampling an indicator at one position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorReading {
    Value(f64),
    InsufficientHistory,
}

impl IndicatorReading {
    pub fn value(self) -> Option<f64> {
        match self {
            IndicatorReading::Value(v) => Some(v),
            IndicatorReading::InsufficientHistory => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorType {
    /// Number of source values, including the current one, needed before the
    /// first valid output.
    pub fn min_history(&self) -> usize {
        match *self {
            IndicatorType::Sma(n)
            | IndicatorType::Ema(n)
            | IndicatorType::Wma(n)
            | IndicatorType::Stddev(n) => n.max(1),
            IndicatorType::Rsi(n) | IndicatorType::Roc(n) => n.saturating_add(1),
            IndicatorType::Macd { fast, slow, signal } => {
                fast.max(slow).saturating_add(signal.max(1) - 1)
            }
            IndicatorType::Bollinger { period, .. } => period.max(1),
        }
    }

    pub fn compute(&self, values: &[f64]) -> IndicatorSeries {
        match *self {
            IndicatorType::Sma(n) => sma::calculate_sma(values, n),
            IndicatorType::Ema(n) => ema::calculate_ema(values, n),
            IndicatorType::Wma(n) => wma::calculate_wma(values, n),
            IndicatorType::Rsi(n) => rsi::calculate_rsi(values, n),
            IndicatorType::Roc(n) => roc::calculate_roc(values, n),
            IndicatorType::Stddev(n) => stddev::calculate_stddev(values, n),
            IndicatorType::Macd { fast, slow, signal } => {
                macd::calculate_macd(values, fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => bollinger::calculate_bollinger(values, period, stddev_mult_x100),
        }
    }
}

impl IndicatorSeries {
    /// Sample `field` at `position`. Warm-up points, positions past the end,
    /// non-finite values and mismatched fields read as insufficient history.
    pub fn reading(&self, position: usize, field: IndicatorField) -> IndicatorReading {
        let Some(point) = self.values.get(position) else {
            return IndicatorReading::InsufficientHistory;
        };
        if !point.valid {
            return IndicatorReading::InsufficientHistory;
        }
        match extract_field(&point.value, field) {
            Some(v) if v.is_finite() => IndicatorReading::Value(v),
            _ => IndicatorReading::InsufficientHistory,
        }
    }
}

fn extract_field(value: &IndicatorValue, field: IndicatorField) -> Option<f64> {
    match (value, field) {
        (IndicatorValue::Simple(v), IndicatorField::Value) => Some(*v),
        (IndicatorValue::Macd { line, .. }, IndicatorField::MacdLine) => Some(*line),
        (IndicatorValue::Macd { signal, .. }, IndicatorField::MacdSignal) => Some(*signal),
        (IndicatorValue::Macd { histogram, .. }, IndicatorField::MacdHistogram) => {
            Some(*histogram)
        }
        (IndicatorValue::Bollinger { upper, .. }, IndicatorField::BollingerUpper) => Some(*upper),
        (IndicatorValue::Bollinger { middle, .. }, IndicatorField::BollingerMiddle) => {
            Some(*middle)
        }
        (IndicatorValue::Bollinger { lower, .. }, IndicatorField::BollingerLower) => Some(*lower),
        _ => None,
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Wma(period) => write!(f, "WMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Roc(period) => write!(f, "ROC({})", period),
            IndicatorType::Stddev(period) => write!(f, "STDDEV({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}
